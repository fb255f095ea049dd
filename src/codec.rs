//! Format-preserving cipher over the 32-bit domain.
//!
//! A balanced Feistel network splits the value into two 16-bit halves and runs
//! [`ROUNDS`] rounds of a keyed [`RoundFunction`]. The network is a permutation
//! of `u32` for every key, so decoding never fails on a well-formed token: a
//! wrong key just lands somewhere else in the domain. The only validity signal
//! is whether the recovered time block is fresh, which the service checks.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::MalformedToken;
use crate::key::DerivedKey;
use crate::prf::{Blake3RoundFunction, RoundFunction};

/// Feistel rounds per encryption.
pub const ROUNDS: u8 = 10;

/// Ciphertext of a time block.
///
/// Its text form is the canonical decimal spelling of the inner value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(u32);

impl Token {
    pub const fn from_raw(value: u32) -> Self {
        Self(value)
    }

    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Token {
    type Err = MalformedToken;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_canonical(s).map(Token)
    }
}

/// Outcome of decoding untrusted token input.
///
/// `Recovered` says nothing about whether the key was right; see the module docs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeResult {
    Recovered(u32),
    Malformed(MalformedToken),
}

impl DecodeResult {
    pub fn recovered(self) -> Option<u32> {
        match self {
            DecodeResult::Recovered(value) => Some(value),
            DecodeResult::Malformed(_) => None,
        }
    }
}

fn parse_canonical(text: &str) -> Result<u32, MalformedToken> {
    if text.is_empty() {
        return Err(MalformedToken::Empty);
    }
    if !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(MalformedToken::NotNumeric);
    }
    if text.len() > 1 && text.starts_with('0') {
        return Err(MalformedToken::NonCanonical);
    }
    // Only digits remain, so the sole failure left is overflow.
    text.parse::<u32>().map_err(|_| MalformedToken::OutOfRange)
}

fn value_to_domain(value: &Value) -> Result<u32, MalformedToken> {
    match value {
        Value::String(text) => parse_canonical(text),
        Value::Number(n) => {
            if let Some(v) = n.as_u64() {
                u32::try_from(v).map_err(|_| MalformedToken::OutOfRange)
            } else if n.is_i64() {
                Err(MalformedToken::OutOfRange)
            } else {
                Err(MalformedToken::WrongType)
            }
        }
        _ => Err(MalformedToken::WrongType),
    }
}

/// Balanced Feistel codec, generic over its round function.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeistelCodec<F = Blake3RoundFunction> {
    round_fn: F,
}

impl<F: RoundFunction> FeistelCodec<F> {
    pub fn new(round_fn: F) -> Self {
        Self { round_fn }
    }

    pub fn encode(&self, value: u32, key: &DerivedKey) -> Token {
        let (mut left, mut right) = split(value);
        for round in 0..ROUNDS {
            let next = left ^ self.round_fn.round(key, round, right);
            left = right;
            right = next;
        }
        Token(join(left, right))
    }

    /// Exact inverse of [`encode`](Self::encode) under the same key.
    pub fn decode(&self, token: Token, key: &DerivedKey) -> u32 {
        let (mut left, mut right) = split(token.0);
        for round in (0..ROUNDS).rev() {
            let prev = right ^ self.round_fn.round(key, round, left);
            right = left;
            left = prev;
        }
        join(left, right)
    }

    /// Decode the canonical decimal text form.
    pub fn decode_str(&self, text: &str, key: &DerivedKey) -> DecodeResult {
        match parse_canonical(text) {
            Ok(raw) => DecodeResult::Recovered(self.decode(Token(raw), key)),
            Err(reason) => DecodeResult::Malformed(reason),
        }
    }

    /// Decode a JSON scalar: either a non-negative integer or a decimal string.
    pub fn decode_value(&self, value: &Value, key: &DerivedKey) -> DecodeResult {
        match value_to_domain(value) {
            Ok(raw) => DecodeResult::Recovered(self.decode(Token(raw), key)),
            Err(reason) => DecodeResult::Malformed(reason),
        }
    }
}

#[inline]
fn split(value: u32) -> (u16, u16) {
    ((value >> 16) as u16, value as u16)
}

#[inline]
fn join(left: u16, right: u16) -> u32 {
    (u32::from(left) << 16) | u32::from(right)
}
