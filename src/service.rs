use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, trace};

use crate::codec::{DecodeResult, FeistelCodec, Token};
use crate::error::{ConfigError, MalformedToken, TokenError};
use crate::key::{DerivedKey, KeyDeriver};
use crate::prf::{Blake3RoundFunction, RoundFunction};
use crate::time::{SystemTimeProvider, TimeProvider, TimeQuantizer};
use crate::types::TokenConfig;

const NANOS_PER_SEC: i128 = 1_000_000_000;

/// How a presented token relates to the freshness window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    /// Recovered block is at or after the current instant.
    Future,
    /// The window has elapsed.
    Stale,
    Malformed(MalformedToken),
}

impl Freshness {
    pub fn is_fresh(self) -> bool {
        matches!(self, Freshness::Fresh)
    }
}

/// Issues and validates nonce-bound tokens without keeping any per-token state.
///
/// Every call reads the clock exactly once. Configuration is fixed at
/// construction.
pub struct TokenService<T = SystemTimeProvider, F = Blake3RoundFunction>
where
    T: TimeProvider,
    F: RoundFunction,
{
    quantizer: TimeQuantizer,
    window: u64,
    deriver: KeyDeriver,
    codec: FeistelCodec<F>,
    time_provider: Arc<T>,
}

impl TokenService {
    /// Build a service on the system clock.
    pub fn new(config: TokenConfig) -> Result<Self, ConfigError> {
        Self::with_round_function(config, Blake3RoundFunction, Arc::new(SystemTimeProvider))
    }
}

impl<T: TimeProvider> TokenService<T> {
    pub fn with_time_provider(
        config: TokenConfig,
        time_provider: Arc<T>,
    ) -> Result<Self, ConfigError> {
        Self::with_round_function(config, Blake3RoundFunction, time_provider)
    }
}

impl<T, F> TokenService<T, F>
where
    T: TimeProvider,
    F: RoundFunction,
{
    pub fn with_round_function(
        config: TokenConfig,
        round_fn: F,
        time_provider: Arc<T>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let quantizer = TimeQuantizer::new(config.time_divisor)?;
        Ok(Self {
            window: quantizer.aligned_window(config.valid_interval),
            quantizer,
            deriver: KeyDeriver::new(&config.secret)?,
            codec: FeistelCodec::new(round_fn),
            time_provider,
        })
    }

    pub fn time_divisor(&self) -> Duration {
        Duration::from_secs(self.quantizer.divisor())
    }

    /// The freshness window after alignment to the divisor.
    pub fn valid_interval(&self) -> Duration {
        Duration::from_secs(self.window)
    }

    /// Encrypt the current time block under the key derived from `nonce`.
    pub fn generate(&self, nonce: &str) -> Result<Token, TokenError> {
        let now = self.time_provider.now_seconds();
        let block = u32::try_from(self.quantizer.to_block(now))
            .map_err(|_| TokenError::ClockOutOfRange { now })?;
        let key = self.deriver.derive(nonce);
        let token = self.codec.encode(block, &key);
        trace!(tweak = %key.tweak_hex(), block, "issued token");
        Ok(token)
    }

    /// `true` iff `token` decodes under `nonce` to a block inside the window.
    ///
    /// Never fails on malformed input; garbage is just `false`.
    pub fn validate(&self, nonce: &str, token: &str) -> bool {
        self.check(nonce, token).is_fresh()
    }

    pub fn validate_token(&self, nonce: &str, token: Token) -> bool {
        let key = self.deriver.derive(nonce);
        let block = self.codec.decode(token, &key);
        self.classify(DecodeResult::Recovered(block), &key).is_fresh()
    }

    /// Validate a JSON scalar token (integer or decimal string).
    pub fn validate_value(&self, nonce: &str, token: &Value) -> bool {
        let key = self.deriver.derive(nonce);
        let decoded = self.codec.decode_value(token, &key);
        self.classify(decoded, &key).is_fresh()
    }

    /// Like [`validate`](Self::validate), but says why a token was refused.
    pub fn check(&self, nonce: &str, token: &str) -> Freshness {
        let key = self.deriver.derive(nonce);
        let decoded = self.codec.decode_str(token, &key);
        self.classify(decoded, &key)
    }

    fn classify(&self, decoded: DecodeResult, key: &DerivedKey) -> Freshness {
        let block = match decoded {
            DecodeResult::Recovered(block) => u64::from(block),
            DecodeResult::Malformed(reason) => {
                debug!(tweak = %key.tweak_hex(), %reason, "rejected malformed token");
                return Freshness::Malformed(reason);
            }
        };

        let now = self.time_provider.now();
        let issued = i128::from(self.quantizer.to_block(block)) * NANOS_PER_SEC;
        let elapsed = now.as_nanos() as i128 - issued;
        let window = i128::from(self.window) * NANOS_PER_SEC;

        let freshness = if elapsed <= 0 {
            Freshness::Future
        } else if elapsed >= window {
            Freshness::Stale
        } else {
            Freshness::Fresh
        };
        if !freshness.is_fresh() {
            debug!(
                tweak = %key.tweak_hex(),
                ?freshness,
                elapsed_ns = elapsed as i64,
                "rejected token"
            );
        }
        freshness
    }
}
