use blake3::Hasher;

use crate::key::DerivedKey;

/// Pluggable keyed PRF used as the Feistel round function.
pub trait RoundFunction: Send + Sync {
    /// Map one 16-bit half to a pseudo-random 16-bit value for `round`.
    fn round(&self, key: &DerivedKey, round: u8, half: u16) -> u16;
}

/// Default keyed-BLAKE3 implementation with domain separation.
#[derive(Debug, Clone, Copy, Default)]
pub struct Blake3RoundFunction;

impl RoundFunction for Blake3RoundFunction {
    fn round(&self, key: &DerivedKey, round: u8, half: u16) -> u16 {
        let mut hasher = Hasher::new_keyed(key.key());
        hasher.update(b"encrypted-token:feistel:v1");
        hasher.update(key.tweak());
        hasher.update(&[round]);
        hasher.update(&half.to_be_bytes());
        let out = hasher.finalize();
        let bytes = out.as_bytes();
        u16::from_be_bytes([bytes[0], bytes[1]])
    }
}
