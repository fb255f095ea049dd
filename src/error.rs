/// Fatal configuration problems. A service that hits one of these is unusable
/// until its configuration is fixed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// No shared secret was configured, or it was empty.
    #[error("secret key not configured")]
    SecretMissing,
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

/// Reasons a token failed to parse as a member of the 32-bit domain.
///
/// These never escape `validate`; they are only observable through
/// [`crate::codec::DecodeResult`] and [`crate::service::Freshness`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MalformedToken {
    #[error("token is empty")]
    Empty,
    #[error("token contains non-digit characters")]
    NotNumeric,
    /// Leading zeros, which would give one ciphertext several spellings.
    #[error("token is not in canonical decimal form")]
    NonCanonical,
    #[error("token does not fit the 32-bit domain")]
    OutOfRange,
    /// A structured value (object, array, bool, float, null) where a number was expected.
    #[error("token has the wrong type")]
    WrongType,
}

/// Errors surfaced by token issuance.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum TokenError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The current time block no longer fits the 32-bit token domain.
    #[error("clock reading {now} is outside the token domain")]
    ClockOutOfRange { now: u64 },
}
