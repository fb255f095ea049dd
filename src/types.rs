use std::fmt;
use std::time::Duration;

use derive_builder::Builder;
use serde::Deserialize;

use crate::error::ConfigError;
use crate::time::TimeQuantizer;

/// One time block is 5 seconds long.
pub const DEFAULT_TIME_DIVISOR: Duration = Duration::from_secs(5);

/// Tokens stay fresh for one hour.
pub const DEFAULT_VALID_INTERVAL: Duration = Duration::from_secs(3600);

pub const ENV_SECRET: &str = "ENCRYPTED_TOKEN_SECRET";
pub const ENV_TIME_DIVISOR: &str = "ENCRYPTED_TOKEN_TIME_DIVISOR";
pub const ENV_VALID_INTERVAL: &str = "ENCRYPTED_TOKEN_VALID_INTERVAL";

/// Configuration for a [`crate::TokenService`].
///
/// Fixed once a service is built from it; there are no setters on the service.
#[derive(Builder, Clone, PartialEq, Eq)]
#[builder(pattern = "owned")]
pub struct TokenConfig {
    /// Long-lived server secret. Must be non-empty.
    #[builder(setter(into), default)]
    pub secret: Vec<u8>,
    /// Size of one time block.
    #[builder(default = "DEFAULT_TIME_DIVISOR")]
    pub time_divisor: Duration,
    /// Raw freshness window, re-aligned down to a multiple of `time_divisor`.
    #[builder(default = "DEFAULT_VALID_INTERVAL")]
    pub valid_interval: Duration,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            secret: Vec::new(),
            time_divisor: DEFAULT_TIME_DIVISOR,
            valid_interval: DEFAULT_VALID_INTERVAL,
        }
    }
}

impl fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenConfig")
            .field("secret", &format_args!("<{} bytes>", self.secret.len()))
            .field("time_divisor", &self.time_divisor)
            .field("valid_interval", &self.valid_interval)
            .finish()
    }
}

impl TokenConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.secret.is_empty() {
            return Err(ConfigError::SecretMissing);
        }
        let quantizer = TimeQuantizer::new(self.time_divisor)?;
        if self.valid_interval.subsec_nanos() != 0 {
            return Err(ConfigError::InvalidConfig(
                "valid_interval must be a whole number of seconds".into(),
            ));
        }
        if quantizer.aligned_window(self.valid_interval) == 0 {
            return Err(ConfigError::InvalidConfig(
                "valid_interval must span at least one time_divisor".into(),
            ));
        }
        Ok(())
    }

    /// Parse and validate a JSON document such as
    /// `{"secret": "...", "time_divisor_secs": 5, "valid_interval_secs": 3600}`.
    pub fn from_json(input: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig =
            serde_json::from_str(input).map_err(|e| ConfigError::InvalidConfig(e.to_string()))?;
        let config = raw.into_config();
        config.validate()?;
        Ok(config)
    }

    /// Read the `ENCRYPTED_TOKEN_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`from_env`](Self::from_env) with an arbitrary variable source.
    pub fn from_lookup<L>(lookup: L) -> Result<Self, ConfigError>
    where
        L: Fn(&str) -> Option<String>,
    {
        let secs = |name: &str, default: Duration| -> Result<Duration, ConfigError> {
            match lookup(name) {
                None => Ok(default),
                Some(value) => value
                    .trim()
                    .parse::<u64>()
                    .map(Duration::from_secs)
                    .map_err(|e| ConfigError::InvalidConfig(format!("{name}: {e}"))),
            }
        };
        let config = TokenConfig {
            secret: lookup(ENV_SECRET).unwrap_or_default().into_bytes(),
            time_divisor: secs(ENV_TIME_DIVISOR, DEFAULT_TIME_DIVISOR)?,
            valid_interval: secs(ENV_VALID_INTERVAL, DEFAULT_VALID_INTERVAL)?,
        };
        config.validate()?;
        Ok(config)
    }
}

impl TokenConfigBuilder {
    pub fn build_validated(self) -> Result<TokenConfig, ConfigError> {
        let config = self
            .build()
            .map_err(|e| ConfigError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    secret: String,
    #[serde(default = "default_time_divisor_secs")]
    time_divisor_secs: u64,
    #[serde(default = "default_valid_interval_secs")]
    valid_interval_secs: u64,
}

impl RawConfig {
    fn into_config(self) -> TokenConfig {
        TokenConfig {
            secret: self.secret.into_bytes(),
            time_divisor: Duration::from_secs(self.time_divisor_secs),
            valid_interval: Duration::from_secs(self.valid_interval_secs),
        }
    }
}

fn default_time_divisor_secs() -> u64 {
    DEFAULT_TIME_DIVISOR.as_secs()
}

fn default_valid_interval_secs() -> u64 {
    DEFAULT_VALID_INTERVAL.as_secs()
}
