//! Stateless, nonce-bound request tokens.
//!
//! A client presents a nonce; the server encrypts the current time block under a
//! key derived from that nonce and a long-lived secret and hands back the
//! ciphertext. Later the client sends nonce and token together, and the server
//! decrypts, recovers the block, and accepts if it falls inside the freshness
//! window. Nothing is stored between the two steps.
//!
//! Building blocks:
//! - [`time`]: block quantization and an injectable clock.
//! - [`key`]: per-nonce key derivation (SHA-256 tweak, BLAKE3-derived secret key).
//! - [`codec`]: a Feistel format-preserving cipher over `u32`.
//! - [`service`]: `generate`/`validate` and the freshness policy.
//! - `gate` (feature `gate`): header-level issue/accept/reject decisions.
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use encrypted_token::{ManualClock, TokenConfigBuilder, TokenService};
//!
//! let clock = Arc::new(ManualClock::at_secs(1_220_263_500));
//! let config = TokenConfigBuilder::default()
//!     .secret("some random string of secret")
//!     .build_validated()?;
//! let service = TokenService::with_time_provider(config, clock.clone())?;
//!
//! let token = service.generate("nonce1")?.to_string();
//! clock.advance(Duration::from_secs(30));
//! assert!(service.validate("nonce1", &token));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod codec;
pub mod error;
pub mod key;
pub mod prf;
pub mod service;
pub mod time;
pub mod types;

#[cfg(feature = "gate")]
pub mod client;
#[cfg(feature = "gate")]
pub mod gate;

pub use codec::{DecodeResult, FeistelCodec, Token};
pub use error::{ConfigError, MalformedToken, TokenError};
pub use key::{derive_key, DerivedKey, KeyDeriver};
pub use prf::{Blake3RoundFunction, RoundFunction};
pub use service::{Freshness, TokenService};
pub use time::{ManualClock, SystemTimeProvider, TimeProvider, TimeQuantizer};
pub use types::{TokenConfig, TokenConfigBuilder};

#[cfg(feature = "gate")]
pub use client::{generate_nonce, Credentials};
#[cfg(feature = "gate")]
pub use gate::{GateError, GateOutcome, GateRequest, HandlePolicy, Method, TokenGate};
