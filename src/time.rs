use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::ConfigError;

/// Abstraction to allow testing/time injection.
pub trait TimeProvider: Send + Sync {
    /// Time elapsed since the UNIX epoch.
    fn now(&self) -> Duration;

    fn now_seconds(&self) -> u64 {
        self.now().as_secs()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now(&self) -> Duration {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
    }
}

/// A clock that only moves when told to.
///
/// Shared between a service and the code driving it through an `Arc`, so tests
/// can freeze time at issuance and jump forward before validation. Resolution
/// is one nanosecond; readings saturate at `u64::MAX` nanoseconds.
#[derive(Debug, Default)]
pub struct ManualClock {
    nanos: AtomicU64,
}

impl ManualClock {
    pub fn new(now: Duration) -> Self {
        Self {
            nanos: AtomicU64::new(saturating_nanos(now)),
        }
    }

    pub fn at_secs(secs: u64) -> Self {
        Self::new(Duration::from_secs(secs))
    }

    pub fn set(&self, now: Duration) {
        self.nanos.store(saturating_nanos(now), Ordering::SeqCst);
    }

    pub fn advance(&self, by: Duration) {
        let by = saturating_nanos(by);
        let _ = self
            .nanos
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |t| {
                Some(t.saturating_add(by))
            });
    }

    /// Move backward, saturating at the epoch.
    pub fn rewind(&self, by: Duration) {
        let by = saturating_nanos(by);
        let _ = self
            .nanos
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |t| {
                Some(t.saturating_sub(by))
            });
    }
}

impl TimeProvider for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::SeqCst))
    }
}

fn saturating_nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

/// Buckets UNIX seconds into fixed-size time blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeQuantizer {
    divisor: u64,
}

impl TimeQuantizer {
    /// Build a quantizer with a block size of `divisor`.
    ///
    /// The divisor must be at least one second and a whole number of seconds.
    pub fn new(divisor: Duration) -> Result<Self, ConfigError> {
        // Require integral seconds to avoid silent truncation.
        if divisor < Duration::from_secs(1) {
            return Err(ConfigError::InvalidConfig(
                "time_divisor must be at least 1 second".into(),
            ));
        }
        if divisor.subsec_nanos() != 0 {
            return Err(ConfigError::InvalidConfig(
                "time_divisor must be a whole number of seconds".into(),
            ));
        }
        Ok(Self {
            divisor: divisor.as_secs(),
        })
    }

    pub fn divisor(&self) -> u64 {
        self.divisor
    }

    /// `floor(timestamp / divisor) * divisor`
    #[inline]
    pub fn to_block(&self, timestamp: u64) -> u64 {
        timestamp / self.divisor * self.divisor
    }

    /// Re-align a raw window to a whole number of blocks, rounding down.
    #[inline]
    pub fn aligned_window(&self, raw: Duration) -> u64 {
        self.to_block(raw.as_secs())
    }
}
