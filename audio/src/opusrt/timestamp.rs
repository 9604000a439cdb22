//! Timestamps: wall-clock arrival times and the wrapping sample timeline.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Timestamp in milliseconds since Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct EpochMillis(pub i64);

impl EpochMillis {
    /// Creates a new EpochMillis from milliseconds.
    pub const fn from_millis(ms: i64) -> Self {
        Self(ms)
    }

    /// Returns the current time as EpochMillis.
    pub fn now() -> Self {
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO);
        Self(duration.as_millis() as i64)
    }

    /// Converts to milliseconds.
    pub const fn as_millis(&self) -> i64 {
        self.0
    }

    /// Returns the elapsed time since `earlier`, or zero if it is later.
    pub fn since(&self, earlier: EpochMillis) -> Duration {
        Duration::from_millis((self.0 - earlier.0).max(0) as u64)
    }
}

impl std::ops::Add<Duration> for EpochMillis {
    type Output = Self;
    fn add(self, rhs: Duration) -> Self::Output {
        Self(self.0 + rhs.as_millis() as i64)
    }
}

impl std::ops::Sub<EpochMillis> for EpochMillis {
    type Output = i64;
    fn sub(self, rhs: EpochMillis) -> Self::Output {
        self.0 - rhs.0
    }
}

impl From<i64> for EpochMillis {
    fn from(ms: i64) -> Self {
        Self(ms)
    }
}

impl From<EpochMillis> for i64 {
    fn from(ms: EpochMillis) -> Self {
        ms.0
    }
}

impl std::fmt::Display for EpochMillis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

/// Signed distance from `from` to `to` on the 32-bit sample timeline.
///
/// The difference is taken modulo 2^32 and read as `i32`, so a rollover
/// from near `u32::MAX` to a small index is a short forward step.
pub fn sample_delta(from: u32, to: u32) -> i64 {
    i64::from(to.wrapping_sub(from) as i32)
}
