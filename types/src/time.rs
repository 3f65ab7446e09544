//! Millisecond timestamps and the clock seam.
//!
//! Block timestamps and slot arithmetic are all expressed in Unix epoch
//! milliseconds. Witnesses need reasonably synchronized clocks (NTP or
//! equivalent) for slot scheduling to line up across the network.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Unix time in milliseconds (UTC).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(i64);

impl Timestamp {
    pub const EPOCH: Self = Self(0);

    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    pub fn as_millis(&self) -> i64 {
        self.0
    }

    pub fn saturating_add_millis(&self, millis: i64) -> Self {
        Self(self.0.saturating_add(millis))
    }

    /// Milliseconds from `self` to `later`; negative when `later` is earlier.
    pub fn millis_until(&self, later: Timestamp) -> i64 {
        later.0.saturating_sub(self.0)
    }

    /// Read the system clock.
    ///
    /// A clock set before 1970 reads as the epoch.
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);
        Self(millis)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

/// Source of wall-clock time.
///
/// Production code uses [`SystemClock`]; tests inject a controllable clock so
/// slot arithmetic and the production loop stay deterministic.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// The operating-system clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}
