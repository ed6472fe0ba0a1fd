use std::cmp::Ordering;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Creation time of a snapshot, in fractional seconds since the UNIX epoch.
///
/// Host documents persist timestamps as plain JSON numbers, so this is a
/// transparent wrapper around `f64`. Timestamps order snapshots for display
/// and never take part in identity.
///
/// Comparison uses [`f64::total_cmp`], which makes the ordering total.
#[derive(Clone, Copy, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(f64);

impl Timestamp {
    /// Create a timestamp from seconds since the epoch.
    ///
    /// Rejects NaN, infinities and negative values.
    pub fn from_secs(secs: f64) -> Result<Self, TypeError> {
        if !secs.is_finite() || secs < 0.0 {
            return Err(TypeError::InvalidTimestamp(secs.to_string()));
        }
        Ok(Self(secs))
    }

    /// The epoch itself.
    pub const fn zero() -> Self {
        Self(0.0)
    }

    /// Seconds since the epoch.
    pub fn as_secs(&self) -> f64 {
        self.0
    }

    /// Whole milliseconds since the epoch, truncated.
    pub fn as_millis(&self) -> u64 {
        (self.0 * 1000.0) as u64
    }

    /// The later of two timestamps.
    pub fn max(self, other: Self) -> Self {
        if other > self {
            other
        } else {
            self
        }
    }
}

impl PartialEq for Timestamp {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Timestamp {}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({:.3}s)", self.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}", self.0)
    }
}

/// A source of timestamps.
///
/// Every store owns its clock handle, so tests can drive time explicitly.
pub trait Clock: fmt::Debug + Send + Sync {
    /// The current time.
    fn now(&self) -> Timestamp;
}

/// Wall-clock time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs_f64();
        Timestamp(secs)
    }
}

/// A clock that only moves when told to.
///
/// The current value is held as `f64` bits in an atomic so the clock can be
/// shared behind an `Arc` and advanced through `&self`.
#[derive(Debug)]
pub struct ManualClock {
    bits: AtomicU64,
}

impl ManualClock {
    /// Start the clock at `start`.
    pub fn new(start: Timestamp) -> Self {
        Self {
            bits: AtomicU64::new(start.0.to_bits()),
        }
    }

    /// Jump to an absolute time (may move backwards).
    pub fn set(&self, to: Timestamp) {
        self.bits.store(to.0.to_bits(), AtomicOrdering::SeqCst);
    }

    /// Move forward by `secs` seconds.
    pub fn advance(&self, secs: f64) {
        let next = self.now().0 + secs;
        self.bits.store(next.to_bits(), AtomicOrdering::SeqCst);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Timestamp::zero())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp(f64::from_bits(self.bits.load(AtomicOrdering::SeqCst)))
    }
}
