//! Microsecond-precision timestamps
//!
//! Reports, snapshots, and events all record when they were produced; stale
//! data detection compares entity-carried times against an age threshold.
//! Both use this one representation: microseconds since the Unix epoch,
//! stored as `u64` and serialized as a bare integer.

use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Microsecond-precision timestamp
///
/// The zero timestamp is the Unix epoch. Values are always non-negative and
/// totally ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Unix epoch (1970-01-01 00:00:00 UTC)
    pub const EPOCH: Timestamp = Timestamp(0);

    /// Create a timestamp for the current moment
    ///
    /// Returns the epoch if the system clock reads before 1970 (e.g. after
    /// an NTP step backwards).
    pub fn now() -> Self {
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Timestamp(duration.as_micros() as u64)
    }

    /// Create a timestamp from microseconds since epoch
    #[inline]
    pub const fn from_micros(micros: u64) -> Self {
        Timestamp(micros)
    }

    /// Create a timestamp from milliseconds since epoch
    #[inline]
    pub const fn from_millis(millis: u64) -> Self {
        Timestamp(millis.saturating_mul(1_000))
    }

    /// Create a timestamp from seconds since epoch
    #[inline]
    pub const fn from_secs(secs: u64) -> Self {
        Timestamp(secs.saturating_mul(1_000_000))
    }

    /// Microseconds since epoch
    #[inline]
    pub const fn as_micros(&self) -> u64 {
        self.0
    }

    /// Milliseconds since epoch (truncates)
    #[inline]
    pub const fn as_millis(&self) -> u64 {
        self.0 / 1_000
    }

    /// Seconds since epoch (truncates)
    #[inline]
    pub const fn as_secs(&self) -> u64 {
        self.0 / 1_000_000
    }

    /// Duration since an earlier timestamp, `None` if `earlier` is later
    pub fn duration_since(&self, earlier: Timestamp) -> Option<Duration> {
        self.0
            .checked_sub(earlier.0)
            .map(Duration::from_micros)
    }

    /// Subtract a duration, saturating at the epoch
    pub fn saturating_sub(&self, duration: Duration) -> Self {
        Timestamp(self.0.saturating_sub(duration.as_micros() as u64))
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Timestamp::EPOCH
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:06}", self.0 / 1_000_000, self.0 % 1_000_000)
    }
}

impl From<u64> for Timestamp {
    fn from(micros: u64) -> Self {
        Timestamp::from_micros(micros)
    }
}

impl From<Timestamp> for u64 {
    fn from(ts: Timestamp) -> Self {
        ts.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_conversions() {
        let ts = Timestamp::from_secs(2);
        assert_eq!(ts.as_secs(), 2);
        assert_eq!(ts.as_millis(), 2_000);
        assert_eq!(ts.as_micros(), 2_000_000);

        assert_eq!(Timestamp::from_millis(5).as_micros(), 5_000);
    }

    #[test]
    fn test_now_advances() {
        let before = Timestamp::now();
        std::thread::sleep(Duration::from_millis(1));
        assert!(Timestamp::now() > before);
    }

    #[test]
    fn test_duration_since() {
        let t1 = Timestamp::from_micros(1_000);
        let t2 = Timestamp::from_micros(4_000);
        assert_eq!(t2.duration_since(t1), Some(Duration::from_micros(3_000)));
        assert_eq!(t1.duration_since(t2), None);
    }

    #[test]
    fn test_saturating_sub_stops_at_epoch() {
        let ts = Timestamp::from_micros(10);
        assert_eq!(ts.saturating_sub(Duration::from_micros(4)).as_micros(), 6);
        assert_eq!(ts.saturating_sub(Duration::from_secs(1)), Timestamp::EPOCH);
    }

    #[test]
    fn test_display_format() {
        assert_eq!(Timestamp::from_micros(1_234_567_890).to_string(), "1234.567890");
        assert_eq!(Timestamp::EPOCH.to_string(), "0.000000");
    }

    #[test]
    fn test_serializes_as_bare_integer() {
        let ts = Timestamp::from_micros(42);
        assert_eq!(serde_json::to_string(&ts).unwrap(), "42");
        let back: Timestamp = serde_json::from_str("42").unwrap();
        assert_eq!(back, ts);
    }

    proptest::proptest! {
        #[test]
        fn prop_unit_conversions_truncate_consistently(micros in 0u64..u64::MAX / 2) {
            let ts = Timestamp::from_micros(micros);
            proptest::prop_assert_eq!(ts.as_millis(), micros / 1_000);
            proptest::prop_assert_eq!(ts.as_secs(), micros / 1_000_000);
            proptest::prop_assert_eq!(Timestamp::from_millis(ts.as_millis()).as_micros() / 1_000, micros / 1_000);
        }

        #[test]
        fn prop_duration_since_is_antisymmetric(a in 0u64..u64::MAX / 2, b in 0u64..u64::MAX / 2) {
            let (ta, tb) = (Timestamp::from_micros(a), Timestamp::from_micros(b));
            proptest::prop_assert_eq!(ta.duration_since(tb).is_some(), a >= b);
            if a != b {
                proptest::prop_assert_ne!(
                    ta.duration_since(tb).is_some(),
                    tb.duration_since(ta).is_some()
                );
            }
        }
    }
}
