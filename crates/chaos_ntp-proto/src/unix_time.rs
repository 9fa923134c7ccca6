use core::cmp::Ordering;

use crate::protocol;
#[cfg(feature = "std")]
use std::time;

/// The number of seconds from 1st January 1900 UTC to the start of the Unix epoch.
pub const EPOCH_DELTA: i64 = 2_208_988_800;

/// The number of seconds in one protocol era (2^32 seconds, approximately 136 years).
///
/// Era 0 spans from 1900-01-01 00:00:00 UTC to 2036-02-07 06:28:15 UTC.
pub const ERA_SECONDS: i64 = 4_294_967_296; // 1i64 << 32

const NANOS_PER_SEC: i128 = 1_000_000_000;

/// Describes an instant relative to the `UNIX_EPOCH` - 00:00:00 Coordinated Universal Time (UTC),
/// Thursday, 1 January 1970 in seconds with the fractional part in nanoseconds.
///
/// If the **Instant** describes some moment prior to `UNIX_EPOCH`, both the `secs` and
/// `subsec_nanos` components will be negative (or zero).
///
/// Arithmetic goes through a single signed nanosecond count, so adding a fractional offset and
/// measuring elapsed time never loses precision below one nanosecond.
///
/// ## Conversion precision
///
/// Converting to [`protocol::TimestampFormat`] scales nanoseconds by 2^32/1e9 and truncates;
/// converting back scales by 1e9/2^32 and truncates again. A round trip therefore reconstructs
/// the instant to within a couple of nanoseconds. That loss is inherent to the format.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub struct Instant {
    secs: i64,
    subsec_nanos: i32,
}

impl Instant {
    /// Create a new **Instant** given its `secs` and `subsec_nanos` components.
    ///
    /// Components with mismatched signs are normalised, so `Instant::new(1, -1)` is one
    /// nanosecond before the second mark.
    pub fn new(secs: i64, subsec_nanos: i32) -> Instant {
        Instant::from_unix_nanos(secs as i128 * NANOS_PER_SEC + subsec_nanos as i128)
    }

    /// Build an **Instant** from a signed count of nanoseconds since `UNIX_EPOCH`.
    ///
    /// Values outside the `i64` seconds range saturate.
    pub fn from_unix_nanos(nanos: i128) -> Instant {
        let secs = nanos / NANOS_PER_SEC;
        let subsec_nanos = (nanos % NANOS_PER_SEC) as i32;
        let secs = secs.clamp(i64::MIN as i128, i64::MAX as i128) as i64;
        Instant { secs, subsec_nanos }
    }

    /// Uses `std::time::SystemTime::now` and `std::time::UNIX_EPOCH` to determine the current
    /// **Instant**.
    ///
    /// ## Example
    ///
    /// ```
    /// println!("{:?}", chaos_proto::unix_time::Instant::now());
    /// ```
    #[cfg(feature = "std")]
    pub fn now() -> Self {
        match time::SystemTime::now().duration_since(time::UNIX_EPOCH) {
            Ok(duration) => Instant::from_unix_nanos(duration.as_nanos() as i128),
            Err(sys_time_err) => {
                Instant::from_unix_nanos(-(sys_time_err.duration().as_nanos() as i128))
            }
        }
    }

    /// The "seconds" component of the **Instant**.
    pub fn secs(&self) -> i64 {
        self.secs
    }

    /// The fractional component of the **Instant** in nanoseconds.
    pub fn subsec_nanos(&self) -> i32 {
        self.subsec_nanos
    }

    /// Signed nanoseconds since `UNIX_EPOCH`.
    pub fn as_unix_nanos(&self) -> i128 {
        self.secs as i128 * NANOS_PER_SEC + self.subsec_nanos as i128
    }

    /// Shift the instant by a (possibly negative, possibly fractional) number of seconds,
    /// rounded to the nearest nanosecond.
    pub fn add_seconds_f64(self, seconds: f64) -> Instant {
        let delta = (seconds * NANOS_PER_SEC as f64).round() as i128;
        Instant::from_unix_nanos(self.as_unix_nanos() + delta)
    }

    /// Seconds elapsed from `earlier` to `self`. Negative if `earlier` is actually later.
    pub fn seconds_since(&self, earlier: &Instant) -> f64 {
        (self.as_unix_nanos() - earlier.as_unix_nanos()) as f64 / NANOS_PER_SEC as f64
    }
}

impl Ord for Instant {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_unix_nanos().cmp(&other.as_unix_nanos())
    }
}

impl PartialOrd for Instant {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Era-aware conversion helpers.

/// Given a raw 32-bit seconds value and a pivot `Instant`, return the absolute protocol
/// seconds (i64) by selecting the era closest to the pivot.
///
/// Assumes the timestamp is within half an era (~68 years) of the pivot.
fn era_aware_ntp_seconds(raw_seconds: u32, pivot: &Instant) -> i64 {
    let pivot_ntp = pivot.secs + EPOCH_DELTA;
    let raw = raw_seconds as i64;

    let pivot_era = pivot_ntp.div_euclid(ERA_SECONDS);
    let candidate = pivot_era * ERA_SECONDS + raw;

    let diff = candidate - pivot_ntp;
    if diff > ERA_SECONDS / 2 {
        candidate - ERA_SECONDS
    } else if diff < -(ERA_SECONDS / 2) {
        candidate + ERA_SECONDS
    } else {
        candidate
    }
}

/// Convert a [`protocol::TimestampFormat`] to an [`Instant`] using the given pivot
/// for era disambiguation.
///
/// The 32-bit seconds field is ambiguous across eras (each era spans ~136 years). This
/// function selects the era that places the timestamp closest to `pivot`.
///
/// The fraction is scaled with integer arithmetic and truncated to whole nanoseconds.
pub fn timestamp_to_instant(ts: protocol::TimestampFormat, pivot: &Instant) -> Instant {
    let ntp_secs = era_aware_ntp_seconds(ts.seconds, pivot);
    let unix_secs = (ntp_secs - EPOCH_DELTA) as i128;
    let nanos = ((ts.fraction as u64 * NANOS_PER_SEC as u64) >> 32) as i128;
    Instant::from_unix_nanos(unix_secs * NANOS_PER_SEC + nanos)
}

// Conversion implementations.

#[cfg(feature = "std")]
impl From<protocol::TimestampFormat> for Instant {
    /// Converts a timestamp to a Unix [`Instant`], using the current system time as a pivot
    /// for era disambiguation.
    ///
    /// For offline or replay scenarios, use [`timestamp_to_instant`] with an explicit pivot.
    fn from(t: protocol::TimestampFormat) -> Self {
        timestamp_to_instant(t, &Instant::now())
    }
}

impl From<Instant> for protocol::TimestampFormat {
    /// Converts a Unix [`Instant`] to a 32-bit protocol timestamp.
    ///
    /// **Note**: The seconds wrap modulo 2^32, losing era information. The receiver must
    /// infer the era (see [`timestamp_to_instant`]).
    fn from(t: Instant) -> Self {
        let ntp_nanos = t.as_unix_nanos() + EPOCH_DELTA as i128 * NANOS_PER_SEC;
        let secs = ntp_nanos.div_euclid(NANOS_PER_SEC);
        let nanos = ntp_nanos.rem_euclid(NANOS_PER_SEC) as u64;
        protocol::TimestampFormat {
            seconds: secs.rem_euclid(ERA_SECONDS as i128) as u32,
            fraction: ((nanos << 32) / NANOS_PER_SEC as u64) as u32,
        }
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;

    #[test]
    fn era0_timestamp_to_instant() {
        // 2024-01-01 00:00:00 UTC: Unix=1704067200, NTP=3913056000
        let ts = protocol::TimestampFormat {
            seconds: 3_913_056_000,
            fraction: 0,
        };
        let pivot = Instant::new(1_704_067_200, 0);
        let result = timestamp_to_instant(ts, &pivot);
        assert_eq!(result.secs(), 1_704_067_200);
    }

    #[test]
    fn era1_timestamp_with_era1_pivot() {
        // Era 1, offset 100_000_000 => Unix = 2^32 + 100_000_000 - 2_208_988_800
        let ts = protocol::TimestampFormat {
            seconds: 100_000_000,
            fraction: 0,
        };
        let pivot = Instant::new(2_185_978_496, 0);
        let result = timestamp_to_instant(ts, &pivot);
        assert_eq!(result.secs(), 2_185_978_496);
    }

    #[test]
    fn era_boundary_pivot_after_ts_before() {
        let pivot = Instant::new(2_087_942_400, 0); // ~2036-03-01
        let ts = protocol::TimestampFormat {
            seconds: u32::MAX,
            fraction: 0,
        };
        let result = timestamp_to_instant(ts, &pivot);
        assert_eq!(result.secs(), u32::MAX as i64 - EPOCH_DELTA);
    }

    #[test]
    fn half_second_is_half_the_fraction_range() {
        let ts: protocol::TimestampFormat = Instant::new(0, 500_000_000).into();
        assert_eq!(ts.seconds, EPOCH_DELTA as u32);
        assert_eq!(ts.fraction, 0x8000_0000);
    }

    #[test]
    fn round_trip_within_a_microsecond() {
        let original = Instant::new(1_704_067_200, 123_456_789);
        let ts: protocol::TimestampFormat = original.into();
        let restored = timestamp_to_instant(ts, &original);
        let drift = (restored.as_unix_nanos() - original.as_unix_nanos()).abs();
        assert!(drift < 1_000, "drift {drift} ns");
        assert!(restored <= original);
    }

    #[test]
    fn pre_unix_epoch_converts() {
        let instant = Instant::new(-1, -250_000_000);
        let ts: protocol::TimestampFormat = instant.into();
        assert_eq!(ts.seconds, (EPOCH_DELTA - 2) as u32);
        assert_eq!(ts.fraction, 0xC000_0000);
        let back = timestamp_to_instant(ts, &instant);
        assert_eq!(back.as_unix_nanos(), instant.as_unix_nanos());
    }

    #[test]
    fn mismatched_signs_are_normalised() {
        let instant = Instant::new(1, -1);
        assert_eq!(instant.secs(), 0);
        assert_eq!(instant.subsec_nanos(), 999_999_999);
    }

    #[test]
    fn add_seconds_and_measure() {
        let start = Instant::new(1_000, 0);
        let later = start.add_seconds_f64(12.5);
        assert_eq!(later.as_unix_nanos(), 1_012_500_000_000);
        assert_eq!(later.seconds_since(&start), 12.5);
        let earlier = start.add_seconds_f64(-1800.0);
        assert_eq!(earlier.secs(), -800);
        assert_eq!(earlier.seconds_since(&start), -1800.0);
        assert!(earlier < start);
    }

    #[test]
    fn ordering_crosses_zero() {
        let a = Instant::from_unix_nanos(-5);
        let b = Instant::from_unix_nanos(3);
        assert!(a < b);
        assert_eq!(a.secs(), 0);
        assert_eq!(a.subsec_nanos(), -5);
    }
}
