//! Time source and canonical timestamps.
//!
//! Key validity windows are computed from an injected [`Clock`]. A clock
//! that cannot produce a trustworthy time fails the enclosing operation
//! instead of substituting a stale value.

use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Duration, SecondsFormat, Utc};

use crate::error::{PolicyVaultError, Result};

/// A source of the current UTC time.
pub trait Clock: Send + Sync {
    fn now(&self) -> Result<DateTime<Utc>>;
}

/// The host wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Result<DateTime<Utc>> {
        let since_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|_| PolicyVaultError::TimeSourceFailure)?;
        let secs = i64::try_from(since_epoch.as_secs())
            .map_err(|_| PolicyVaultError::TimeSourceFailure)?;
        DateTime::from_timestamp(secs, since_epoch.subsec_nanos())
            .ok_or(PolicyVaultError::TimeSourceFailure)
    }
}

/// A clock frozen at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> Result<DateTime<Utc>> {
        Ok(self.0)
    }
}

/// `t + seconds`, failing if the result is not representable.
pub fn plus_seconds(t: DateTime<Utc>, seconds: i64) -> Result<DateTime<Utc>> {
    let delta = Duration::try_seconds(seconds).ok_or(PolicyVaultError::TimeSourceFailure)?;
    t.checked_add_signed(delta)
        .ok_or(PolicyVaultError::TimeSourceFailure)
}

/// Canonical string form: RFC 3339, UTC, nanosecond precision, `Z` suffix.
///
/// ```text
/// 2026-01-01T00:00:00.000000000Z
/// ```
pub fn to_canonical_string(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn canonical_string_has_nanoseconds_and_z() {
        let t = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(to_canonical_string(t), "2026-01-01T00:00:00.000000000Z");
    }

    #[test]
    fn plus_one_year_of_seconds() {
        let t = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let later = plus_seconds(t, 365 * 86_400).unwrap();
        assert_eq!(later, Utc.with_ymd_and_hms(2027, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn plus_seconds_overflow_fails() {
        let t = DateTime::<Utc>::MAX_UTC;
        assert!(matches!(
            plus_seconds(t, 1),
            Err(PolicyVaultError::TimeSourceFailure)
        ));
    }

    #[test]
    fn system_clock_is_after_epoch() {
        assert!(SystemClock.now().unwrap().timestamp() > 0);
    }
}
