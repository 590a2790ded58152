//! Active Directory file time.
//!
//! `pwdLastSet` and friends are stored as the number of 100 nanosecond
//! intervals since 1601-01-01 UTC.

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};

/// Seconds between 1601-01-01 and the Unix epoch.
const EPOCH_DIFFERENCE: i64 = 11_644_473_600;
const TICKS_PER_SECOND: i64 = 10_000_000;
const NANOS_PER_TICK: i64 = 100;

/// Parse ticks into a UTC timestamp.
pub fn parse_ticks(ticks: &str) -> Result<DateTime<Utc>> {
    let ticks: i64 = ticks
        .trim()
        .parse()
        .map_err(|err| Error::invalid("ticks", err))?;

    if ticks < 0 {
        return Err(Error::invalid("ticks", "negative value"));
    }

    let secs = ticks / TICKS_PER_SECOND - EPOCH_DIFFERENCE;
    let nanos = (ticks % TICKS_PER_SECOND) * NANOS_PER_TICK;

    DateTime::from_timestamp(secs, nanos as u32)
        .ok_or_else(|| Error::invalid("ticks", "out of range"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_ticks() {
        let time = parse_ticks("131680504480000000").unwrap();
        assert_eq!(time, Utc.with_ymd_and_hms(2018, 4, 12, 23, 47, 28).unwrap());
    }

    #[test]
    fn test_unix_epoch() {
        let time = parse_ticks("116444736000000000").unwrap();
        assert_eq!(time.timestamp(), 0);

        let time = parse_ticks("116444736000000015").unwrap();
        assert_eq!(time.timestamp_subsec_nanos(), 1500);
    }

    #[test]
    fn test_invalid_ticks() {
        assert!(parse_ticks("never").is_err());
        assert!(parse_ticks("-1").is_err());
    }
}
