//! Timestamp utilities

use chrono::{DateTime, SecondsFormat, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Current time as fractional seconds since the Unix epoch (result `ts` field)
pub fn epoch_seconds() -> f64 {
    let now = now();
    now.timestamp() as f64 + f64::from(now.timestamp_subsec_micros()) / 1_000_000.0
}

/// ISO-8601 UTC with microseconds and a trailing `Z` (log row `ts` column)
pub fn iso_utc(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Convert seconds to duration
pub fn secs_to_duration(secs: u64) -> std::time::Duration {
    std::time::Duration::from_secs(secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_epoch_seconds_is_recent() {
        let ts = epoch_seconds();
        assert!(ts > 946_684_800.0); // 2000-01-01 00:00:00 UTC
        assert!(ts < 4_102_444_800.0); // 2100-01-01 00:00:00 UTC
    }

    #[test]
    fn test_iso_utc_format() {
        let ts = Utc.with_ymd_and_hms(2025, 3, 4, 5, 6, 7).unwrap();
        assert_eq!(iso_utc(ts), "2025-03-04T05:06:07.000000Z");
    }

    #[tokio::test]
    async fn test_now_successive_calls_advance() {
        let time1 = now();
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        let time2 = now();
        assert!(time2 > time1);
    }

    #[test]
    fn test_secs_to_duration() {
        assert_eq!(secs_to_duration(3600).as_millis(), 3_600_000);
    }
}
