use chrono::{TimeZone, Utc};
use chrono_tz::Tz;

/// 获取当前 UTC 时间戳（毫秒）
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Location-local business day (`YYYY-MM-DD`) of a UTC millisecond instant.
///
/// Returns `None` for instants chrono cannot represent.
pub fn local_date(millis: i64, tz: Tz) -> Option<String> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .map(|utc| utc.with_timezone(&tz).format("%Y-%m-%d").to_string())
}

/// Parse an IANA time zone name (`America/New_York`).
pub fn parse_time_zone(name: &str) -> Option<Tz> {
    name.trim().parse::<Tz>().ok()
}
