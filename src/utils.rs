use chrono::{DateTime, SecondsFormat, Utc};

/// Format Unix millisecond timestamp to human-readable string
pub fn format_timestamp_millis(ts: i64) -> String {
    let dt = DateTime::<Utc>::from_timestamp_millis(ts).unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
    dt.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Current time as ISO-8601 with millisecond precision, e.g. `2024-05-01T10:00:00.123Z`
pub fn iso_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
