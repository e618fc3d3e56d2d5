//! Date helpers for platform-local (UTC+8) timestamps

use chrono::{DateTime, FixedOffset, Offset, TimeZone, Utc};

const PLATFORM_OFFSET_SECS: i32 = 8 * 3600;

/// The platform publishes schedules in China Standard Time
pub fn platform_offset() -> FixedOffset {
    FixedOffset::east_opt(PLATFORM_OFFSET_SECS).unwrap_or(Utc.fix())
}

/// `yyyyMMdd` in platform-local time
pub fn date_string(now: DateTime<Utc>) -> String {
    now.with_timezone(&platform_offset())
        .format("%Y%m%d")
        .to_string()
}

/// XMLTV timestamp (`yyyyMMddHHmmss +0800`) for epoch milliseconds
pub fn guide_timestamp(epoch_millis: i64) -> Option<String> {
    let offset = platform_offset();
    offset
        .timestamp_millis_opt(epoch_millis)
        .single()
        .map(|dt| dt.format("%Y%m%d%H%M%S %z").to_string())
}

/// `HH:MM` slice of a platform `yyyy-MM-dd HH:mm:ss` string
pub fn clock_of(datetime: &str) -> Option<&str> {
    datetime.get(11..16)
}
