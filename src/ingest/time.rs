//! Timestamp parsing for sources that report in Korean local time.
//!
//! Every upstream emits +09:00 wall-clock timestamps without an offset
//! marker; these helpers convert them to UTC. Malformed input yields
//! `None` — adapters must never fail a whole batch over one bad time.

use std::sync::LazyLock;

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};

/// Korea Standard Time, +09:00.
static KST: LazyLock<FixedOffset> =
    LazyLock::new(|| FixedOffset::east_opt(9 * 3600).expect("valid fixed offset"));

fn kst() -> FixedOffset {
    *KST
}

/// Parses a KST timestamp in the given `chrono` format string.
#[must_use]
pub fn parse_kst(input: &str, format: &str) -> Option<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(input.trim(), format).ok()?;
    kst()
        .from_local_datetime(&naive)
        .single()
        .map(|local| local.with_timezone(&Utc))
}

/// `2025/12/25 05:14:43` style.
#[must_use]
pub fn parse_kst_slash(input: &str) -> Option<DateTime<Utc>> {
    parse_kst(input, "%Y/%m/%d %H:%M:%S")
}

/// `2025-12-25 05:14:43` style.
#[must_use]
pub fn parse_kst_dash(input: &str) -> Option<DateTime<Utc>> {
    parse_kst(input, "%Y-%m-%d %H:%M:%S")
}

/// `20251225051443` style.
#[must_use]
pub fn parse_kst_compact(input: &str) -> Option<DateTime<Utc>> {
    parse_kst(input, "%Y%m%d%H%M%S")
}

/// Formats a UTC instant as a compact KST timestamp (`YYYYMMDDHHMMSS`).
#[must_use]
pub fn to_kst_compact(instant: DateTime<Utc>) -> String {
    instant.with_timezone(&kst()).format("%Y%m%d%H%M%S").to_string()
}

/// Converts epoch seconds to UTC, rejecting out-of-range values.
#[must_use]
pub fn from_epoch_secs(secs: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0).single()
}
