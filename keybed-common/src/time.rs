//! Timestamps
//!
//! Catalog rows store timestamps as RFC 3339 text with millisecond precision
//! so they sort lexicographically.

use chrono::{DateTime, Utc};

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// RFC 3339, millisecond precision, `Z` suffix
pub fn to_storage_string(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
