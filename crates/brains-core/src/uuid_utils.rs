//! UUID v7 utilities for time-ordered identifiers.
//!
//! UUIDv7 embeds a millisecond Unix timestamp in the first 48 bits, giving
//! natural time-ordering for primary keys and efficient temporal queries.

use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

/// Generate a new UUIDv7 identifier.
///
/// IDs generated later are lexicographically greater, so `ORDER BY id`
/// doubles as creation-time ordering.
#[inline]
pub fn new_v7() -> Uuid {
    Uuid::now_v7()
}

/// Check whether a UUID is version 7.
#[inline]
pub fn is_v7(id: &Uuid) -> bool {
    id.get_version_num() == 7
}

/// Extract the embedded creation timestamp from a UUIDv7.
///
/// Returns None for non-v7 UUIDs or timestamps outside chrono's range.
pub fn extract_timestamp(id: &Uuid) -> Option<DateTime<Utc>> {
    if !is_v7(id) {
        return None;
    }
    let bytes = id.as_bytes();
    let millis = ((bytes[0] as u64) << 40)
        | ((bytes[1] as u64) << 32)
        | ((bytes[2] as u64) << 24)
        | ((bytes[3] as u64) << 16)
        | ((bytes[4] as u64) << 8)
        | (bytes[5] as u64);
    Utc.timestamp_millis_opt(millis as i64).single()
}
