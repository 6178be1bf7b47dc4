//! Canonical timestamp ids: 17 UTC digits, `YYYYMMDDhhmmssSSS`.
//!
//! Item ids, backup session names, and `create`/`modify` fields all use this
//! format. Millisecond precision leaves room for the indexer's collision
//! strategy: when two files resolve to the same instant, the second advances
//! by one millisecond until the id is free.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use std::time::SystemTime;

const ID_FORMAT: &str = "%Y%m%d%H%M%S%3f";

/// Format a UTC instant as a 17-digit timestamp id.
pub fn datetime_to_id(dt: &DateTime<Utc>) -> String {
    dt.format(ID_FORMAT).to_string()
}

/// Parse a 17-digit timestamp id back into a UTC instant.
///
/// Returns `None` for anything that is not exactly 17 ASCII digits encoding
/// a valid calendar date/time.
pub fn id_to_datetime(id: &str) -> Option<DateTime<Utc>> {
    if id.len() != 17 || !id.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    NaiveDateTime::parse_from_str(id, ID_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// True if `s` is a well-formed timestamp id.
pub fn is_id(s: &str) -> bool {
    id_to_datetime(s).is_some()
}

/// Timestamp id for the current instant.
pub fn now_id() -> String {
    datetime_to_id(&Utc::now())
}

/// Advance an instant by one millisecond (collision stepping).
pub fn step(dt: &DateTime<Utc>) -> DateTime<Utc> {
    *dt + Duration::milliseconds(1)
}

/// Timestamp id for a filesystem time (ctime/mtime fallbacks).
pub fn system_time_to_id(time: SystemTime) -> String {
    datetime_to_id(&DateTime::<Utc>::from(time))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    // ========================================================================
    // Formatting and parsing
    // ========================================================================

    #[test]
    fn formats_seventeen_digits() {
        let dt = Utc.with_ymd_and_hms(2020, 1, 2, 3, 4, 5).unwrap()
            + Duration::milliseconds(67);
        assert_eq!(datetime_to_id(&dt), "20200102030405067");
    }

    #[test]
    fn round_trips() {
        let id = "20200101000000000";
        let dt = id_to_datetime(id).unwrap();
        assert_eq!(datetime_to_id(&dt), id);
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(id_to_datetime("20200101000000").is_none());
        assert!(id_to_datetime("202001010000000000").is_none());
        assert!(id_to_datetime("").is_none());
    }

    #[test]
    fn rejects_non_digits() {
        assert!(id_to_datetime("2020010100000000x").is_none());
        assert!(id_to_datetime("2020-101000000000").is_none());
    }

    #[test]
    fn rejects_impossible_dates() {
        assert!(id_to_datetime("20201301000000000").is_none()); // month 13
        assert!(id_to_datetime("20200132000000000").is_none()); // day 32
        assert!(id_to_datetime("20200101250000000").is_none()); // hour 25
    }

    // ========================================================================
    // Stepping
    // ========================================================================

    #[test]
    fn step_advances_one_millisecond() {
        let dt = id_to_datetime("20200101000000999").unwrap();
        assert_eq!(datetime_to_id(&step(&dt)), "20200101000001000");
    }

    #[test]
    fn now_id_is_well_formed() {
        assert!(is_id(&now_id()));
    }
}
