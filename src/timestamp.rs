//! Recording timestamp embedded in dashcam filenames.
//!
//! The camera names clips `YYYY_MM_DD_HHMMSS[_NN][_b].EXT`, e.g.
//! `2026_01_24_115023_00.TS` (rear clips carry an extra `_b`).  Anything after
//! the seconds field is ignored.

use chrono::NaiveDateTime;

/// `YYYY_MM_DD_HHMMSS`: `D` is a digit, `_` a literal underscore.
const PATTERN: &[u8] = b"DDDD_DD_DD_DDDDDD";

/// Extract the capture time from `filename`.
///
/// Returns `None` when no part of the name matches the pattern or the fields
/// do not form a real calendar date/time.  The camera clock has no zone, so
/// the result is a naive (camera-local) timestamp.
pub fn parse_datetime(filename: &str) -> Option<NaiveDateTime> {
    let bytes = filename.as_bytes();
    let start = bytes
        .windows(PATTERN.len())
        .position(matches_pattern)?;
    let f = &filename[start..start + PATTERN.len()];

    let num = |range: std::ops::Range<usize>| f[range].parse::<u32>().ok();
    let year   = num(0..4)? as i32;
    let month  = num(5..7)?;
    let day    = num(8..10)?;
    let hour   = num(11..13)?;
    let minute = num(13..15)?;
    let second = num(15..17)?;

    chrono::NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)
}

fn matches_pattern(window: &[u8]) -> bool {
    window.iter().zip(PATTERN).all(|(b, p)| match p {
        b'D' => b.is_ascii_digit(),
        _    => b == p,
    })
}

/// Gallery label `DD.MM.YYYY HH:MM`; empty when there is no timestamp.
pub fn format_label(ts: Option<&NaiveDateTime>) -> String {
    ts.map(|t| t.format("%d.%m.%Y %H:%M").to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn front_clip_name() {
        let ts = parse_datetime("2026_01_24_115023_00.TS").unwrap();
        assert_eq!(ts.year(), 2026);
        assert_eq!(ts.month(), 1);
        assert_eq!(ts.month0(), 0);
        assert_eq!(ts.day(), 24);
        assert_eq!((ts.hour(), ts.minute(), ts.second()), (11, 50, 23));
    }

    #[test]
    fn rear_suffix_and_leading_path_ignored() {
        let ts = parse_datetime("sd//back_norm/2025_12_31_235959_07_b.TS").unwrap();
        assert_eq!((ts.year(), ts.month(), ts.day()), (2025, 12, 31));
        assert_eq!((ts.hour(), ts.minute(), ts.second()), (23, 59, 59));
    }

    #[test]
    fn non_matching_names_have_no_timestamp() {
        assert!(parse_datetime("not_a_valid_name.TS").is_none());
        assert!(parse_datetime("").is_none());
        assert!(parse_datetime("2026_01_24_1150.TS").is_none());
        // shape matches, calendar does not
        assert!(parse_datetime("2026_13_24_115023_00.TS").is_none());
        assert!(parse_datetime("2026_02_30_115023_00.TS").is_none());
    }

    #[test]
    fn label() {
        let ts = parse_datetime("2026_01_24_115023_00.TS");
        assert_eq!(format_label(ts.as_ref()), "24.01.2026 11:50");
        assert_eq!(format_label(None), "");
    }
}
