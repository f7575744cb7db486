//! Date-time parsing for capture timestamps.
//!
//! Video clips rarely carry EXIF, so their timestamp comes from a fixed
//! fallback chain: the container's `creation_time` tag, then a date-shaped
//! run of digits in the file name. Changing the patterns or their order
//! changes where clips sort in the catalog.

use std::path::Path;
use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;

const EXIF_DATETIME_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

fn date_time_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\d{8}_\d{6}").expect("valid date-time pattern"))
}

fn date_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\d{8}").expect("valid date pattern"))
}

/// Parse an EXIF `DateTime*` value (`YYYY:MM:DD HH:MM:SS`), read as UTC.
pub fn parse_exif_datetime(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw.trim(), EXIF_DATETIME_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Parse a container `creation_time` tag.
pub fn parse_creation_time(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}

/// Recover a timestamp from names like `VID_20210612_140322.mp4` or `20210612.mov`.
pub fn from_filename(path: &Path) -> Option<DateTime<Utc>> {
    let name = path.file_name()?.to_str()?;

    if let Some(found) = date_time_pattern().find(name) {
        let normalized = found.as_str().replace('_', "T");
        if let Ok(naive) = NaiveDateTime::parse_from_str(&normalized, "%Y%m%dT%H%M%S") {
            return Some(naive.and_utc());
        }
    }

    let found = date_pattern().find(name)?;
    NaiveDate::parse_from_str(found.as_str(), "%Y%m%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn exif_datetimes_are_read_as_utc() {
        let parsed = parse_exif_datetime("2019:05:05 10:11:12 ").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2019, 5, 5, 10, 11, 12).unwrap());
        assert_eq!(parse_exif_datetime("0000:00:00 00:00:00"), None);
    }

    #[test]
    fn creation_time_accepts_ffprobe_shapes() {
        let expected = Utc.with_ymd_and_hms(2021, 6, 12, 14, 3, 22).unwrap();
        assert_eq!(
            parse_creation_time("2021-06-12T14:03:22.000000Z"),
            Some(expected)
        );
        assert_eq!(parse_creation_time("2021-06-12 14:03:22"), Some(expected));
        assert_eq!(
            parse_creation_time("2021-06-12T14:03:22.5"),
            Some(expected + chrono::Duration::milliseconds(500))
        );
        assert_eq!(parse_creation_time("yesterday"), None);
    }

    #[test]
    fn filename_with_date_and_time() {
        let parsed = from_filename(Path::new("/clips/VID_20210612_140322.mp4")).unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2021, 6, 12, 14, 3, 22).unwrap());
    }

    #[test]
    fn filename_with_date_only_is_midnight() {
        let parsed = from_filename(Path::new("holiday-20200101.mov")).unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn invalid_time_falls_back_to_date() {
        let parsed = from_filename(Path::new("20200101_996699.mp4")).unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn filenames_without_dates_yield_nothing() {
        assert_eq!(from_filename(Path::new("clip.mp4")), None);
        assert_eq!(from_filename(Path::new("99999999.mp4")), None);
    }
}
