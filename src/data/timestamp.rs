use chrono::{NaiveDate, NaiveDateTime};

/// Pattern of the acquisition timestamp embedded in measurement file names.
pub const FILE_NAME_FORMAT: &str = "%y%m%d_%H%M%S";

/// Formats accepted for timestamps in headers, HPLC tables and configs.
const DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
];

/// Parse a timestamp in any of the accepted text forms.
/// A bare date (`YYYY-MM-DD`) means midnight.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    DATE_TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Find the first `YYMMDD_HHMMSS` substring in a file name and parse it.
pub fn timestamp_from_file_name(name: &str) -> Option<NaiveDateTime> {
    let bytes = name.as_bytes();
    if bytes.len() < 13 {
        return None;
    }
    (0..=bytes.len() - 13).find_map(|start| {
        let window = &bytes[start..start + 13];
        let shaped = window.iter().enumerate().all(|(i, b)| {
            if i == 6 {
                *b == b'_'
            } else {
                b.is_ascii_digit()
            }
        });
        if !shaped {
            return None;
        }
        // The window is pure ASCII, so slicing the str here is safe.
        NaiveDateTime::parse_from_str(&name[start..start + 13], FILE_NAME_FORMAT).ok()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    #[test]
    fn file_name_timestamp_anywhere_in_name() {
        assert_eq!(
            timestamp_from_file_name("IMS_210301_081530_ferm1.csv"),
            Some(at(2021, 3, 1, 8, 15, 30))
        );
        assert_eq!(
            timestamp_from_file_name("210301_081530.mea"),
            Some(at(2021, 3, 1, 8, 15, 30))
        );
    }

    #[test]
    fn file_name_skips_invalid_candidates() {
        // 999999_999999 is shaped right but not a valid date
        assert_eq!(
            timestamp_from_file_name("999999_999999_210301_000001.csv"),
            Some(at(2021, 3, 1, 0, 0, 1))
        );
        assert_eq!(timestamp_from_file_name("blank.csv"), None);
        assert_eq!(timestamp_from_file_name("21030_081530.csv"), None);
    }

    #[test]
    fn parses_header_and_table_formats() {
        let expected = at(2021, 3, 1, 8, 15, 30);
        assert_eq!(parse_timestamp("2021-03-01T08:15:30"), Some(expected));
        assert_eq!(parse_timestamp("2021-03-01 08:15:30"), Some(expected));
        assert_eq!(parse_timestamp(" 01.03.2021 08:15:30 "), Some(expected));
        assert_eq!(parse_timestamp("2021-03-01"), Some(at(2021, 3, 1, 0, 0, 0)));
        assert_eq!(parse_timestamp("yesterday"), None);
    }
}
