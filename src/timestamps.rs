//! Timestamp normalization, the daily acceptance window and partition keys.
//!
//! Every timestamp this crate compares is pinned to UTC+9. The reference
//! instant ("now") is computed once in `main` and passed in everywhere, so a
//! single run never straddles two different days.

use crate::models::{CellValue, Window};
use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use once_cell::sync::Lazy;
use tracing::debug;

const JST_OFFSET_SECS: i32 = 9 * 3600;

/// String encodings tried in order. The first one has no year and borrows
/// the reference year.
const YEARLESS_FORMAT: &str = "%Y/%m/%d %H:%M";
const FULL_FORMATS: [&str; 2] = ["%Y/%m/%d %H:%M", "%Y/%m/%d %H:%M:%S"];

static JST: Lazy<FixedOffset> =
    Lazy::new(|| FixedOffset::east_opt(JST_OFFSET_SECS).expect("UTC+9 is a valid offset"));

/// Spreadsheet serial epoch: 1899-12-30 00:00 in UTC+9.
static SERIAL_EPOCH: Lazy<DateTime<FixedOffset>> = Lazy::new(|| {
    let date = NaiveDate::from_ymd_opt(1899, 12, 30).expect("valid epoch date");
    pin(date.and_time(NaiveTime::MIN))
});

/// The fixed UTC+9 offset.
pub fn jst() -> FixedOffset {
    *JST
}

/// The current instant in UTC+9.
pub fn jst_now() -> DateTime<FixedOffset> {
    chrono::Utc::now().with_timezone(&jst())
}

fn pin(naive: NaiveDateTime) -> DateTime<FixedOffset> {
    // A fixed offset never yields an ambiguous or missing local time.
    jst()
        .from_local_datetime(&naive)
        .single()
        .unwrap_or_else(|| naive.and_utc().with_timezone(&jst()))
}

fn parse_text(raw: &str, reference_year: i32) -> Option<DateTime<FixedOffset>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    // "M/D H:MM": exactly one slash before the time part.
    let date_part = s.split_whitespace().next().unwrap_or("");
    if date_part.matches('/').count() == 1 {
        let with_year = format!("{reference_year}/{s}");
        if let Ok(naive) = NaiveDateTime::parse_from_str(&with_year, YEARLESS_FORMAT) {
            return Some(pin(naive));
        }
    }

    FULL_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(pin)
}

fn from_serial(days: f64) -> Option<DateTime<FixedOffset>> {
    if !days.is_finite() {
        return None;
    }
    // `as` saturates; try_seconds rejects anything TimeDelta cannot hold.
    let secs = (days * 86_400.0).round() as i64;
    SERIAL_EPOCH.checked_add_signed(Duration::try_seconds(secs)?)
}

/// Normalize a raw posted-at cell into a UTC+9 timestamp.
///
/// Strings are tried as `M/D H:MM` (year taken from `reference_year`),
/// `YYYY/M/D H:MM`, then `YYYY/M/D H:MM:SS`. Numbers are day serials with
/// the fractional part as time of day. Typed dates keep their wall clock and
/// are pinned to UTC+9; zoned timestamps are converted. Anything else is
/// `None` and the caller drops the record.
pub fn normalize(raw: &CellValue, reference_year: i32) -> Option<DateTime<FixedOffset>> {
    let out = match raw {
        CellValue::Text(s) => parse_text(s, reference_year),
        CellValue::Number(n) => from_serial(*n),
        CellValue::Date(d) => Some(pin(d.and_time(NaiveTime::MIN))),
        CellValue::DateTime(dt) => Some(pin(*dt)),
        CellValue::Zoned(dt) => Some(dt.with_timezone(&jst())),
        CellValue::Empty | CellValue::Bool(_) => None,
    };
    if out.is_none() {
        debug!(?raw, "Could not normalize posted-at value");
    }
    out
}

/// The acceptance window for a run at `now`: from the previous calendar day
/// at 15:00:00 to `now`'s day at 14:59:59.
pub fn window_for(now: DateTime<FixedOffset>) -> Window {
    let open = NaiveTime::from_hms_opt(15, 0, 0).expect("valid time");
    let close = NaiveTime::from_hms_opt(14, 59, 59).expect("valid time");
    let now = now.with_timezone(&jst());
    let start_day = (now - Duration::hours(24)).date_naive();
    Window {
        start: pin(start_day.and_time(open)),
        end: pin(now.date_naive().and_time(close)),
    }
}

/// Partition key for `now`: `yyMMdd`, zero padded.
pub fn partition_key(now: DateTime<FixedOffset>) -> String {
    now.with_timezone(&jst()).format("%y%m%d").to_string()
}

/// Display form written to the destination: `yy/M/D HH:MM`, month and day
/// without leading zeros.
pub fn format_display(ts: &DateTime<FixedOffset>) -> String {
    let ts = ts.with_timezone(&jst());
    format!(
        "{}/{}/{} {}",
        ts.format("%y"),
        ts.month(),
        ts.day(),
        ts.format("%H:%M")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<FixedOffset> {
        jst().with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn test_normalize_yearless_uses_reference_year() {
        let raw = CellValue::Text("8/20 15:01".into());
        assert_eq!(normalize(&raw, 2025), Some(at(2025, 8, 20, 15, 1, 0)));
    }

    #[test]
    fn test_normalize_full_formats() {
        let raw = CellValue::Text("2025/1/5 9:03".into());
        assert_eq!(normalize(&raw, 1999), Some(at(2025, 1, 5, 9, 3, 0)));
        let raw = CellValue::Text("2025/08/20 15:01:30".into());
        assert_eq!(normalize(&raw, 1999), Some(at(2025, 8, 20, 15, 1, 30)));
    }

    #[test]
    fn test_normalize_rejects_garbage() {
        assert_eq!(normalize(&CellValue::Text("yesterday".into()), 2025), None);
        assert_eq!(normalize(&CellValue::Text("".into()), 2025), None);
        assert_eq!(normalize(&CellValue::Empty, 2025), None);
        assert_eq!(normalize(&CellValue::Bool(true), 2025), None);
        assert_eq!(normalize(&CellValue::Text("2/30 10:00".into()), 2025), None);
    }

    #[test]
    fn test_normalize_serial_number() {
        // 45889 days after 1899-12-30 is 2025-08-20; .625 is 15:00.
        let raw = CellValue::Number(45889.625);
        assert_eq!(normalize(&raw, 2000), Some(at(2025, 8, 20, 15, 0, 0)));
        assert_eq!(normalize(&CellValue::Number(f64::NAN), 2000), None);
    }

    #[test]
    fn test_normalize_out_of_range_serial_is_none() {
        let huge = CellValue::Number(9_223_372_036_854_776.0 / 86_400.0);
        assert_eq!(normalize(&huge, 2025), None);
        assert_eq!(normalize(&CellValue::Number(-1e300), 2025), None);
        assert_eq!(normalize(&CellValue::Number(f64::INFINITY), 2025), None);
    }

    #[test]
    fn test_normalize_typed_dates() {
        let d = NaiveDate::from_ymd_opt(2025, 8, 20).unwrap();
        assert_eq!(normalize(&CellValue::Date(d), 2000), Some(at(2025, 8, 20, 0, 0, 0)));

        let naive = d.and_hms_opt(10, 30, 0).unwrap();
        assert_eq!(
            normalize(&CellValue::DateTime(naive), 2000),
            Some(at(2025, 8, 20, 10, 30, 0))
        );

        let utc = chrono::Utc.with_ymd_and_hms(2025, 8, 20, 6, 0, 0).unwrap();
        let zoned = utc.with_timezone(&FixedOffset::east_opt(0).unwrap());
        let got = normalize(&CellValue::Zoned(zoned), 2000).unwrap();
        assert_eq!(got, at(2025, 8, 20, 15, 0, 0));
        assert_eq!(got.offset().local_minus_utc(), JST_OFFSET_SECS);
    }

    #[test]
    fn test_window_boundaries() {
        for now in [at(2025, 8, 20, 10, 0, 0), at(2025, 8, 20, 16, 30, 0), at(2025, 1, 1, 0, 0, 0)] {
            let w = window_for(now);
            assert_eq!(w.end - w.start, Duration::hours(24) - Duration::seconds(1));
            assert_eq!((w.start.hour(), w.start.minute(), w.start.second()), (15, 0, 0));
            assert_eq!((w.end.hour(), w.end.minute(), w.end.second()), (14, 59, 59));
        }
    }

    #[test]
    fn test_window_crosses_year() {
        let w = window_for(at(2025, 1, 1, 9, 0, 0));
        assert_eq!(w.start, at(2024, 12, 31, 15, 0, 0));
        assert_eq!(w.end, at(2025, 1, 1, 14, 59, 59));
    }

    #[test]
    fn test_window_admission_edges() {
        let w = window_for(at(2025, 8, 20, 12, 0, 0));
        assert!(w.contains(&at(2025, 8, 19, 15, 0, 0)));
        assert!(w.contains(&at(2025, 8, 20, 14, 59, 59)));
        assert!(!w.contains(&at(2025, 8, 20, 15, 0, 0)));
        assert!(!w.contains(&at(2025, 8, 19, 14, 59, 59)));
    }

    #[test]
    fn test_partition_key() {
        assert_eq!(partition_key(at(2025, 8, 20, 9, 0, 0)), "250820");
        assert_eq!(partition_key(at(2031, 1, 5, 23, 59, 0)), "310105");
    }

    #[test]
    fn test_format_display() {
        assert_eq!(format_display(&at(2025, 8, 20, 15, 1, 0)), "25/8/20 15:01");
        assert_eq!(format_display(&at(2025, 1, 5, 9, 3, 0)), "25/1/5 09:03");
    }
}
