//! Data models shared by the transfer and enrichment stages.
//!
//! - [`CellValue`]: a typed cell as read back from a table range
//! - [`SourceRecord`]: one article reference from the source feed
//! - [`Window`]: the daily 15:00-anchored acceptance interval
//! - [`ArticleBody`] / [`FetchResult`]: what the scrapers bring back per URL
//! - [`EnrichedRow`]: the flattened enrichment suffix for one partition row

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};

/// Label written into the first column of every transferred row and used as
/// the first header cell of a partition.
pub const HEADER_SOURCE_LABEL: &str = "ソース";

/// English spelling of the first header cell, still recognised when reading.
pub const HEADER_SOURCE_LABEL_EN: &str = "Source";

/// The fixed five-column prefix of every partition row.
pub const FIXED_HEADER: [&str; 5] = [HEADER_SOURCE_LABEL, "タイトル", "URL", "投稿日", "引用元"];

/// Zero-based index of the URL (dedup key) column.
pub const URL_COLUMN: usize = 2;

/// Placeholder for title/date values that could not be extracted.
pub const UNAVAILABLE: &str = "unavailable";

/// A single cell read back from a table range.
///
/// The Sheets API only ever produces `Empty`, `Text`, `Number` and `Bool`;
/// the date variants cover stores that hand back typed dates.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Zoned(DateTime<FixedOffset>),
}

impl CellValue {
    /// Render the cell as display text, trimmed. Non-text cells use their
    /// natural string form.
    pub fn as_text(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Text(s) => s.trim().to_string(),
            CellValue::Number(n) => n.to_string(),
            CellValue::Bool(b) => b.to_string(),
            CellValue::Date(d) => d.to_string(),
            CellValue::DateTime(dt) => dt.to_string(),
            CellValue::Zoned(dt) => dt.to_rfc3339(),
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        if value.is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(value.to_string())
        }
    }
}

impl From<serde_json::Value> for CellValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => CellValue::Empty,
            Value::Bool(b) => CellValue::Bool(b),
            Value::Number(n) => n.as_f64().map(CellValue::Number).unwrap_or(CellValue::Empty),
            Value::String(s) if s.is_empty() => CellValue::Empty,
            Value::String(s) => CellValue::Text(s),
            other => CellValue::Text(other.to_string()),
        }
    }
}

/// One article reference read from the source feed.
///
/// Columns are `title, url, postedAt, citeSource`; missing trailing cells
/// read as empty.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRecord {
    pub title: String,
    pub url: String,
    pub posted_raw: CellValue,
    pub cite_source: String,
}

impl SourceRecord {
    pub fn from_row(row: &[CellValue]) -> Self {
        let cell = |i: usize| row.get(i).cloned().unwrap_or(CellValue::Empty);
        SourceRecord {
            title: cell(0).as_text(),
            url: cell(1).as_text(),
            posted_raw: cell(2),
            cite_source: cell(3).as_text(),
        }
    }
}

/// The acceptance interval for one run, both ends inclusive, both in UTC+9.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
}

impl Window {
    pub fn contains(&self, ts: &DateTime<FixedOffset>) -> bool {
        self.start <= *ts && *ts <= self.end
    }
}

/// Article page 1 metadata plus every distinct body page collected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleBody {
    pub title: String,
    pub article_date: String,
    pub pages: Vec<String>,
}

impl Default for ArticleBody {
    fn default() -> Self {
        ArticleBody {
            title: UNAVAILABLE.to_string(),
            article_date: UNAVAILABLE.to_string(),
            pages: Vec::new(),
        }
    }
}

/// Everything fetched for one URL before it is flattened into a row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResult {
    pub body: ArticleBody,
    pub comments: Vec<String>,
}

/// Enrichment suffix for one partition row, before width padding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichedRow {
    pub body_pages: Vec<String>,
    pub comments: Vec<String>,
}

impl EnrichedRow {
    /// The row a failed (or blank) URL degrades to: no body, count 0.
    pub fn degraded() -> Self {
        EnrichedRow {
            body_pages: Vec::new(),
            comments: Vec::new(),
        }
    }

    pub fn comment_count(&self) -> usize {
        self.comments.len()
    }
}

impl From<FetchResult> for EnrichedRow {
    fn from(result: FetchResult) -> Self {
        EnrichedRow {
            body_pages: result.body.pages,
            comments: result.comments,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_source_record_from_short_row() {
        let row = vec![CellValue::from(" Title "), CellValue::from("https://x/a")];
        let rec = SourceRecord::from_row(&row);
        assert_eq!(rec.title, "Title");
        assert_eq!(rec.url, "https://x/a");
        assert_eq!(rec.posted_raw, CellValue::Empty);
        assert_eq!(rec.cite_source, "");
    }

    #[test]
    fn test_cell_value_from_json() {
        assert_eq!(CellValue::from(serde_json::json!(null)), CellValue::Empty);
        assert_eq!(CellValue::from(serde_json::json!("")), CellValue::Empty);
        assert_eq!(
            CellValue::from(serde_json::json!(45889.5)),
            CellValue::Number(45889.5)
        );
        assert_eq!(
            CellValue::from(serde_json::json!("8/20 15:01")),
            CellValue::Text("8/20 15:01".into())
        );
    }

    #[test]
    fn test_window_contains_is_inclusive() {
        let jst = FixedOffset::east_opt(9 * 3600).unwrap();
        let start = jst.with_ymd_and_hms(2025, 8, 19, 15, 0, 0).unwrap();
        let end = jst.with_ymd_and_hms(2025, 8, 20, 14, 59, 59).unwrap();
        let w = Window { start, end };
        assert!(w.contains(&start));
        assert!(w.contains(&end));
        assert!(!w.contains(&(end + chrono::Duration::seconds(1))));
    }

    #[test]
    fn test_degraded_row_has_zero_comments() {
        let row = EnrichedRow::degraded();
        assert_eq!(row.comment_count(), 0);
        assert!(row.body_pages.is_empty());
    }
}
