//! Tabular store seam.
//!
//! The pipeline only ever talks to a destination (and a source) through the
//! five operations on [`TableStore`]. Partitions are sheet tabs; ranges are
//! A1 notation relative to one tab (e.g. `A:E`, `C2:C`, `F2`).
//!
//! # Implementations
//!
//! | Store | Module | Notes |
//! |-------|--------|-------|
//! | Google Sheets v4 | [`sheets`] | REST over `reqwest`, bearer token |
//! | In-memory | `memory` | test builds only |
//!
//! No call is assumed to be atomic with any other.

use crate::models::CellValue;
use std::error::Error;

#[cfg(test)]
pub mod memory;
pub mod sheets;

/// Widest sheet the store supports (`A` through `ZZZ`).
pub const MAX_COLUMNS: usize = 18_278;

/// Rows of cells as read back from a range.
pub type Rows = Vec<Vec<CellValue>>;

/// How the store interprets written strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueInput {
    /// Parsed as if typed in: `8/20 15:01` becomes a date, `=x` a formula.
    UserEntered,
    /// Stored verbatim as text.
    Raw,
}

impl ValueInput {
    /// The Sheets `valueInputOption` spelling.
    pub fn as_param(self) -> &'static str {
        match self {
            ValueInput::UserEntered => "USER_ENTERED",
            ValueInput::Raw => "RAW",
        }
    }
}

/// Black-box capabilities the pipeline consumes from a spreadsheet-like store.
pub trait TableStore {
    /// Read a rectangular range of one partition. Trailing empty rows and
    /// cells may be omitted by the store.
    async fn get_range(&self, partition: &str, range: &str) -> Result<Rows, Box<dyn Error>>;

    /// Append rows after the last non-empty row of the partition, parsed as
    /// user input.
    async fn append_rows(&self, partition: &str, rows: &[Vec<String>]) -> Result<(), Box<dyn Error>>;

    /// Overwrite cells starting at `top_left` (e.g. `F2`).
    async fn update_range(
        &self,
        partition: &str,
        top_left: &str,
        rows: &[Vec<String>],
        input: ValueInput,
    ) -> Result<(), Box<dyn Error>>;

    /// Create the partition if it does not exist yet. Returns `true` when a
    /// new partition was created.
    async fn ensure_partition_exists(&self, partition: &str) -> Result<bool, Box<dyn Error>>;

    /// Names of every partition in the store.
    async fn list_partitions(&self) -> Result<Vec<String>, Box<dyn Error>>;
}

/// Convert a zero-based column index to its A1 letters (`0 -> A`, `26 -> AA`).
pub fn column_letter(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push((b'A' + rem as u8) as char);
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// Convert A1 column letters back to a zero-based index.
pub fn column_index(letters: &str) -> Option<usize> {
    if letters.is_empty() {
        return None;
    }
    let mut n = 0usize;
    for c in letters.chars() {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        n = n * 26 + (c.to_ascii_uppercase() as u8 - b'A' + 1) as usize;
    }
    Some(n - 1)
}

/// Split an A1 cell reference into zero-based `(column, row)`. The row part
/// is optional (`C` -> `(2, None)`).
pub fn parse_cell(cell: &str) -> Option<(usize, Option<usize>)> {
    let split = cell.find(|c: char| c.is_ascii_digit()).unwrap_or(cell.len());
    let (letters, digits) = cell.split_at(split);
    let col = column_index(letters)?;
    if digits.is_empty() {
        return Some((col, None));
    }
    let row: usize = digits.parse().ok()?;
    if row == 0 {
        return None;
    }
    Some((col, Some(row - 1)))
}

/// A1 reference for a zero-based cell position (`(5, 1) -> F2`).
pub fn cell_ref(col: usize, row: usize) -> String {
    format!("{}{}", column_letter(col), row + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_letter() {
        assert_eq!(column_letter(0), "A");
        assert_eq!(column_letter(5), "F");
        assert_eq!(column_letter(25), "Z");
        assert_eq!(column_letter(26), "AA");
        assert_eq!(column_letter(701), "ZZ");
        assert_eq!(column_letter(702), "AAA");
    }

    #[test]
    fn test_column_index_round_trips_letters() {
        assert_eq!(column_index("A"), Some(0));
        assert_eq!(column_index("f"), Some(5));
        assert_eq!(column_index("AA"), Some(26));
        assert_eq!(column_index(""), None);
        assert_eq!(column_index("A1"), None);
    }

    #[test]
    fn test_value_input_param() {
        assert_eq!(ValueInput::UserEntered.as_param(), "USER_ENTERED");
        assert_eq!(ValueInput::Raw.as_param(), "RAW");
    }

    #[test]
    fn test_parse_cell() {
        assert_eq!(parse_cell("F2"), Some((5, Some(1))));
        assert_eq!(parse_cell("C"), Some((2, None)));
        assert_eq!(parse_cell("A0"), None);
        assert_eq!(cell_ref(5, 1), "F2");
    }
}
