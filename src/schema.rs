//! Enrichment column layout.
//!
//! A partition row is the fixed five columns followed by the enrichment
//! suffix: `max_body_pages` body slots, one comment-count slot, then one slot
//! per comment up to the largest comment count being written.
//! [`EnrichmentSchema`] is the only place that width is computed; both the
//! header and the row padding read it from here.

use crate::models::{EnrichedRow, FIXED_HEADER};

pub const COMMENT_COUNT_LABEL: &str = "コメント数";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnrichmentSchema {
    pub body_slots: usize,
    pub max_comments: usize,
}

impl EnrichmentSchema {
    pub fn new(body_slots: usize, max_comments: usize) -> Self {
        Self {
            body_slots,
            max_comments,
        }
    }

    /// Trailing cells per data row: body slots, count, comments.
    pub fn row_width(&self) -> usize {
        self.body_slots + 1 + self.max_comments
    }

    /// Comment label columns in the header; at least one so the header always
    /// announces where comments go.
    pub fn comment_labels(&self) -> usize {
        self.max_comments.max(1)
    }

    /// Full header row: fixed labels, body labels, count label, comment labels.
    pub fn header(&self) -> Vec<String> {
        FIXED_HEADER
            .iter()
            .map(|s| s.to_string())
            .chain((1..=self.body_slots).map(|i| format!("本文{i}")))
            .chain(std::iter::once(COMMENT_COUNT_LABEL.to_string()))
            .chain((1..=self.comment_labels()).map(|i| format!("コメント{i}")))
            .collect()
    }

    /// Flatten one enriched row into exactly [`Self::row_width`] cells.
    pub fn layout(&self, row: &EnrichedRow) -> Vec<String> {
        let mut cells: Vec<String> = row
            .body_pages
            .iter()
            .take(self.body_slots)
            .cloned()
            .collect();
        cells.resize(self.body_slots, String::new());
        cells.push(row.comment_count().to_string());
        cells.extend(row.comments.iter().take(self.max_comments).cloned());
        cells.resize(self.row_width(), String::new());
        cells
    }
}

/// Size the schema to the widest row and lay every row out to that width.
pub fn widen(rows: &[EnrichedRow], body_slots: usize) -> (Vec<String>, Vec<Vec<String>>) {
    let max_comments = rows.iter().map(EnrichedRow::comment_count).max().unwrap_or(0);
    let schema = EnrichmentSchema::new(body_slots, max_comments);
    let padded = rows.iter().map(|r| schema.layout(r)).collect();
    (schema.header(), padded)
}

/// Blank out whatever an earlier, wider write left past the new layout.
///
/// `previous_width` is the full width (fixed columns included) of the header
/// row already in the partition. The header and every row are padded with
/// empty cells up to it; nothing is ever shortened.
pub fn cover_previous_width(header: &mut Vec<String>, rows: &mut [Vec<String>], previous_width: usize) {
    if header.len() < previous_width {
        header.resize(previous_width, String::new());
    }
    let row_width = previous_width.saturating_sub(FIXED_HEADER.len());
    for row in rows.iter_mut().filter(|r| r.len() < row_width) {
        row.resize(row_width, String::new());
    }
}
