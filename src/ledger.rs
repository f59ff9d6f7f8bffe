//! URL dedup ledger for one partition.
//!
//! The ledger is seeded from the URLs already in the partition and grows with
//! every URL admitted during the current batch, so a URL is staged at most
//! once per partition no matter how often it appears in the source.

use crate::models::{CellValue, HEADER_SOURCE_LABEL, HEADER_SOURCE_LABEL_EN, URL_COLUMN};
use crate::store::TableStore;
use std::collections::HashSet;
use std::error::Error;
use tracing::{info, instrument};

/// Whether a row's first cell is a partition header label, in either language.
pub fn is_header_row(row: &[CellValue]) -> bool {
    row.first()
        .map(|c| {
            let text = c.as_text();
            text == HEADER_SOURCE_LABEL || text == HEADER_SOURCE_LABEL_EN
        })
        .unwrap_or(false)
}

/// Read the non-empty URLs already present in `partition`.
#[instrument(level = "info", skip(store))]
pub async fn existing_keys<S: TableStore>(
    store: &S,
    partition: &str,
) -> Result<HashSet<String>, Box<dyn Error>> {
    let rows = store.get_range(partition, "A:E").await?;
    let skip = usize::from(rows.first().is_some_and(|r| is_header_row(r)));
    let keys: HashSet<String> = rows
        .iter()
        .skip(skip)
        .filter_map(|row| row.get(URL_COLUMN))
        .map(CellValue::as_text)
        .filter(|url| !url.is_empty())
        .collect();
    info!(count = keys.len(), "Existing URLs in partition");
    Ok(keys)
}

/// Known URLs for the partition plus everything admitted in this batch.
#[derive(Debug, Default)]
pub struct DedupLedger {
    known: HashSet<String>,
}

impl DedupLedger {
    pub fn new(existing: HashSet<String>) -> Self {
        Self { known: existing }
    }

    /// Admit `key` if it is non-empty and unseen; admitted keys are recorded
    /// so later duplicates in the same batch are refused.
    pub fn admit(&mut self, key: &str) -> bool {
        !key.is_empty() && self.known.insert(key.to_string())
    }
}
