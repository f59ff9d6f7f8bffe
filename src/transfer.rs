//! Transfer stage: source feed -> today's partition.
//!
//! Reads the source rows, keeps those whose posted-at timestamp falls inside
//! the run window and whose URL the partition has not seen, and appends them
//! in one write as `[source, title, url, displayTimestamp, citeSource]`.

use crate::ledger::{DedupLedger, existing_keys};
use crate::models::{FIXED_HEADER, HEADER_SOURCE_LABEL, SourceRecord, Window};
use crate::store::TableStore;
use crate::timestamps::{format_display, normalize};
use chrono::{DateTime, Datelike, FixedOffset};
use std::error::Error;
use tracing::{debug, error, info, instrument};

/// Why a source record was not staged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Skip {
    MissingField,
    Unparseable,
    OutsideWindow,
    Duplicate,
}

/// Per-run tallies of what happened to each source record.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TransferReport {
    pub read: usize,
    pub staged: usize,
    pub missing_field: usize,
    pub unparseable: usize,
    pub outside_window: usize,
    pub duplicate: usize,
}

impl TransferReport {
    fn count(&mut self, skip: Skip) {
        match skip {
            Skip::MissingField => self.missing_field += 1,
            Skip::Unparseable => self.unparseable += 1,
            Skip::OutsideWindow => self.outside_window += 1,
            Skip::Duplicate => self.duplicate += 1,
        }
    }
}

/// Decide one record. Returns the output row or the reason it was dropped.
fn stage_record(
    record: &SourceRecord,
    source_label: &str,
    window: &Window,
    now: DateTime<FixedOffset>,
    ledger: &mut DedupLedger,
) -> Result<Vec<String>, Skip> {
    if record.title.is_empty() || record.url.is_empty() {
        return Err(Skip::MissingField);
    }
    let posted = normalize(&record.posted_raw, now.year()).ok_or(Skip::Unparseable)?;
    if !window.contains(&posted) {
        return Err(Skip::OutsideWindow);
    }
    if !ledger.admit(&record.url) {
        return Err(Skip::Duplicate);
    }
    Ok(vec![
        source_label.to_string(),
        record.title.clone(),
        record.url.clone(),
        format_display(&posted),
        record.cite_source.clone(),
    ])
}

/// Filter source records down to the rows to append. `records` excludes the
/// source header row.
pub fn stage_rows(
    records: &[SourceRecord],
    source_label: &str,
    window: &Window,
    now: DateTime<FixedOffset>,
    ledger: &mut DedupLedger,
) -> (Vec<Vec<String>>, TransferReport) {
    let mut report = TransferReport {
        read: records.len(),
        ..Default::default()
    };
    let mut staged = Vec::new();
    for record in records {
        match stage_record(record, source_label, window, now, ledger) {
            Ok(row) => staged.push(row),
            Err(skip) => {
                debug!(url = %record.url, ?skip, "Skipped source record");
                report.count(skip);
            }
        }
    }
    report.staged = staged.len();
    (staged, report)
}

/// Write the 5-column header unless the partition already starts with it,
/// then append `rows` in one call. An empty batch writes nothing.
#[instrument(level = "info", skip(store, rows), fields(rows = rows.len()))]
pub async fn write_staged<S: TableStore>(
    store: &S,
    partition: &str,
    rows: &[Vec<String>],
) -> Result<(), Box<dyn Error>> {
    if rows.is_empty() {
        info!("Nothing new to append");
        return Ok(());
    }
    let first = store.get_range(partition, "A1:E1").await?;
    let has_header = first
        .first()
        .and_then(|r| r.first())
        .is_some_and(|c| c.as_text() == HEADER_SOURCE_LABEL);
    if !has_header {
        let header = vec![FIXED_HEADER.iter().map(|s| s.to_string()).collect()];
        store.append_rows(partition, &header).await?;
        info!("Wrote partition header");
    }
    store.append_rows(partition, rows).await?;
    info!(count = rows.len(), "Appended new rows");
    Ok(())
}

/// Read every record from the source sheet, skipping its header row. A read
/// failure is logged and treated as an empty feed.
#[instrument(level = "info", skip(source))]
pub async fn read_source<S: TableStore>(source: &S, sheet: &str) -> Vec<SourceRecord> {
    match source.get_range(sheet, "A:D").await {
        Ok(rows) => rows.iter().skip(1).map(|r| SourceRecord::from_row(r)).collect(),
        Err(e) => {
            error!(error = %e, "Failed to read source sheet; continuing with no records");
            Vec::new()
        }
    }
}

/// Run the whole transfer stage and return how many rows were appended.
#[instrument(level = "info", skip(source, dest, window, now))]
pub async fn transfer<S: TableStore, D: TableStore>(
    source: &S,
    source_sheet: &str,
    dest: &D,
    partition: &str,
    window: &Window,
    now: DateTime<FixedOffset>,
) -> Result<usize, Box<dyn Error>> {
    info!(
        start = %window.start.format("%Y/%m/%d %H:%M:%S"),
        end = %window.end.format("%Y/%m/%d %H:%M:%S"),
        "Transfer window"
    );

    dest.ensure_partition_exists(partition).await?;
    let mut ledger = DedupLedger::new(existing_keys(dest, partition).await?);

    let records = read_source(source, source_sheet).await;
    let (rows, report) = stage_rows(&records, source_sheet, window, now, &mut ledger);
    info!(
        read = report.read,
        staged = report.staged,
        missing_field = report.missing_field,
        unparseable = report.unparseable,
        outside_window = report.outside_window,
        duplicate = report.duplicate,
        "Staged source records"
    );

    write_staged(dest, partition, &rows).await?;
    Ok(rows.len())
}
