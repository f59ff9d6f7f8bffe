//! In-memory [`TableStore`] used by the stage tests.
//!
//! Mirrors the Sheets behaviour the pipeline relies on: reads drop trailing
//! empty cells and rows, appends land after the last non-empty row.

use super::{Rows, TableStore, ValueInput, parse_cell};
use crate::models::CellValue;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::error::Error;

#[derive(Debug, Default)]
pub struct MemoryStore {
    tabs: RefCell<BTreeMap<String, Vec<Vec<String>>>>,
    pub writes: Cell<usize>,
    pub fail_reads: Cell<bool>,
    /// Input option of every `update_range` call, in order.
    pub update_inputs: RefCell<Vec<ValueInput>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tab(self, name: &str, rows: &[&[&str]]) -> Self {
        let rows = rows
            .iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect();
        self.tabs.borrow_mut().insert(name.to_string(), rows);
        self
    }

    pub fn tab(&self, name: &str) -> Vec<Vec<String>> {
        self.tabs.borrow().get(name).cloned().unwrap_or_default()
    }

    fn last_filled_row(rows: &[Vec<String>]) -> usize {
        rows.iter()
            .rposition(|r| r.iter().any(|c| !c.is_empty()))
            .map(|i| i + 1)
            .unwrap_or(0)
    }
}

fn bounds(range: &str) -> Result<(usize, Option<usize>, usize, Option<usize>), Box<dyn Error>> {
    let (start, end) = range.split_once(':').unwrap_or((range, range));
    let (c0, r0) = parse_cell(start).ok_or_else(|| format!("bad range start: {range}"))?;
    let (c1, r1) = parse_cell(end).ok_or_else(|| format!("bad range end: {range}"))?;
    Ok((c0, r0, c1, r1))
}

impl TableStore for MemoryStore {
    async fn get_range(&self, partition: &str, range: &str) -> Result<Rows, Box<dyn Error>> {
        if self.fail_reads.get() {
            return Err("store unreachable".into());
        }
        let tabs = self.tabs.borrow();
        let rows = tabs
            .get(partition)
            .ok_or_else(|| format!("no such partition: {partition}"))?;
        let (c0, r0, c1, r1) = bounds(range)?;
        let first = r0.unwrap_or(0);
        let last = r1.map(|r| r + 1).unwrap_or(rows.len()).min(rows.len());

        let mut out: Rows = (first..last)
            .map(|i| {
                let mut cells: Vec<CellValue> = (c0..=c1)
                    .map(|c| rows[i].get(c).map(|s| CellValue::from(s.as_str())).unwrap_or(CellValue::Empty))
                    .collect();
                while matches!(cells.last(), Some(CellValue::Empty)) {
                    cells.pop();
                }
                cells
            })
            .collect();
        while matches!(out.last(), Some(r) if r.is_empty()) {
            out.pop();
        }
        Ok(out)
    }

    async fn append_rows(&self, partition: &str, rows: &[Vec<String>]) -> Result<(), Box<dyn Error>> {
        self.writes.set(self.writes.get() + 1);
        let mut tabs = self.tabs.borrow_mut();
        let tab = tabs
            .get_mut(partition)
            .ok_or_else(|| format!("no such partition: {partition}"))?;
        let at = Self::last_filled_row(tab);
        tab.truncate(at);
        tab.extend(rows.iter().cloned());
        Ok(())
    }

    async fn update_range(
        &self,
        partition: &str,
        top_left: &str,
        rows: &[Vec<String>],
        input: ValueInput,
    ) -> Result<(), Box<dyn Error>> {
        self.writes.set(self.writes.get() + 1);
        self.update_inputs.borrow_mut().push(input);
        let (col, row) = parse_cell(top_left).ok_or_else(|| format!("bad cell: {top_left}"))?;
        let row = row.unwrap_or(0);
        let mut tabs = self.tabs.borrow_mut();
        let tab = tabs
            .get_mut(partition)
            .ok_or_else(|| format!("no such partition: {partition}"))?;
        for (i, values) in rows.iter().enumerate() {
            if tab.len() <= row + i {
                tab.resize(row + i + 1, Vec::new());
            }
            let target = &mut tab[row + i];
            if target.len() < col + values.len() {
                target.resize(col + values.len(), String::new());
            }
            for (j, v) in values.iter().enumerate() {
                target[col + j] = v.clone();
            }
        }
        Ok(())
    }

    async fn ensure_partition_exists(&self, partition: &str) -> Result<bool, Box<dyn Error>> {
        let mut tabs = self.tabs.borrow_mut();
        if tabs.contains_key(partition) {
            return Ok(false);
        }
        tabs.insert(partition.to_string(), Vec::new());
        Ok(true)
    }

    async fn list_partitions(&self) -> Result<Vec<String>, Box<dyn Error>> {
        Ok(self.tabs.borrow().keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_range_trims_like_sheets() {
        let store = MemoryStore::new().with_tab("t", &[&["a", "b", "c"], &["d", "", "f"], &["", "", ""]]);
        let rows = store.get_range("t", "C2:C").await.unwrap();
        assert_eq!(rows, vec![vec![CellValue::Text("f".into())]]);
        let rows = store.get_range("t", "A:B").await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1], vec![CellValue::Text("d".into())]);
    }

    #[tokio::test]
    async fn test_append_and_update() {
        let store = MemoryStore::new();
        assert!(store.ensure_partition_exists("t").await.unwrap());
        assert!(!store.ensure_partition_exists("t").await.unwrap());
        store.append_rows("t", &[vec!["h".into()]]).await.unwrap();
        store.append_rows("t", &[vec!["r1".into()]]).await.unwrap();
        store
            .update_range("t", "C2", &[vec!["x".into(), "y".into()]], ValueInput::Raw)
            .await
            .unwrap();
        assert_eq!(
            store.tab("t"),
            vec![vec!["h".to_string()], vec!["r1".into(), "".into(), "x".into(), "y".into()]]
        );
        assert_eq!(store.writes.get(), 3);
    }
}
