//! Google Sheets v4 implementation of [`TableStore`].
//!
//! One client addresses one spreadsheet; partitions are its tabs. The access
//! token is taken as given: obtaining and refreshing it happens outside this
//! crate.

use super::{Rows, TableStore, ValueInput, parse_cell};
use crate::models::CellValue;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::time::Duration;
use tracing::{debug, info, instrument};

const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

#[derive(Debug, Serialize)]
struct ValuesBody<'a> {
    values: &'a [Vec<String>],
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetMeta>,
}

#[derive(Debug, Deserialize)]
struct SheetMeta {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
struct SheetProperties {
    title: String,
}

/// Sheets REST client bound to one spreadsheet.
#[derive(Debug, Clone)]
pub struct SheetsClient {
    http: Client,
    spreadsheet_id: String,
    access_token: String,
    base_url: String,
}

impl SheetsClient {
    pub fn new(spreadsheet_id: &str, access_token: &str, timeout: Duration) -> Result<Self, Box<dyn Error>> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            spreadsheet_id: spreadsheet_id.to_string(),
            access_token: access_token.to_string(),
            base_url: SHEETS_API_BASE.to_string(),
        })
    }

    fn values_url(&self, partition: &str, range: &str) -> String {
        format!(
            "{}/{}/values/{}",
            self.base_url,
            self.spreadsheet_id,
            urlencoding::encode(&qualified_range(partition, range))
        )
    }

    fn spreadsheet_url(&self) -> String {
        format!("{}/{}", self.base_url, self.spreadsheet_id)
    }
}

/// `'tab name'!A1` with embedded quotes doubled.
fn qualified_range(partition: &str, range: &str) -> String {
    format!("'{}'!{}", partition.replace('\'', "''"), range)
}

fn update_query(input: ValueInput) -> [(&'static str, &'static str); 1] {
    [("valueInputOption", input.as_param())]
}

impl TableStore for SheetsClient {
    #[instrument(level = "debug", skip(self))]
    async fn get_range(&self, partition: &str, range: &str) -> Result<Rows, Box<dyn Error>> {
        let resp: ValueRange = self
            .http
            .get(self.values_url(partition, range))
            .bearer_auth(&self.access_token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        debug!(rows = resp.values.len(), "Read range");
        Ok(resp
            .values
            .into_iter()
            .map(|row| row.into_iter().map(CellValue::from).collect())
            .collect())
    }

    #[instrument(level = "debug", skip(self, rows), fields(rows = rows.len()))]
    async fn append_rows(&self, partition: &str, rows: &[Vec<String>]) -> Result<(), Box<dyn Error>> {
        let url = format!("{}:append", self.values_url(partition, "A1"));
        self.http
            .post(url)
            .bearer_auth(&self.access_token)
            .query(&[
                ("valueInputOption", ValueInput::UserEntered.as_param()),
                ("insertDataOption", "INSERT_ROWS"),
            ])
            .json(&ValuesBody { values: rows })
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    #[instrument(level = "debug", skip(self, rows), fields(rows = rows.len()))]
    async fn update_range(
        &self,
        partition: &str,
        top_left: &str,
        rows: &[Vec<String>],
        input: ValueInput,
    ) -> Result<(), Box<dyn Error>> {
        if parse_cell(top_left).is_none() {
            return Err(format!("not a cell reference: {top_left}").into());
        }
        self.http
            .put(self.values_url(partition, top_left))
            .bearer_auth(&self.access_token)
            .query(&update_query(input))
            .json(&ValuesBody { values: rows })
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    #[instrument(level = "info", skip(self))]
    async fn ensure_partition_exists(&self, partition: &str) -> Result<bool, Box<dyn Error>> {
        if self.list_partitions().await?.iter().any(|t| t == partition) {
            return Ok(false);
        }
        let body = serde_json::json!({
            "requests": [{ "addSheet": { "properties": { "title": partition } } }]
        });
        self.http
            .post(format!("{}:batchUpdate", self.spreadsheet_url()))
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        info!("Created partition tab");
        Ok(true)
    }

    async fn list_partitions(&self) -> Result<Vec<String>, Box<dyn Error>> {
        let meta: SpreadsheetMeta = self
            .http
            .get(self.spreadsheet_url())
            .bearer_auth(&self.access_token)
            .query(&[("fields", "sheets.properties.title")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(meta.sheets.into_iter().map(|s| s.properties.title).collect())
    }
}
