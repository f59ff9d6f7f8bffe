//! Command-line interface definitions for Yahoo News Digest.
//!
//! Every option can also be supplied through an environment variable, which
//! is how the scheduled job passes spreadsheet ids and the access token.

use clap::{Parser, ValueEnum};

/// Which stages a run executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Stage {
    /// Copy new source rows into the partition only.
    Transfer,
    /// Fill body and comment columns for rows already in the partition.
    Enrich,
    /// Transfer, then enrich.
    All,
}

impl Stage {
    pub fn runs_transfer(self) -> bool {
        matches!(self, Stage::Transfer | Stage::All)
    }

    pub fn runs_enrich(self) -> bool {
        matches!(self, Stage::Enrich | Stage::All)
    }
}

/// Command-line arguments.
///
/// # Examples
///
/// ```sh
/// # Full daily run with ids and token from the environment
/// yahoo_news_digest
///
/// # Re-enrich an earlier day's tab with a tuned config
/// yahoo_news_digest --stage enrich --partition 250819 -c digest.yaml
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Spreadsheet holding the source feed
    #[arg(long, env = "SOURCE_SPREADSHEET_ID")]
    pub source_spreadsheet_id: String,

    /// Spreadsheet receiving the daily tabs
    #[arg(long, env = "DESTINATION_SPREADSHEET_ID")]
    pub destination_spreadsheet_id: String,

    /// OAuth access token with the spreadsheets scope
    #[arg(long, env = "GOOGLE_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: String,

    /// Source tab name; also written as the source label of each row
    #[arg(long, env = "SOURCE_SHEET", default_value = "Yahoo")]
    pub source_sheet: String,

    /// Optional path to a YAML pipeline config
    #[arg(short, long, env = "DIGEST_CONFIG")]
    pub config: Option<String>,

    /// Stages to run
    #[arg(long, value_enum, default_value_t = Stage::All)]
    pub stage: Stage,

    /// Partition (tab) to use instead of today's `yyMMdd`
    #[arg(long)]
    pub partition: Option<String>,
}
