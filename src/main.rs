//! # Yahoo News Digest
//!
//! Collects the last day's Yahoo! News references from a source sheet into a
//! per-day tab of a destination spreadsheet, then enriches every row with the
//! article's full body text and its comment thread.
//!
//! ## Usage
//!
//! ```sh
//! SOURCE_SPREADSHEET_ID=... DESTINATION_SPREADSHEET_ID=... GOOGLE_ACCESS_TOKEN=... \
//!     yahoo_news_digest --stage all
//! ```
//!
//! ## Architecture
//!
//! 1. **Window**: fix "now" in UTC+9 once; derive the 15:00-anchored window
//!    and the `yyMMdd` tab name from it
//! 2. **Transfer**: copy in-window, unseen source rows into the tab
//! 3. **Enrich**: for every URL in the tab, page through the article body
//!    (HTTP) and the comments (headless Chromium), then write the widened
//!    columns back in one update

use clap::Parser;
use std::error::Error;
use tracing::{debug, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod enrich;
mod ledger;
mod models;
mod schema;
mod scrapers;
mod store;
mod timestamps;
mod transfer;
mod utils;

use cli::Cli;
use enrich::{Enricher, enrich};
use scrapers::HttpPageSource;
use scrapers::article::ArticleMarkup;
use scrapers::browser::ChromiumRenderer;
use scrapers::comments::CommentMarkup;
use store::TableStore;
use store::sheets::SheetsClient;
use timestamps::{jst_now, partition_key, window_for};

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("yahoo_news_digest starting up");

    let args = Cli::parse();
    debug!(stage = ?args.stage, source_sheet = %args.source_sheet, "Parsed CLI arguments");

    let config = config::load_config(args.config.as_deref()).await?;

    // One reference instant for the whole run.
    let now = jst_now();
    let window = window_for(now);
    let partition = args.partition.clone().unwrap_or_else(|| partition_key(now));
    info!(%now, %partition, "Run reference");

    let source = SheetsClient::new(&args.source_spreadsheet_id, &args.access_token, config.http_timeout())?;
    let dest = SheetsClient::new(&args.destination_spreadsheet_id, &args.access_token, config.http_timeout())?;

    let known = dest.list_partitions().await?;
    if !known.contains(&partition) {
        info!(%partition, existing_tabs = known.len(), "Partition does not exist yet; it will be created");
    }

    let mut transferred = 0;
    if args.stage.runs_transfer() {
        transferred = transfer::transfer(&source, &args.source_sheet, &dest, &partition, &window, now).await?;
        info!(transferred, "Transfer stage complete");
    }

    let mut enriched = enrich::EnrichReport::default();
    if args.stage.runs_enrich() {
        let pages = HttpPageSource::new(&config.user_agent, config.http_timeout())?;
        let renderer = ChromiumRenderer::from_config(&config);
        let article_markup = ArticleMarkup::from_config(&config)?;
        let comment_markup = CommentMarkup::new(&config.comment_strategies)?;
        let enricher = Enricher {
            pages: &pages,
            renderer: &renderer,
            article_markup: &article_markup,
            comment_markup: &comment_markup,
            config: &config,
        };
        enriched = enrich(&dest, &partition, &enricher).await?;
        info!(urls = enriched.urls, failed = enriched.failed, "Enrichment stage complete");
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        %partition,
        transferred,
        enriched = enriched.urls,
        failed = enriched.failed,
        max_comments = enriched.max_comments,
        "Execution complete"
    );

    Ok(())
}
