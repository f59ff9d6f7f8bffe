//! Enrichment stage: fill body pages and comments for every URL in a
//! partition.
//!
//! URLs are processed one at a time in row order: body pages first, then
//! comments. A failure in either degrades that row to an empty suffix with a
//! comment count of 0 and the stage moves on. Once every row is known the
//! schema is sized to the largest comment count and everything is written in
//! one update starting at the first enrichment column of row 2. Cells a wider
//! earlier run left behind are blanked by the same write.

use crate::config::PipelineConfig;
use crate::models::{CellValue, EnrichedRow, FIXED_HEADER, FetchResult, URL_COLUMN};
use crate::schema::{cover_previous_width, widen};
use crate::scrapers::PageSource;
use crate::scrapers::article::{ArticleMarkup, fetch_body};
use crate::scrapers::comments::{CommentMarkup, Renderer, fetch_comments};
use crate::store::{MAX_COLUMNS, TableStore, ValueInput, cell_ref, column_letter};
use crate::utils::truncate_for_log;
use futures::stream::{self, StreamExt};
use std::error::Error;
use tracing::{debug, error, info, instrument};

/// What one enrichment pass did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EnrichReport {
    pub urls: usize,
    pub failed: usize,
    pub max_comments: usize,
}

/// How one partition row came out of enrichment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    Enriched(EnrichedRow),
    /// The URL cell was blank; the row keeps its position.
    Blank,
    /// Body or comment fetching failed.
    Failed,
}

impl RowOutcome {
    /// The suffix to write. Blank and failed rows degrade.
    pub fn into_row(self) -> EnrichedRow {
        match self {
            RowOutcome::Enriched(row) => row,
            RowOutcome::Blank | RowOutcome::Failed => EnrichedRow::degraded(),
        }
    }
}

/// Site access and markup needed to enrich one URL.
pub struct Enricher<'a, P, R> {
    pub pages: &'a P,
    pub renderer: &'a R,
    pub article_markup: &'a ArticleMarkup,
    pub comment_markup: &'a CommentMarkup,
    pub config: &'a PipelineConfig,
}

impl<P: PageSource, R: Renderer> Enricher<'_, P, R> {
    async fn fetch(&self, url: &str) -> Result<FetchResult, Box<dyn Error>> {
        let body = fetch_body(
            self.pages,
            self.article_markup,
            url,
            self.config.max_body_pages,
            &self.config.page_param,
        )
        .await?;
        let comments = fetch_comments(self.renderer, self.comment_markup, url, self.config).await?;
        Ok(FetchResult { body, comments })
    }

    /// Enrich one partition row. Never fails: errors are logged and reported
    /// as [`RowOutcome::Failed`].
    #[instrument(level = "info", skip(self))]
    pub async fn enrich_url(&self, index: usize, url: &str) -> RowOutcome {
        if url.is_empty() {
            debug!("Blank URL cell; keeping row position");
            return RowOutcome::Blank;
        }
        match self.fetch(url).await {
            Ok(result) => {
                info!(
                    pages = result.body.pages.len(),
                    comments = result.comments.len(),
                    title = %truncate_for_log(&result.body.title, 60),
                    article_date = %result.body.article_date,
                    "Enriched article"
                );
                RowOutcome::Enriched(EnrichedRow::from(result))
            }
            Err(e) => {
                error!(error = %e, "Enrichment failed; writing empty row");
                RowOutcome::Failed
            }
        }
    }

    /// Enrich every URL strictly in order.
    ///
    /// # Arguments
    ///
    /// * `urls` - URL column of the partition from row 2 down, blanks included
    ///
    /// # Returns
    ///
    /// One [`EnrichedRow`] per input URL, in the same order, plus a report
    /// with the failure count and the largest comment count.
    pub async fn enrich_all(&self, urls: &[String]) -> (Vec<EnrichedRow>, EnrichReport) {
        let outcomes: Vec<RowOutcome> = stream::iter(urls.iter().enumerate())
            .then(|(i, url)| self.enrich_url(i, url))
            .collect()
            .await;

        let failed = outcomes
            .iter()
            .filter(|o| matches!(o, RowOutcome::Failed))
            .count();
        let rows: Vec<EnrichedRow> = outcomes.into_iter().map(RowOutcome::into_row).collect();
        let max_comments = rows.iter().map(EnrichedRow::comment_count).max().unwrap_or(0);
        let report = EnrichReport {
            urls: urls.len(),
            failed,
            max_comments,
        };
        (rows, report)
    }
}

/// Read the URL column of `partition` from row 2 down. Blank cells are kept
/// as empty strings so positions line up with the partition rows.
pub async fn partition_urls<S: TableStore>(
    store: &S,
    partition: &str,
) -> Result<Vec<String>, Box<dyn Error>> {
    let col = column_letter(URL_COLUMN);
    let rows = store.get_range(partition, &format!("{col}2:{col}")).await?;
    Ok(rows
        .iter()
        .map(|r| r.first().map(CellValue::as_text).unwrap_or_default())
        .collect())
}

/// Width of the partition's current header row, fixed columns included.
async fn header_width<S: TableStore>(store: &S, partition: &str) -> Result<usize, Box<dyn Error>> {
    let range = format!("A1:{}", cell_ref(MAX_COLUMNS - 1, 0));
    let rows = store.get_range(partition, &range).await?;
    Ok(rows.first().map(Vec::len).unwrap_or(0))
}

/// Run the enrichment stage over `partition`.
///
/// Creates the partition if needed, enriches every row below the header and
/// writes the widened header at `A1` and the suffixes at `F2`. Scraped text
/// is written verbatim so the store never reinterprets it as a formula,
/// number or date.
///
/// # Arguments
///
/// * `store` - Destination table store
/// * `partition` - Tab to enrich, e.g. `250820`
/// * `enricher` - Page source, renderer, markup and limits
///
/// # Returns
///
/// An [`EnrichReport`]. An empty partition returns the default report and
/// writes nothing. Store errors propagate; per-URL errors never do.
#[instrument(level = "info", skip(store, enricher))]
pub async fn enrich<S: TableStore, P: PageSource, R: Renderer>(
    store: &S,
    partition: &str,
    enricher: &Enricher<'_, P, R>,
) -> Result<EnrichReport, Box<dyn Error>> {
    store.ensure_partition_exists(partition).await?;
    let urls = partition_urls(store, partition).await?;
    info!(count = urls.len(), "URLs to enrich");
    if urls.is_empty() {
        return Ok(EnrichReport::default());
    }

    let (rows, report) = enricher.enrich_all(&urls).await;
    let (mut header, mut padded) = widen(&rows, enricher.config.max_body_pages);
    let previous_width = header_width(store, partition).await?;
    if previous_width > header.len() {
        debug!(previous_width, width = header.len(), "Blanking columns left by a wider run");
    }
    cover_previous_width(&mut header, &mut padded, previous_width);

    store
        .update_range(partition, "A1", &[header], ValueInput::Raw)
        .await?;
    store
        .update_range(partition, &cell_ref(FIXED_HEADER.len(), 1), &padded, ValueInput::Raw)
        .await?;
    info!(
        rows = padded.len(),
        failed = report.failed,
        max_comments = report.max_comments,
        "Wrote enrichment columns"
    );
    Ok(report)
}
