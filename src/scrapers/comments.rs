//! Paginated comment scraper.
//!
//! Comments load client-side, so every listing page goes through a
//! [`RenderSession`]. Each article gets its own session, closed before the
//! next article starts.
//!
//! Paging is a small state machine over [`CommentAccumulator`]: every page's
//! comments are offered in turn and the returned [`PageOutcome`] says whether
//! to keep going. The accumulator holds the last accepted comment
//! explicitly, which is what the boundary-duplicate check compares against.

use super::article::{element_text, parse_selector};
use crate::config::{ExtractionStrategy, PipelineConfig};
use itertools::Itertools;
use scraper::{Html, Selector};
use std::error::Error;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// One rendering-client session. Dropped sessions must not leak state into
/// the next article.
pub trait RenderSession {
    /// Navigate to `url`, wait for the page to settle and return its HTML.
    async fn render(&mut self, url: &str) -> Result<String, Box<dyn Error>>;

    /// Tear the session down.
    async fn close(self) -> Result<(), Box<dyn Error>>;
}

/// Opens fresh rendering sessions.
pub trait Renderer {
    type Session: RenderSession;

    async fn open_session(&self) -> Result<Self::Session, Box<dyn Error>>;
}

/// Comment text extraction from one rendered listing page.
///
/// Every strategy is applied and the matches merged in strategy order, with
/// repeated text on the page kept only at its first occurrence.
#[derive(Debug)]
pub struct CommentMarkup {
    strategies: Vec<(String, Selector)>,
}

impl CommentMarkup {
    pub fn new(strategies: &[ExtractionStrategy]) -> Result<Self, Box<dyn Error>> {
        let strategies = strategies
            .iter()
            .map(|s| -> Result<(String, Selector), Box<dyn Error>> {
                Ok((s.name.clone(), parse_selector(&s.selector)?))
            })
            .collect::<Result<Vec<_>, _>>()?;
        if strategies.is_empty() {
            return Err("at least one comment extraction strategy is required".into());
        }
        Ok(Self { strategies })
    }

    pub fn extract(&self, html: &str) -> Vec<String> {
        let doc = Html::parse_document(html);
        self.strategies
            .iter()
            .flat_map(|(name, selector)| {
                let found: Vec<String> = doc
                    .select(selector)
                    .map(element_text)
                    .filter(|t| !t.is_empty())
                    .collect();
                debug!(strategy = %name, matches = found.len(), "Comment strategy");
                found
            })
            .unique()
            .collect()
    }
}

/// Result of offering one page of comments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageOutcome {
    Continue,
    StopEmpty,
    StopBoundaryDup,
    StopCapped,
}

/// Accumulated comments plus the last accepted one.
#[derive(Debug)]
pub struct CommentAccumulator {
    comments: Vec<String>,
    last: Option<String>,
    cap: usize,
}

impl CommentAccumulator {
    pub fn new(cap: usize) -> Self {
        Self {
            comments: Vec::new(),
            last: None,
            cap,
        }
    }

    /// Offer one page. Empty pages and pages that open with the last accepted
    /// comment are refused whole; otherwise the page is taken and the total
    /// truncated to the cap.
    pub fn offer(&mut self, page: Vec<String>) -> PageOutcome {
        let Some(first) = page.first() else {
            return PageOutcome::StopEmpty;
        };
        if self.last.as_ref() == Some(first) {
            return PageOutcome::StopBoundaryDup;
        }
        self.comments.extend(page);
        if self.comments.len() >= self.cap {
            self.comments.truncate(self.cap);
            self.last = self.comments.last().cloned();
            return PageOutcome::StopCapped;
        }
        self.last = self.comments.last().cloned();
        PageOutcome::Continue
    }

    pub fn last(&self) -> Option<&str> {
        self.last.as_deref()
    }

    pub fn len(&self) -> usize {
        self.comments.len()
    }

    pub fn into_comments(self) -> Vec<String> {
        self.comments
    }
}

/// Listing URL for comment page `page` of an article:
/// `<article path><suffix>?<param>=<page>`.
pub fn comments_url(article: &Url, suffix: &str, param: &str, page: usize) -> String {
    let mut url = article.clone();
    let path = format!("{}{}", article.path().trim_end_matches('/'), suffix);
    url.set_path(&path);
    url.set_query(None);
    url.set_fragment(None);
    url.query_pairs_mut().append_pair(param, &page.to_string());
    url.to_string()
}

/// Page through the comment listing of one article inside an open session.
async fn collect_pages<S: RenderSession>(
    session: &mut S,
    markup: &CommentMarkup,
    article: &Url,
    config: &PipelineConfig,
) -> Result<Vec<String>, Box<dyn Error>> {
    let mut acc = CommentAccumulator::new(config.max_total_comments);
    let mut page = 1;
    loop {
        let url = comments_url(article, &config.comments_path_suffix, &config.page_param, page);
        let html = session.render(&url).await?;
        let found = markup.extract(&html);
        let found_count = found.len();
        let outcome = acc.offer(found);
        debug!(page, found = found_count, total = acc.len(), last = ?acc.last(), ?outcome, "Comment page");
        if outcome != PageOutcome::Continue {
            break;
        }
        page += 1;
    }
    Ok(acc.into_comments())
}

/// Fetch every comment of the article at `url` using a fresh session.
///
/// Listing pages are rendered from page 1 with no page limit until a page is
/// empty, opens with the last accepted comment, or the comment cap is hit.
///
/// # Arguments
///
/// * `renderer` - Opens the rendering session for this article
/// * `markup` - Comment extraction strategies
/// * `url` - Article URL; listing URLs are derived from its path
/// * `config` - Cap, listing path suffix and page parameter
///
/// # Returns
///
/// The accepted comments in page order, at most `max_total_comments`.
/// Render failures propagate after the session has been closed; the
/// session is closed on every path.
#[instrument(level = "info", skip(renderer, markup, config))]
pub async fn fetch_comments<R: Renderer>(
    renderer: &R,
    markup: &CommentMarkup,
    url: &str,
    config: &PipelineConfig,
) -> Result<Vec<String>, Box<dyn Error>> {
    let article = Url::parse(url)?;
    let mut session = renderer.open_session().await?;
    let result = collect_pages(&mut session, markup, &article, config).await;
    if let Err(e) = session.close().await {
        warn!(error = %e, "Failed to close rendering session");
    }
    let comments = result?;
    info!(count = comments.len(), "Fetched comments");
    Ok(comments)
}
