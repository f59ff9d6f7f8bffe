//! Paginated article body scraper.
//!
//! Page 1 is the bare article URL; page `n > 1` adds `?page=n`. Pages are
//! fetched until one of these fires, in order:
//!
//! 1. the request fails (timeout, non-2xx): pages so far are kept
//! 2. the page has no body text
//! 3. the page's body text equals the previous page's
//! 4. `max_body_pages` pages have been collected
//!
//! The page title and the displayed article timestamp are read from page 1
//! only, best effort.

use super::{PageSource, with_page_param};
use crate::config::PipelineConfig;
use crate::models::{ArticleBody, UNAVAILABLE};
use itertools::Itertools;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::error::Error;
use tracing::{debug, info, instrument, warn};
use url::Url;

pub(crate) fn parse_selector(css: &str) -> Result<Selector, Box<dyn Error>> {
    Selector::parse(css).map_err(|e| format!("invalid selector {css:?}: {e}").into())
}

/// Visible text of an element with whitespace runs collapsed.
pub(crate) fn element_text(el: ElementRef<'_>) -> String {
    el.text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Compiled selectors for article pages.
#[derive(Debug)]
pub struct ArticleMarkup {
    primary: Selector,
    fallback: Selector,
    paragraph: Selector,
    date: Selector,
    title: Selector,
    title_suffix: Regex,
}

impl ArticleMarkup {
    pub fn from_config(config: &PipelineConfig) -> Result<Self, Box<dyn Error>> {
        Ok(Self {
            primary: parse_selector(&config.body_primary_selector)?,
            fallback: parse_selector(&config.body_fallback_selector)?,
            paragraph: parse_selector(&config.paragraph_selector)?,
            date: parse_selector(&config.article_date_selector)?,
            title: parse_selector("title")?,
            title_suffix: Regex::new(&config.title_suffix_pattern)?,
        })
    }

    fn paragraphs_in(&self, doc: &Html, container: &Selector) -> String {
        // Nested containers would otherwise repeat their paragraphs.
        doc.select(container)
            .flat_map(|c| c.select(&self.paragraph))
            .unique_by(|p| p.id())
            .map(element_text)
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Paragraph text of the primary container, or of the fallback container
    /// when the primary has none.
    pub fn body_text(&self, doc: &Html) -> String {
        let text = self.paragraphs_in(doc, &self.primary);
        if !text.is_empty() {
            return text;
        }
        self.paragraphs_in(doc, &self.fallback)
    }

    pub fn title(&self, doc: &Html) -> Option<String> {
        let raw = doc.select(&self.title).next().map(element_text)?;
        let stripped = self.title_suffix.replace(&raw, "").trim().to_string();
        (!stripped.is_empty()).then_some(stripped)
    }

    pub fn article_date(&self, doc: &Html) -> Option<String> {
        doc.select(&self.date)
            .map(element_text)
            .find(|t| !t.is_empty())
    }
}

/// What the pager decided after seeing one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyStep {
    Continue,
    StopEmpty,
    StopRepeat,
}

/// Accumulates distinct, non-empty body pages.
#[derive(Debug, Default)]
pub struct BodyPager {
    pages: Vec<String>,
}

impl BodyPager {
    pub fn offer(&mut self, text: String) -> BodyStep {
        if text.is_empty() {
            return BodyStep::StopEmpty;
        }
        if self.pages.last() == Some(&text) {
            return BodyStep::StopRepeat;
        }
        self.pages.push(text);
        BodyStep::Continue
    }

    pub fn into_pages(self) -> Vec<String> {
        self.pages
    }
}

/// Fetch every body page of `url`, plus title and date from page 1.
///
/// Pages are requested in order until the page limit or one of the stop
/// conditions in the module docs is hit. A failed request ends pagination
/// and keeps whatever was collected before it.
///
/// # Arguments
///
/// * `source` - Where page HTML comes from
/// * `markup` - Compiled body, title and date selectors
/// * `url` - Article URL; page 1 is requested as given
/// * `max_pages` - Most body pages to keep
/// * `page_param` - Query parameter carrying the page number
///
/// # Returns
///
/// An [`ArticleBody`] whose title and date are [`UNAVAILABLE`] when page 1
/// had none. Only an unparseable `url` is an error.
#[instrument(level = "info", skip(source, markup))]
pub async fn fetch_body<P: PageSource>(
    source: &P,
    markup: &ArticleMarkup,
    url: &str,
    max_pages: usize,
    page_param: &str,
) -> Result<ArticleBody, Box<dyn Error>> {
    let base = Url::parse(url)?;
    let mut body = ArticleBody::default();
    let mut pager = BodyPager::default();

    for page in 1..=max_pages {
        let page_url = if page == 1 {
            base.to_string()
        } else {
            with_page_param(&base, page_param, page)
        };

        let html = match source.fetch(&page_url).await {
            Ok(html) => html,
            Err(e) => {
                warn!(page, %page_url, error = %e, "Body page fetch failed; stopping pagination");
                break;
            }
        };
        let doc = Html::parse_document(&html);

        if page == 1 {
            body.title = markup.title(&doc).unwrap_or_else(|| UNAVAILABLE.to_string());
            body.article_date = markup.article_date(&doc).unwrap_or_else(|| UNAVAILABLE.to_string());
        }

        let step = pager.offer(markup.body_text(&doc));
        debug!(page, ?step, "Body page");
        if step != BodyStep::Continue {
            break;
        }
    }

    body.pages = pager.into_pages();
    info!(pages = body.pages.len(), "Fetched article body");
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrapers::fakes::CannedPages;

    const URL: &str = "https://news.yahoo.co.jp/articles/abc";

    fn page(body: &str) -> String {
        format!(
            r#"<html><head><title>見出し - Yahoo!ニュース</title></head>
            <body><article><time>8/20(水) 15:01</time>
            <div class="article_body">{body}</div></article></body></html>"#
        )
    }

    fn markup() -> ArticleMarkup {
        ArticleMarkup::from_config(&PipelineConfig::default()).unwrap()
    }

    #[test]
    fn test_pager_stops_on_repeat_and_empty() {
        let mut pager = BodyPager::default();
        assert_eq!(pager.offer("A".into()), BodyStep::Continue);
        assert_eq!(pager.offer("B".into()), BodyStep::Continue);
        assert_eq!(pager.offer("B".into()), BodyStep::StopRepeat);
        assert_eq!(pager.offer("".into()), BodyStep::StopEmpty);
        assert_eq!(pager.into_pages(), vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_fetch_body_stops_on_repeated_page() {
        let source = CannedPages::default()
            .with(URL, &page("<p>A</p>"))
            .with(&format!("{URL}?page=2"), &page("<p>B</p>"))
            .with(&format!("{URL}?page=3"), &page("<p>B</p>"))
            .with(&format!("{URL}?page=4"), &page("<p>C</p>"));
        let body = fetch_body(&source, &markup(), URL, 10, "page").await.unwrap();
        assert_eq!(body.pages, vec!["A", "B"]);
        assert_eq!(body.title, "見出し");
        assert_eq!(body.article_date, "8/20(水) 15:01");
    }

    #[tokio::test]
    async fn test_fetch_body_keeps_pages_before_request_failure() {
        let source = CannedPages::default()
            .with(URL, &page("<p>one</p><p>two</p>"))
            .with(&format!("{URL}?page=2"), &page("<p>three</p>"));
        let body = fetch_body(&source, &markup(), URL, 10, "page").await.unwrap();
        assert_eq!(body.pages, vec!["one\ntwo", "three"]);
    }

    #[tokio::test]
    async fn test_fetch_body_respects_page_limit() {
        let source = CannedPages::default()
            .with(URL, &page("<p>1</p>"))
            .with(&format!("{URL}?page=2"), &page("<p>2</p>"))
            .with(&format!("{URL}?page=3"), &page("<p>3</p>"));
        let body = fetch_body(&source, &markup(), URL, 2, "page").await.unwrap();
        assert_eq!(body.pages, vec!["1", "2"]);
    }

    #[tokio::test]
    async fn test_fetch_body_first_page_failure_is_unavailable() {
        let body = fetch_body(&CannedPages::default(), &markup(), URL, 10, "page")
            .await
            .unwrap();
        assert!(body.pages.is_empty());
        assert_eq!(body.title, UNAVAILABLE);
        assert_eq!(body.article_date, UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_fetch_body_rejects_bad_url() {
        assert!(fetch_body(&CannedPages::default(), &markup(), "not a url", 10, "page").await.is_err());
    }

    #[test]
    fn test_body_text_uses_fallback_container() {
        let html = r#"<html><body><article><div class="article_body_v2"><p>fallback  text</p></div></article></body></html>"#;
        let doc = Html::parse_document(html);
        assert_eq!(markup().body_text(&doc), "fallback text");
    }

    #[test]
    fn test_empty_body_when_no_paragraphs() {
        let doc = Html::parse_document("<html><body><div>nothing</div></body></html>");
        assert_eq!(markup().body_text(&doc), "");
        assert_eq!(markup().title(&doc), None);
        assert_eq!(markup().article_date(&doc), None);
    }
}
