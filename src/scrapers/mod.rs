//! Article and comment scrapers for Yahoo! News.
//!
//! Both scrapers page through a single article until a stop heuristic fires:
//!
//! | Scraper | Module | Transport | Stops on |
//! |---------|--------|-----------|----------|
//! | Article body | [`article`] | plain HTTP ([`HttpPageSource`]) | request failure, empty page, repeat of previous page, page limit |
//! | Comments | [`comments`] | headless Chromium ([`browser`]) | empty page, boundary duplicate, comment cap |
//!
//! Transports sit behind the [`PageSource`] and [`comments::Renderer`]
//! traits so the paging logic can be driven by canned HTML in tests.

pub mod article;
pub mod browser;
pub mod comments;

use reqwest::Client;
use std::error::Error;
use std::time::Duration;
use tracing::{debug, instrument};

/// Something that returns the HTML for a URL.
pub trait PageSource {
    async fn fetch(&self, url: &str) -> Result<String, Box<dyn Error>>;
}

/// Plain HTTP GET with a fixed timeout and browser user agent. Non-2xx
/// responses are errors.
#[derive(Debug, Clone)]
pub struct HttpPageSource {
    client: Client,
}

impl HttpPageSource {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, Box<dyn Error>> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

impl PageSource for HttpPageSource {
    #[instrument(level = "debug", skip(self))]
    async fn fetch(&self, url: &str) -> Result<String, Box<dyn Error>> {
        let body = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        debug!(bytes = body.len(), "Fetched page");
        Ok(body)
    }
}

/// `url` with `param=page` appended to its query string.
pub fn with_page_param(url: &url::Url, param: &str, page: usize) -> String {
    let mut paged = url.clone();
    paged.query_pairs_mut().append_pair(param, &page.to_string());
    paged.to_string()
}
