//! Headless Chromium rendering via `chromiumoxide`.
//!
//! [`ChromiumRenderer`] launches one browser process per session, so no
//! cookies, storage or cache carry over between articles. The session owns
//! the browser, its single tab and the CDP handler task; [`RenderSession::close`]
//! shuts all three down. If a session is dropped without being closed,
//! chromiumoxide kills the child process when the `Browser` drops.

use super::comments::{RenderSession, Renderer};
use crate::config::PipelineConfig;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use std::error::Error;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, instrument, warn};

/// Launch settings for each rendering session.
#[derive(Debug, Clone)]
pub struct ChromiumRenderer {
    user_agent: String,
    width: u32,
    height: u32,
    timeout: Duration,
    settle: Duration,
}

impl ChromiumRenderer {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            width: config.viewport.width,
            height: config.viewport.height,
            timeout: config.http_timeout(),
            settle: config.comment_settle(),
        }
    }

    fn browser_config(&self) -> Result<BrowserConfig, Box<dyn Error>> {
        let config = BrowserConfig::builder()
            .no_sandbox()
            .window_size(self.width, self.height)
            .request_timeout(self.timeout)
            .arg(format!("--user-agent={}", self.user_agent))
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .build()?;
        Ok(config)
    }
}

/// A live browser with one tab.
pub struct ChromiumSession {
    browser: Browser,
    handler: JoinHandle<()>,
    page: Option<Page>,
    settle: Duration,
}

impl Renderer for ChromiumRenderer {
    type Session = ChromiumSession;

    #[instrument(level = "debug", skip(self))]
    async fn open_session(&self) -> Result<ChromiumSession, Box<dyn Error>> {
        let (browser, mut handler) = Browser::launch(self.browser_config()?).await?;
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });
        debug!("Launched headless browser");
        Ok(ChromiumSession {
            browser,
            handler,
            page: None,
            settle: self.settle,
        })
    }
}

impl RenderSession for ChromiumSession {
    #[instrument(level = "debug", skip(self))]
    async fn render(&mut self, url: &str) -> Result<String, Box<dyn Error>> {
        let page = match self.page.take() {
            Some(page) => {
                page.goto(url).await?;
                page
            }
            None => self.browser.new_page(url).await?,
        };
        let page = self.page.insert(page);
        // Comments are injected after load; give the scripts time to run.
        sleep(self.settle).await;
        let html = page.content().await?;
        debug!(bytes = html.len(), "Rendered page");
        Ok(html)
    }

    async fn close(mut self) -> Result<(), Box<dyn Error>> {
        if let Some(page) = self.page.take() {
            if let Err(e) = page.close().await {
                warn!(error = %e, "Failed to close tab");
            }
        }
        let closed = self.browser.close().await;
        if let Err(e) = self.browser.wait().await {
            warn!(error = %e, "Browser process did not exit cleanly");
        }
        self.handler.abort();
        closed?;
        debug!("Closed headless browser");
        Ok(())
    }
}
