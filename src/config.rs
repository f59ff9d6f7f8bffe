//! Pipeline configuration loaded from an optional YAML file.
//!
//! Every field has a default, so an empty file (or no file at all) gives the
//! stock Yahoo! News setup. Selectors live here so markup drift on the site
//! is a config change rather than a code change.
//!
//! ```yaml
//! http_timeout_secs: 20
//! max_total_comments: 500
//! comment_strategies:
//!   - name: article-text
//!     selector: "article p"
//! ```

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::time::Duration;
use tokio::fs;
use tracing::{info, instrument};

/// A browser-looking user agent; the site serves a stripped page otherwise.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// One named CSS selector used to pull comment text out of a rendered page.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ExtractionStrategy {
    pub name: String,
    pub selector: String,
}

impl ExtractionStrategy {
    fn new(name: &str, selector: &str) -> Self {
        Self {
            name: name.to_string(),
            selector: selector.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub user_agent: String,
    pub http_timeout_secs: u64,
    pub max_body_pages: usize,
    pub max_total_comments: usize,
    pub comment_settle_ms: u64,
    pub viewport: Viewport,
    /// Article body container, tried first.
    pub body_primary_selector: String,
    /// Used only when the primary container yields no text.
    pub body_fallback_selector: String,
    pub paragraph_selector: String,
    pub article_date_selector: String,
    /// Regex removed from the end of the page `<title>`.
    pub title_suffix_pattern: String,
    pub comments_path_suffix: String,
    pub page_param: String,
    pub comment_strategies: Vec<ExtractionStrategy>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            http_timeout_secs: 20,
            max_body_pages: 10,
            max_total_comments: 1000,
            comment_settle_ms: 2000,
            viewport: Viewport {
                width: 1280,
                height: 2000,
            },
            body_primary_selector: "div.article_body".to_string(),
            body_fallback_selector: "article div[class*=\"article_body\"], article".to_string(),
            paragraph_selector: "p".to_string(),
            article_date_selector: "article time, time".to_string(),
            title_suffix_pattern: r"\s*[-|｜]\s*Yahoo!ニュース\s*$".to_string(),
            comments_path_suffix: "/comments".to_string(),
            page_param: "page".to_string(),
            comment_strategies: vec![
                ExtractionStrategy::new("comment-body", "article p[class*=\"comment\"]"),
                ExtractionStrategy::new("comment-list-item", "li[class*=\"comment\"] p"),
                ExtractionStrategy::new("comment-text", "div[class*=\"Comment\"] p[class*=\"text\"]"),
            ],
        }
    }
}

impl PipelineConfig {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn comment_settle(&self) -> Duration {
        Duration::from_millis(self.comment_settle_ms)
    }

    pub fn from_yaml(text: &str) -> Result<Self, Box<dyn Error>> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(text)?;
        if config.max_body_pages == 0 {
            return Err("max_body_pages must be at least 1".into());
        }
        if config.max_total_comments == 0 {
            return Err("max_total_comments must be at least 1".into());
        }
        Ok(config)
    }
}

/// Load the pipeline config from `path`, or the defaults when no path is given.
#[instrument(level = "info")]
pub async fn load_config(path: Option<&str>) -> Result<PipelineConfig, Box<dyn Error>> {
    let Some(path) = path else {
        info!("No config file given; using defaults");
        return Ok(PipelineConfig::default());
    };
    let text = fs::read_to_string(path).await?;
    let config = PipelineConfig::from_yaml(&text)?;
    info!(
        max_body_pages = config.max_body_pages,
        max_total_comments = config.max_total_comments,
        strategies = config.comment_strategies.len(),
        "Loaded configuration"
    );
    Ok(config)
}
