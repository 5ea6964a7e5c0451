//! HTTP article fetching
//!
//! Downloads a news page and keeps the headline plus the paragraph text.
//! Transport errors and 5xx responses are retried a fixed number of times
//! with a linearly growing delay; any other non-success status fails at once.

use std::time::Duration;

use html2text::render::text_renderer::TrivialDecorator;
use regex::Regex;
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use txkb_core::{Article, ArticleFetcher, FetchConfig, KbError};

use crate::{Result, SourceError};

/// Rendering width for html2text; wide enough that paragraphs never wrap
const RENDER_WIDTH: usize = 10_000;

/// Pulls the headline and paragraph text out of an HTML page
#[derive(Debug, Clone)]
pub struct HtmlExtractor {
    heading: Regex,
    title: Regex,
    paragraph: Regex,
}

impl HtmlExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            heading: compile_pattern(r"(?is)<h1(?:\s[^>]*)?>(.*?)</h1>")?,
            title: compile_pattern(r"(?is)<title(?:\s[^>]*)?>(.*?)</title>")?,
            paragraph: compile_pattern(r"(?is)<p(?:\s[^>]*)?>(.*?)</p>")?,
        })
    }

    /// First `<h1>`, falling back to the document `<title>`
    pub fn title(&self, html: &str) -> Option<String> {
        [&self.heading, &self.title]
            .into_iter()
            .filter_map(|re| re.captures(html))
            .filter_map(|caps| caps.get(1))
            .map(|m| fragment_text(m.as_str()))
            .find(|text| !text.is_empty())
    }

    /// Text of every `<p>` element joined by single spaces
    pub fn text(&self, html: &str) -> String {
        self.paragraph
            .captures_iter(html)
            .filter_map(|caps| caps.get(1))
            .map(|m| fragment_text(m.as_str()))
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn extract(&self, url: &str, html: &str) -> Article {
        Article {
            url: url.to_string(),
            title: self.title(html),
            text: self.text(html),
            publish_date: None,
        }
    }
}

fn compile_pattern(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| SourceError::Pattern(format!("{pattern}: {e}")))
}

/// Render an HTML fragment as plain text on one line
fn fragment_text(fragment: &str) -> String {
    let rendered = html2text::config::with_decorator(TrivialDecorator::new())
        .string_from_read(fragment.as_bytes(), RENDER_WIDTH)
        .unwrap_or_default();
    rendered.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Article fetcher backed by reqwest
#[derive(Debug, Clone)]
pub struct HttpArticleFetcher {
    client: Client,
    extractor: HtmlExtractor,
    max_retries: u32,
    max_bytes: usize,
    retry_delay: Duration,
}

impl HttpArticleFetcher {
    /// Create from config
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SourceError::Http(format!("Failed to build client: {e}")))?;

        Ok(Self {
            client,
            extractor: HtmlExtractor::new()?,
            max_retries: config.max_retries,
            max_bytes: config.max_bytes,
            retry_delay: Duration::from_millis(500),
        })
    }

    /// Base delay between attempts; attempt `n` waits `n * delay`
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Download a page body, truncated to the configured size
    pub async fn fetch_html(&self, url: &str) -> Result<String> {
        let mut attempt = 0;
        loop {
            match self.try_fetch(url).await {
                Ok(html) => return Ok(html),
                Err(Attempt::Retryable(message)) if attempt < self.max_retries => {
                    attempt += 1;
                    warn!(
                        url,
                        attempt,
                        max_retries = self.max_retries,
                        error = %message,
                        "Fetch failed, retrying"
                    );
                    tokio::time::sleep(self.retry_delay * attempt).await;
                }
                Err(Attempt::Retryable(message)) | Err(Attempt::Fatal(message)) => {
                    return Err(SourceError::Http(format!("{url}: {message}")));
                }
            }
        }
    }

    async fn try_fetch(&self, url: &str) -> std::result::Result<String, Attempt> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Attempt::Retryable(format!("Request failed: {e}")))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(Attempt::Retryable(format!("server returned {status}")));
        }
        if !status.is_success() {
            return Err(Attempt::Fatal(status_message(status)));
        }

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| Attempt::Retryable(format!("Failed to read body: {e}")))?
        {
            if append_limited(&mut body, &chunk, self.max_bytes) {
                debug!(url, kept = body.len(), "Truncated page body");
                break;
            }
        }
        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}

/// Append as much of `chunk` as fits under `limit`; true once the limit is reached
fn append_limited(body: &mut Vec<u8>, chunk: &[u8], limit: usize) -> bool {
    let room = limit.saturating_sub(body.len());
    body.extend_from_slice(&chunk[..chunk.len().min(room)]);
    body.len() >= limit
}

enum Attempt {
    Retryable(String),
    Fatal(String),
}

fn status_message(status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("HTTP {} {reason}", status.as_u16()),
        None => format!("HTTP {}", status.as_u16()),
    }
}

#[async_trait::async_trait]
impl ArticleFetcher for HttpArticleFetcher {
    async fn fetch(&self, url: &str) -> txkb_core::Result<Article> {
        let html = self.fetch_html(url).await.map_err(KbError::from)?;
        let article = self.extractor.extract(url, &html);
        debug!(
            url,
            title = article.title.as_deref().unwrap_or(""),
            chars = article.text.len(),
            "Fetched article"
        );
        Ok(article)
    }
}
