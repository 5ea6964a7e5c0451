//! Wikipedia entity resolver
//!
//! Looks candidate names up through the REST page-summary endpoint. Names
//! are used as exact titles (redirects are followed, nothing is
//! auto-suggested). Missing pages and disambiguation pages resolve to
//! `None`.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use txkb_core::{EntityRef, EntityResolver, KbError, ResolverConfig, Result};

#[derive(Debug, Deserialize)]
struct PageSummary {
    #[serde(rename = "type", default)]
    page_type: String,
    title: String,
    #[serde(default)]
    extract: String,
    #[serde(default)]
    content_urls: Option<ContentUrls>,
}

#[derive(Debug, Deserialize)]
struct ContentUrls {
    desktop: PageUrl,
}

#[derive(Debug, Deserialize)]
struct PageUrl {
    page: String,
}

impl PageSummary {
    fn into_entity(self, base: &Url) -> Option<EntityRef> {
        if self.page_type == "disambiguation" || self.title.trim().is_empty() {
            return None;
        }
        let url = match self.content_urls {
            Some(urls) => urls.desktop.page,
            None => page_url(base, &self.title),
        };
        Some(EntityRef::new(self.title, url, self.extract))
    }
}

fn page_url(base: &Url, title: &str) -> String {
    let mut url = base.clone();
    if let Ok(mut segments) = url.path_segments_mut() {
        segments.clear().push("wiki").push(&title.replace(' ', "_"));
    }
    url.to_string()
}

/// Resolver backed by a Wikipedia language edition
#[derive(Debug, Clone)]
pub struct WikipediaResolver {
    client: Client,
    base_url: Url,
    max_retries: u32,
    retry_delay: Duration,
}

impl WikipediaResolver {
    /// Create from config
    pub fn from_config(config: &ResolverConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            KbError::ConfigError(format!("Invalid resolver URL {}: {e}", config.base_url))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(KbError::ConfigError(format!(
                "Resolver URL cannot be a base: {}",
                config.base_url
            )));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| KbError::ConfigError(format!("Failed to build resolver client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            max_retries: config.max_retries,
            retry_delay: Duration::from_millis(250),
        })
    }

    /// Base delay between attempts; attempt `n` waits `n * delay`
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    fn summary_url(&self, name: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .clear()
                .extend(["api", "rest_v1", "page", "summary"])
                .push(&name.trim().replace(' ', "_"));
        }
        url.query_pairs_mut().append_pair("redirect", "true");
        url
    }

    async fn lookup(&self, url: &Url) -> std::result::Result<Option<PageSummary>, Attempt> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| Attempt::Retryable(format!("Request failed: {e}")))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(Attempt::Retryable(format!("server returned {status}")));
        }
        if !status.is_success() {
            return Err(Attempt::Fatal(format!("server returned {status}")));
        }

        response
            .json()
            .await
            .map(Some)
            .map_err(|e| Attempt::Fatal(format!("Failed to parse summary: {e}")))
    }
}

enum Attempt {
    Retryable(String),
    Fatal(String),
}

#[async_trait::async_trait]
impl EntityResolver for WikipediaResolver {
    async fn resolve(&self, name: &str) -> Result<Option<EntityRef>> {
        if name.trim().is_empty() {
            return Ok(None);
        }
        let url = self.summary_url(name);

        let mut attempt = 0;
        let summary = loop {
            match self.lookup(&url).await {
                Ok(summary) => break summary,
                Err(Attempt::Retryable(message)) if attempt < self.max_retries => {
                    attempt += 1;
                    warn!(name, attempt, error = %message, "Wikipedia lookup failed, retrying");
                    tokio::time::sleep(self.retry_delay * attempt).await;
                }
                Err(Attempt::Retryable(message)) | Err(Attempt::Fatal(message)) => {
                    return Err(KbError::Resolver(format!("{name}: {message}")));
                }
            }
        };

        let entity = summary.and_then(|s| s.into_entity(&self.base_url));
        debug!(
            name,
            resolved = entity.as_ref().map(|e| e.title.as_str()).unwrap_or("-"),
            "Wikipedia lookup"
        );
        Ok(entity)
    }

    fn name(&self) -> &str {
        "wikipedia"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> WikipediaResolver {
        WikipediaResolver::from_config(&ResolverConfig::default()).unwrap()
    }

    #[test]
    fn test_summary_url_encodes_title() {
        let url = resolver().summary_url("Alphabet Inc.");
        assert_eq!(
            url.as_str(),
            "https://en.wikipedia.org/api/rest_v1/page/summary/Alphabet_Inc.?redirect=true"
        );

        let url = resolver().summary_url("AC/DC");
        assert!(url.path().ends_with("/summary/AC%2FDC"));
    }

    #[test]
    fn test_standard_page_becomes_entity() {
        let summary: PageSummary = serde_json::from_str(
            r#"{
                "type": "standard",
                "title": "Alphabet Inc.",
                "extract": "Alphabet Inc. is an American multinational technology conglomerate.",
                "content_urls": {
                    "desktop": {"page": "https://en.wikipedia.org/wiki/Alphabet_Inc."},
                    "mobile": {"page": "https://en.m.wikipedia.org/wiki/Alphabet_Inc."}
                }
            }"#,
        )
        .unwrap();

        let entity = summary.into_entity(&resolver().base_url).unwrap();
        assert_eq!(entity.title, "Alphabet Inc.");
        assert_eq!(entity.url, "https://en.wikipedia.org/wiki/Alphabet_Inc.");
        assert!(entity.summary.starts_with("Alphabet Inc. is"));
    }

    #[test]
    fn test_disambiguation_page_is_not_found() {
        let summary: PageSummary = serde_json::from_str(
            r#"{"type": "disambiguation", "title": "Mercury", "extract": "Mercury may refer to:"}"#,
        )
        .unwrap();
        assert!(summary.into_entity(&resolver().base_url).is_none());
    }

    #[test]
    fn test_missing_content_urls_builds_page_url() {
        let summary: PageSummary =
            serde_json::from_str(r#"{"type": "standard", "title": "Sundar Pichai"}"#).unwrap();
        let entity = summary.into_entity(&resolver().base_url).unwrap();
        assert_eq!(entity.url, "https://en.wikipedia.org/wiki/Sundar_Pichai");
    }

    #[test]
    fn test_invalid_base_url() {
        let config = ResolverConfig {
            base_url: "not a url".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            WikipediaResolver::from_config(&config),
            Err(KbError::ConfigError(_))
        ));
    }

    #[tokio::test]
    async fn test_transport_failure_is_resolver_error() {
        let config = ResolverConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout_secs: 2,
            max_retries: 1,
            ..Default::default()
        };
        let resolver = WikipediaResolver::from_config(&config)
            .unwrap()
            .with_retry_delay(Duration::from_millis(1));

        let result = resolver.resolve("Paris").await;
        assert!(matches!(result, Err(KbError::Resolver(_))));
        assert!(resolver.resolve("  ").await.unwrap().is_none());
    }
}
