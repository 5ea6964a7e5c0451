//! txkb Core - Domain types, capability traits, and shared configuration
//!
//! This crate defines the abstractions used throughout the txkb workspace:
//! - Extraction types (token spans, raw triples, canonical entities)
//! - Source/provenance context for extracted relations
//! - Capability traits for the external collaborators (tokenizer,
//!   seq2seq transducer, entity resolver, article fetcher)
//! - Common error types
//! - Configuration management

pub mod config;

pub use config::{
    AppConfig, ConfigError, CorpusConfig, ExtractionConfig, FetchConfig, LoggingConfig,
    ModelConfig, ResolverConfig,
};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for txkb operations
#[derive(Error, Debug)]
pub enum KbError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    #[error("Transducer error: {0}")]
    Transducer(String),

    #[error("Entity resolver error: {0}")]
    Resolver(String),

    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<serde_json::Error> for KbError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, KbError>;

// ============================================================================
// Extraction Types
// ============================================================================

/// Half-open token window `[start, end)` within one document's tokenization.
///
/// Serialized as a two-element array so provenance reads `"spans": [[0, 128]]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "(usize, usize)", into = "(usize, usize)")]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Number of tokens covered
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clip the end of the span against a token count
    pub fn clip(self, num_tokens: usize) -> Self {
        Self {
            start: self.start.min(num_tokens),
            end: self.end.min(num_tokens),
        }
    }
}

impl From<(usize, usize)> for Span {
    fn from((start, end): (usize, usize)) -> Self {
        Self { start, end }
    }
}

impl From<Span> for (usize, usize) {
    fn from(span: Span) -> Self {
        (span.start, span.end)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// A (head, type, tail) triple as decoded from model output, before
/// canonicalization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RawTriple {
    pub head: String,
    #[serde(rename = "type")]
    pub relation_type: String,
    pub tail: String,
}

impl RawTriple {
    pub fn new(
        head: impl Into<String>,
        relation_type: impl Into<String>,
        tail: impl Into<String>,
    ) -> Self {
        Self {
            head: head.into(),
            relation_type: relation_type.into(),
            tail: tail.into(),
        }
    }
}

/// Canonical identity of an entity in the reference knowledge source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef {
    /// Canonical title (the entity key inside a knowledge base)
    pub title: String,

    /// Canonical URL
    pub url: String,

    /// Short description
    pub summary: String,
}

impl EntityRef {
    pub fn new(
        title: impl Into<String>,
        url: impl Into<String>,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            summary: summary.into(),
        }
    }
}

/// Provenance context for relations extracted from one source document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInfo {
    /// Source identifier used as the provenance key (article URL or file path)
    pub id: String,

    /// Article title
    pub title: Option<String>,

    /// Publication date as given by the source
    pub publish_date: Option<String>,

    /// Publisher or feed name
    pub origin: Option<String>,

    /// Upstream article identifier
    pub article_id: Option<String>,
}

impl SourceInfo {
    /// Create source info with only an identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Set title
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set publication date
    pub fn with_publish_date(mut self, date: impl Into<String>) -> Self {
        self.publish_date = Some(date.into());
        self
    }

    /// Set publisher/feed name
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Set upstream article identifier
    pub fn with_article_id(mut self, article_id: impl Into<String>) -> Self {
        self.article_id = Some(article_id.into());
        self
    }
}

/// A document ready for extraction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Full text body
    pub text: String,

    /// Provenance context
    pub source: SourceInfo,
}

impl Document {
    pub fn new(text: impl Into<String>, source: SourceInfo) -> Self {
        Self {
            text: text.into(),
            source,
        }
    }
}

/// An article returned by a fetcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    pub url: String,
    pub title: Option<String>,
    pub text: String,
    pub publish_date: Option<String>,
}

impl Article {
    /// Turn the article into a document keyed by its URL
    pub fn into_document(self) -> Document {
        let mut source = SourceInfo::new(self.url);
        source.title = self.title;
        source.publish_date = self.publish_date;
        Document::new(self.text, source)
    }
}

// ============================================================================
// Model Types
// ============================================================================

/// Token ids with their parallel attention mask
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Encoding {
    pub input_ids: Vec<u32>,
    pub attention_mask: Vec<u32>,
}

impl Encoding {
    /// Encoding with an all-ones attention mask
    pub fn from_ids(input_ids: Vec<u32>) -> Self {
        let attention_mask = vec![1; input_ids.len()];
        Self {
            input_ids,
            attention_mask,
        }
    }

    pub fn len(&self) -> usize {
        self.input_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.input_ids.is_empty()
    }

    /// Slice ids and mask identically, clipping the span to the encoding
    pub fn window(&self, span: Span) -> Encoding {
        let span = span.clip(self.len());
        let mask_end = span.end.min(self.attention_mask.len());
        let mask_start = span.start.min(mask_end);
        Encoding {
            input_ids: self.input_ids[span.start..span.end].to_vec(),
            attention_mask: self.attention_mask[mask_start..mask_end].to_vec(),
        }
    }
}

/// Decoding parameters for the seq2seq transducer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Candidate decodings returned per window
    pub num_return_sequences: usize,

    /// Beam width
    pub num_beams: usize,

    /// Maximum output length in tokens
    pub max_length: usize,

    /// Length penalty passed to beam search
    pub length_penalty: f32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            num_return_sequences: 3,
            num_beams: 3,
            max_length: 256,
            length_penalty: 0.0,
        }
    }
}

impl From<&ExtractionConfig> for GenerationParams {
    fn from(config: &ExtractionConfig) -> Self {
        Self {
            num_return_sequences: config.num_return_sequences,
            num_beams: config.num_beams,
            max_length: config.max_output_length,
            length_penalty: config.length_penalty,
        }
    }
}

// ============================================================================
// Capability Traits
// ============================================================================

/// Text tokenizer shared with the transducer
#[async_trait::async_trait]
pub trait Tokenizer: Send + Sync {
    /// Tokenize a full document
    async fn encode(&self, text: &str) -> Result<Encoding>;

    /// Turn token ids back into text
    async fn decode(&self, ids: &[u32]) -> Result<String>;
}

/// Sequence-to-sequence model producing tagged triplet text
#[async_trait::async_trait]
pub trait Transducer: Send + Sync {
    /// Run one batched generation over all windows.
    ///
    /// Returns `windows.len() * params.num_return_sequences` decoded strings
    /// ordered by `(window_index, candidate_index)`.
    async fn transduce(
        &self,
        windows: &[Encoding],
        params: &GenerationParams,
    ) -> Result<Vec<String>>;
}

/// Lookup against the reference knowledge source
#[async_trait::async_trait]
pub trait EntityResolver: Send + Sync {
    /// Resolve a candidate name to its canonical identity.
    ///
    /// `Ok(None)` means the name is unknown to the reference source.
    async fn resolve(&self, name: &str) -> Result<Option<EntityRef>>;

    /// Resolver name for logging
    fn name(&self) -> &str;
}

/// Retrieves an article by URL
#[async_trait::async_trait]
pub trait ArticleFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Article>;
}

/// Model capabilities constructed once at startup and shared read-only
/// across document pipelines.
#[derive(Clone)]
pub struct ModelCapabilities {
    pub tokenizer: Arc<dyn Tokenizer>,
    pub transducer: Arc<dyn Transducer>,
}

impl ModelCapabilities {
    pub fn new(tokenizer: Arc<dyn Tokenizer>, transducer: Arc<dyn Transducer>) -> Self {
        Self {
            tokenizer,
            transducer,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
