//! txkb Source - Where documents come from
//!
//! Supports:
//! - JSON article records (one article per file, as exported by news feeds)
//! - Plain text files
//! - Live articles fetched over HTTP (see [`fetch`])
//!
//! Every source ends up as a [`Document`] whose [`SourceInfo`] id is the
//! provenance key used by the knowledge base.

pub mod fetch;

pub use fetch::HttpArticleFetcher;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use txkb_core::{Document, KbError, SourceInfo};

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur while loading documents
#[derive(Error, Debug)]
pub enum SourceError {
    /// IO error while reading a file or directory
    #[error("IO error reading {path}")]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Article record is not valid JSON
    #[error("Invalid article record {path}: {message}")]
    ParseError { path: String, message: String },

    /// URL could not be parsed
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Extraction pattern failed to compile
    #[error("Invalid extraction pattern: {0}")]
    Pattern(String),

    /// HTTP transport or status failure
    #[error("HTTP error: {0}")]
    Http(String),
}

impl From<SourceError> for KbError {
    fn from(e: SourceError) -> Self {
        match e {
            SourceError::Http(_) => Self::Fetch(e.to_string()),
            _ => Self::InvalidInput(e.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, SourceError>;

fn io_error(path: &Path, source: std::io::Error) -> SourceError {
    SourceError::IoError {
        path: path.display().to_string(),
        source,
    }
}

// ============================================================================
// Article Records
// ============================================================================

/// URL recorded for articles whose record has none
pub const MISSING_URL: &str = "No URL available";

fn missing_url() -> String {
    MISSING_URL.to_string()
}

/// One article as stored on disk.
///
/// Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleRecord {
    #[serde(default)]
    pub body: String,

    #[serde(default = "missing_url")]
    pub url: String,

    /// Upstream article identifier
    #[serde(default)]
    pub id: String,

    /// Publication date
    #[serde(default)]
    pub date: String,

    /// Publisher or feed name
    #[serde(default)]
    pub source: String,

    #[serde(default)]
    pub title: String,
}

impl Default for ArticleRecord {
    fn default() -> Self {
        Self {
            body: String::new(),
            url: missing_url(),
            id: String::new(),
            date: String::new(),
            source: String::new(),
            title: String::new(),
        }
    }
}

impl ArticleRecord {
    /// Read a record from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| io_error(path, e))?;
        serde_json::from_str(&content).map_err(|e| SourceError::ParseError {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Provenance key: the URL, else the upstream id, else [`MISSING_URL`]
    pub fn source_id(&self) -> String {
        let url = self.url.trim();
        if !url.is_empty() && url != MISSING_URL {
            return url.to_string();
        }
        non_empty(&self.id).unwrap_or_else(missing_url)
    }

    /// Provenance context for this article
    pub fn source_info(&self) -> SourceInfo {
        SourceInfo {
            id: self.source_id(),
            title: non_empty(&self.title),
            publish_date: non_empty(&self.date),
            origin: non_empty(&self.source),
            article_id: non_empty(&self.id),
        }
    }

    /// Convert to a document; `None` when the body is empty
    pub fn into_document(self) -> Option<Document> {
        if self.body.trim().is_empty() {
            return None;
        }
        let source = self.source_info();
        Some(Document::new(self.body, source))
    }
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Load every article record in a directory as a document.
///
/// Records with an empty body are skipped with a warning; unreadable
/// records are returned as errors alongside their path so callers can
/// count them. Records with neither URL nor id are keyed by their path.
pub fn load_article_dir(
    dir: impl AsRef<Path>,
) -> Result<Vec<(PathBuf, std::result::Result<Option<Document>, SourceError>)>> {
    let files = json_files_in(dir)?;
    Ok(files
        .into_iter()
        .map(|path| {
            let document = ArticleRecord::from_file(&path).map(|record| {
                let mut document = record.into_document();
                match &mut document {
                    Some(document) if document.source.id == MISSING_URL => {
                        document.source.id = path.display().to_string();
                    }
                    Some(_) => {}
                    None => warn!(path = %path.display(), "No content in article body, skipping"),
                }
                document
            });
            (path, document)
        })
        .collect())
}

// ============================================================================
// Text Files
// ============================================================================

/// Read a plain text file as a document.
///
/// The source id is the path as given; the title is the file stem.
pub fn read_text_document(path: impl AsRef<Path>) -> Result<Document> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| io_error(path, e))?;

    let mut source = SourceInfo::new(path.display().to_string());
    source.title = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::to_string);

    Ok(Document::new(text, source))
}

/// `.json` files directly inside `dir`, sorted by file name
pub fn json_files_in(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let entries = std::fs::read_dir(dir).map_err(|e| io_error(dir, e))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| io_error(dir, e))?.path();
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

// ============================================================================
// URLs
// ============================================================================

/// Strip the query string and fragment from a URL
pub fn clean_url(raw: &str) -> Result<String> {
    let mut parsed =
        url::Url::parse(raw.trim()).map_err(|e| SourceError::InvalidUrl(format!("{raw}: {e}")))?;
    parsed.set_query(None);
    parsed.set_fragment(None);
    Ok(parsed.to_string())
}

// ============================================================================
// Tests
// ============================================================================
