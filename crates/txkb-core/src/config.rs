//! txkb Configuration Management
//!
//! Handles configuration from environment variables and TOML files
//! with defaults that match the REBEL-style extraction setup.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Windowing and generation settings
    pub extraction: ExtractionConfig,

    /// Seq2seq inference server
    pub model: ModelConfig,

    /// Entity resolution against the reference knowledge source
    pub resolver: ResolverConfig,

    /// Article fetching
    pub fetch: FetchConfig,

    /// Corpus-level processing
    pub corpus: CorpusConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        // Model server
        if let Ok(endpoint) = std::env::var("TXKB_MODEL_ENDPOINT") {
            config.model.endpoint = endpoint;
        }
        if let Ok(name) = std::env::var("TXKB_MODEL_NAME") {
            config.model.model_name = name;
        }

        // Extraction
        if let Some(span_length) = parse_env("TXKB_SPAN_LENGTH")? {
            config.extraction.span_length = span_length;
        }
        if let Some(n) = parse_env("TXKB_NUM_RETURN_SEQUENCES")? {
            config.extraction.num_return_sequences = n;
        }

        // Resolver
        if let Ok(url) = std::env::var("TXKB_RESOLVER_URL") {
            config.resolver.base_url = url;
        }

        // Fetching
        if let Ok(agent) = std::env::var("TXKB_USER_AGENT") {
            config.fetch.user_agent = agent;
        }

        // Corpus
        if let Some(concurrency) = parse_env("TXKB_CONCURRENCY")? {
            config.corpus.concurrency = concurrency;
        }

        // Logging
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            config.logging.level = level;
        }

        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path,
            message: e.to_string(),
        })
    }

    /// Merge with environment variables (env takes precedence)
    pub fn with_env_override(mut self) -> Result<Self, ConfigError> {
        let env_config = Self::from_env()?;

        // Only override if env values differ from defaults
        if env_config.model.endpoint != ModelConfig::default().endpoint {
            self.model.endpoint = env_config.model.endpoint;
        }
        if env_config.model.model_name != ModelConfig::default().model_name {
            self.model.model_name = env_config.model.model_name;
        }
        let extraction_defaults = ExtractionConfig::default();
        if env_config.extraction.span_length != extraction_defaults.span_length {
            self.extraction.span_length = env_config.extraction.span_length;
        }
        if env_config.extraction.num_return_sequences != extraction_defaults.num_return_sequences {
            self.extraction.num_return_sequences = env_config.extraction.num_return_sequences;
        }
        if env_config.resolver.base_url != ResolverConfig::default().base_url {
            self.resolver.base_url = env_config.resolver.base_url;
        }
        if env_config.fetch.user_agent != FetchConfig::default().user_agent {
            self.fetch.user_agent = env_config.fetch.user_agent;
        }
        if env_config.corpus.concurrency != CorpusConfig::default().concurrency {
            self.corpus.concurrency = env_config.corpus.concurrency;
        }
        if env_config.logging.level != LoggingConfig::default().level {
            self.logging.level = env_config.logging.level;
        }

        Ok(self)
    }

    /// Check values that would make the pipeline misbehave
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.extraction.validate()?;
        if self.corpus.concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                key: "corpus.concurrency".to_string(),
                value: "0".to_string(),
            });
        }
        Ok(())
    }
}

fn parse_env<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(key) {
        Ok(value) => value
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value,
            }),
        Err(_) => Ok(None),
    }
}

/// Windowing and generation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Window length in tokens (model context budget per window)
    pub span_length: usize,

    /// Candidate decodings per window
    pub num_return_sequences: usize,

    /// Beam width
    pub num_beams: usize,

    /// Maximum generated length in tokens
    pub max_output_length: usize,

    /// Beam search length penalty
    pub length_penalty: f32,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            span_length: 128,
            num_return_sequences: 3,
            num_beams: 3,
            max_output_length: 256,
            length_penalty: 0.0,
        }
    }
}

impl ExtractionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.span_length == 0 {
            return Err(ConfigError::InvalidValue {
                key: "extraction.span_length".to_string(),
                value: "0".to_string(),
            });
        }
        if self.num_return_sequences == 0 {
            return Err(ConfigError::InvalidValue {
                key: "extraction.num_return_sequences".to_string(),
                value: "0".to_string(),
            });
        }
        Ok(())
    }
}

/// Seq2seq inference server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Base URL of the inference server
    pub endpoint: String,

    /// Model identifier sent with every request
    pub model_name: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8081".to_string(),
            model_name: "Babelscape/rebel-large".to_string(),
            timeout_secs: 300,
        }
    }
}

/// Entity resolver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Wikipedia base URL (language edition)
    pub base_url: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Retries after the first attempt on transport errors
    pub max_retries: u32,

    /// Maximum number of cached lookups
    pub cache_capacity: u64,

    /// Time-to-live for cached lookups (in seconds)
    pub cache_ttl_secs: u64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            base_url: "https://en.wikipedia.org".to_string(),
            timeout_secs: 10,
            max_retries: 2,
            cache_capacity: 10_000,
            // Canonical titles are stable within a run
            cache_ttl_secs: 3600,
        }
    }
}

/// Article fetching configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// User-Agent header sent to news sites
    pub user_agent: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Retries after the first attempt
    pub max_retries: u32,

    /// Maximum body size kept, in bytes
    pub max_bytes: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/58.0.3029.110 Safari/537.3".to_string(),
            timeout_secs: 20,
            max_retries: 2,
            max_bytes: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Corpus-level processing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpusConfig {
    /// Documents processed concurrently
    pub concurrency: usize,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self { concurrency: 4 }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

impl From<ConfigError> for crate::KbError {
    fn from(e: ConfigError) -> Self {
        Self::ConfigError(e.to_string())
    }
}
