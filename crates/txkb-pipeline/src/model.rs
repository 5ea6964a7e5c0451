//! Client for a seq2seq inference server
//!
//! The server hosts both the tokenizer and the model, so one client
//! implements [`Tokenizer`] and [`Transducer`]:
//!
//! - `POST /tokenize`   `{model, text}` -> `{input_ids, attention_mask}`
//! - `POST /detokenize` `{model, ids, skip_special_tokens}` -> `{text}`
//! - `POST /generate`   batched windows + decoding params -> `{sequences}`

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use txkb_core::{
    Encoding, GenerationParams, KbError, ModelCapabilities, ModelConfig, Result, Tokenizer,
    Transducer,
};

/// HTTP client for the inference server
#[derive(Debug, Clone)]
pub struct HttpModelClient {
    client: Client,
    base_url: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct TokenizeRequest<'a> {
    model: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenizeResponse {
    input_ids: Vec<u32>,
    #[serde(default)]
    attention_mask: Option<Vec<u32>>,
}

#[derive(Debug, Serialize)]
struct DetokenizeRequest<'a> {
    model: &'a str,
    ids: &'a [u32],
    skip_special_tokens: bool,
}

#[derive(Debug, Deserialize)]
struct DetokenizeResponse {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    input_ids: Vec<&'a [u32]>,
    attention_mask: Vec<&'a [u32]>,
    num_return_sequences: usize,
    num_beams: usize,
    max_length: usize,
    length_penalty: f32,
    /// Triplet markers are special tokens and must survive decoding
    skip_special_tokens: bool,
}

impl<'a> GenerateRequest<'a> {
    fn new(model: &'a str, windows: &'a [Encoding], params: &GenerationParams) -> Self {
        Self {
            model,
            input_ids: windows.iter().map(|w| w.input_ids.as_slice()).collect(),
            attention_mask: windows.iter().map(|w| w.attention_mask.as_slice()).collect(),
            num_return_sequences: params.num_return_sequences,
            num_beams: params.num_beams,
            max_length: params.max_length,
            length_penalty: params.length_penalty,
            skip_special_tokens: false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    sequences: Vec<String>,
}

impl HttpModelClient {
    /// Create a new client
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        }
    }

    /// Create from config
    pub fn from_config(config: &ModelConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| KbError::ConfigError(format!("Failed to build model client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model_name.clone(),
        })
    }

    /// Share one client as both capabilities
    pub fn into_capabilities(self) -> ModelCapabilities {
        let client = Arc::new(self);
        ModelCapabilities::new(client.clone(), client)
    }

    async fn post<B, R>(&self, path: &str, body: &B, to_error: fn(String) -> KbError) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: serde::de::DeserializeOwned,
    {
        let response = self
            .client
            .post(format!("{}{path}", self.base_url))
            .json(body)
            .send()
            .await
            .map_err(|e| to_error(format!("Request to {path} failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(to_error(format!("{path} returned {status}: {error_text}")));
        }

        response
            .json()
            .await
            .map_err(|e| to_error(format!("Failed to parse {path} response: {e}")))
    }
}

#[async_trait::async_trait]
impl Tokenizer for HttpModelClient {
    async fn encode(&self, text: &str) -> Result<Encoding> {
        let request = TokenizeRequest {
            model: &self.model,
            text,
        };
        let response: TokenizeResponse =
            self.post("/tokenize", &request, KbError::Tokenizer).await?;

        let encoding = match response.attention_mask {
            Some(attention_mask) if attention_mask.len() == response.input_ids.len() => Encoding {
                input_ids: response.input_ids,
                attention_mask,
            },
            Some(mask) => {
                return Err(KbError::Tokenizer(format!(
                    "attention mask length {} does not match {} input ids",
                    mask.len(),
                    response.input_ids.len()
                )))
            }
            None => Encoding::from_ids(response.input_ids),
        };

        debug!(tokens = encoding.len(), "Tokenized document");
        Ok(encoding)
    }

    async fn decode(&self, ids: &[u32]) -> Result<String> {
        let request = DetokenizeRequest {
            model: &self.model,
            ids,
            skip_special_tokens: false,
        };
        let response: DetokenizeResponse =
            self.post("/detokenize", &request, KbError::Tokenizer).await?;
        Ok(response.text)
    }
}

#[async_trait::async_trait]
impl Transducer for HttpModelClient {
    async fn transduce(
        &self,
        windows: &[Encoding],
        params: &GenerationParams,
    ) -> Result<Vec<String>> {
        let request = GenerateRequest::new(&self.model, windows, params);
        let response: GenerateResponse =
            self.post("/generate", &request, KbError::Transducer).await?;

        debug!(
            windows = windows.len(),
            sequences = response.sequences.len(),
            "Generated candidate decodings"
        );
        Ok(response.sequences)
    }
}
