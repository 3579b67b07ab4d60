//! Ollama REST client and the [`ModelService`] seam.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use crate::error::OllamaError;
use crate::stream::{decode_ndjson, ChunkStream};
use crate::types::{ChatMessage, ChatRequest, ChatResponse, GenerateRequest, GenerateResponse};

/// Connection settings for [`OllamaClient`].
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    /// Base URL (defaults to `http://localhost:11434`).
    pub base_url: String,
    /// Bound on how long a streaming call may take to start answering.
    /// Once the stream is open its total duration is unbounded.
    pub stream_open_timeout: Duration,
    /// Timeout for the model listing call.
    pub list_timeout: Duration,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            stream_open_timeout: Duration::from_secs(60),
            list_timeout: Duration::from_secs(10),
        }
    }
}

/// Access to a model runner.
///
/// Implementations never retry; every failure is returned to the caller.
#[async_trait]
pub trait ModelService: Send + Sync {
    /// One blocking chat completion bounded by `timeout`.
    async fn chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        timeout: Duration,
    ) -> Result<ChatResponse, OllamaError>;

    /// Open a streaming chat completion.  Resolves once the upstream has
    /// started answering; the returned stream yields one item per NDJSON line.
    async fn chat_stream(
        &self,
        model: &str,
        messages: &[ChatMessage],
    ) -> Result<ChunkStream, OllamaError>;

    /// One-shot text generation bounded by `timeout`.
    async fn generate(
        &self,
        model: &str,
        prompt: &str,
        timeout: Duration,
    ) -> Result<GenerateResponse, OllamaError>;

    /// The runner's model catalogue, passed through untouched.
    async fn list_models(&self) -> Result<serde_json::Value, OllamaError>;
}

/// HTTP client for an Ollama server.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    config: OllamaConfig,
    client: Client,
}

impl OllamaClient {
    pub fn new(config: OllamaConfig) -> Result<Self, OllamaError> {
        // No client-wide timeout: it would also cap the lifetime of open streams.
        let client = Client::builder()
            .user_agent(concat!("lmra-ollama/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { config, client })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/api/{}", self.config.base_url.trim_end_matches('/'), endpoint)
    }

    async fn send(request: RequestBuilder) -> Result<Response, OllamaError> {
        let resp = request.send().await?;
        check_status(resp).await
    }

    async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, OllamaError> {
        let bytes = Self::send(request).await?.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

async fn check_status(resp: Response) -> Result<Response, OllamaError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(OllamaError::Status {
        status: status.as_u16(),
        body: body.chars().take(500).collect(),
    })
}

#[async_trait]
impl ModelService for OllamaClient {
    #[instrument(skip(self, messages), fields(messages = messages.len()))]
    async fn chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        timeout: Duration,
    ) -> Result<ChatResponse, OllamaError> {
        let body = ChatRequest {
            model,
            messages,
            stream: false,
        };
        let request = self.client.post(self.url("chat")).json(&body).timeout(timeout);
        let resp: ChatResponse = Self::send_json(request).await?;
        debug!(eval_count = ?resp.eval_count, "chat completed");
        Ok(resp)
    }

    #[instrument(skip(self, messages), fields(messages = messages.len()))]
    async fn chat_stream(
        &self,
        model: &str,
        messages: &[ChatMessage],
    ) -> Result<ChunkStream, OllamaError> {
        let body = ChatRequest {
            model,
            messages,
            stream: true,
        };
        let request = self.client.post(self.url("chat")).json(&body);
        let open = self.config.stream_open_timeout;
        let resp = tokio::time::timeout(open, Self::send(request))
            .await
            .map_err(|_| OllamaError::Timeout(open))??;
        debug!("chat stream opened");
        Ok(decode_ndjson(resp.bytes_stream()))
    }

    #[instrument(skip(self, prompt), fields(prompt_len = prompt.len()))]
    async fn generate(
        &self,
        model: &str,
        prompt: &str,
        timeout: Duration,
    ) -> Result<GenerateResponse, OllamaError> {
        let body = GenerateRequest {
            model,
            prompt,
            stream: false,
        };
        let request = self
            .client
            .post(self.url("generate"))
            .json(&body)
            .timeout(timeout);
        Self::send_json(request).await
    }

    async fn list_models(&self) -> Result<serde_json::Value, OllamaError> {
        let request = self
            .client
            .get(self.url("tags"))
            .timeout(self.config.list_timeout);
        Self::send_json(request).await
    }
}
