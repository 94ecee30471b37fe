use std::time::Duration;

use futures_util::StreamExt;
use serde::{Deserialize, Serialize};

use crate::error::{BuilderError, Result};

const SERVICE: &str = "instruction backend";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One turn of the conversation sent to `/chat`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Response of `POST /template`: hidden base prompts for the chat, plus the
/// starter artifact(s) to apply right away.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateResponse {
    pub prompts: Vec<String>,
    pub ui_prompts: Vec<String>,
}

#[derive(Deserialize)]
struct ChatResponse {
    response: String,
}

/// HTTP client for the service that turns prompts into artifact text.
#[derive(Clone)]
pub struct BackendClient {
    client: reqwest::Client,
    base_url: String,
    max_response_bytes: u64,
}

impl BackendClient {
    pub fn new(base_url: &str, timeout: Duration, max_response_bytes: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("codeplay/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_response_bytes,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Asks the backend which starter template fits the prompt.
    pub async fn template(&self, prompt: &str) -> Result<TemplateResponse> {
        let body = serde_json::json!({ "prompt": prompt.trim() });
        let bytes = self.post("template", &body).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Sends the whole conversation and returns the assistant's reply text.
    pub async fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        let body = serde_json::json!({ "messages": messages });
        let bytes = self.post("chat", &body).await?;
        let reply: ChatResponse = serde_json::from_slice(&bytes)?;
        Ok(reply.response)
    }

    async fn post(&self, endpoint: &str, body: &serde_json::Value) -> Result<Vec<u8>> {
        let url = format!("{}/{endpoint}", self.base_url);
        tracing::debug!(%url, "posting to backend");

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| BuilderError::upstream(SERVICE, e.to_string()))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(BuilderError::upstream(SERVICE, format!("HTTP {status} from {url}")));
        }
        if !status.is_success() {
            return Err(BuilderError::Custom(format!(
                "Backend rejected request: HTTP {status} from {url}"
            )));
        }

        // Read the body in chunks so a runaway response can't exhaust memory.
        let mut stream = response.bytes_stream();
        let mut bytes = Vec::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| BuilderError::upstream(SERVICE, e.to_string()))?;
            bytes.extend_from_slice(&chunk);
            if bytes.len() as u64 > self.max_response_bytes {
                return Err(BuilderError::Custom(format!(
                    "Backend response from {url} exceeds {} bytes",
                    self.max_response_bytes
                )));
            }
        }
        Ok(bytes)
    }
}
