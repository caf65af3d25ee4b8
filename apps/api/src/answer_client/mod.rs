/// Answer Provider client: the single point of entry for digital twin queries.
///
/// The digital twin is reached over JSON-RPC 2.0 (`tools/call`). Exactly one
/// attempt is made per question; failures are returned to the caller, which
/// records them in the transcript rather than retrying.
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::debug;

/// Tool name understood by the digital twin MCP server.
pub const DEFAULT_TOOL: &str = "query_digital_twin";

/// Transcript text used when the provider call fails for any reason.
pub const SENTINEL_ERROR_MESSAGE: &str = "Error: Unable to retrieve answer.";

/// Transcript text used when the provider answered but carried no usable text.
pub const FALLBACK_ANSWER: &str = "Unable to retrieve answer.";

#[derive(Debug, Error)]
pub enum AnswerError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("answer provider timed out")]
    Timeout,

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON-RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("tool reported failure: {0}")]
    ToolFailed(String),

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("answer provider returned empty content")]
    EmptyContent,
}

/// Successful tool result. Only the first content block is treated as the answer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnswerResponse {
    #[serde(default)]
    pub content: Vec<ContentBlock>,
    #[serde(default, rename = "isError")]
    pub is_error: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type", default)]
    pub block_type: Option<String>,
    pub text: Option<String>,
}

impl AnswerResponse {
    #[cfg(test)]
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock {
                block_type: Some("text".to_string()),
                text: Some(text.into()),
            }],
            is_error: false,
        }
    }

    /// The first content entry's text, if present and non-empty.
    pub fn text(&self) -> Option<&str> {
        self.content
            .first()
            .and_then(|b| b.text.as_deref())
            .filter(|t| !t.is_empty())
    }
}

/// Converts a provider outcome into the candidate's transcript text.
/// Error causes are not distinguished.
pub fn answer_text(outcome: &Result<AnswerResponse, AnswerError>) -> String {
    match outcome {
        Ok(response) => response.text().unwrap_or(FALLBACK_ANSWER).to_string(),
        Err(_) => SENTINEL_ERROR_MESSAGE.to_string(),
    }
}

/// Anything that turns a question into a candidate answer.
#[async_trait]
pub trait AnswerProvider: Send + Sync {
    /// `request_id` is a caller-chosen correlation id (the 1-based question number).
    async fn answer(&self, request_id: u64, question: &str) -> Result<AnswerResponse, AnswerError>;
}

#[derive(Debug, Deserialize)]
struct RpcEnvelope {
    result: Option<AnswerResponse>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    #[serde(default)]
    code: i64,
    message: String,
}

/// JSON-RPC client for the digital twin's `tools/call` endpoint.
#[derive(Clone)]
pub struct McpAnswerClient {
    client: Client,
    endpoint: String,
    tool: String,
}

impl McpAnswerClient {
    pub fn new(
        endpoint: impl Into<String>,
        tool: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, AnswerError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            endpoint: endpoint.into(),
            tool: tool.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn request_body(&self, request_id: u64, question: &str) -> serde_json::Value {
        json!({
            "jsonrpc": "2.0",
            "id": request_id,
            "method": "tools/call",
            "params": {
                "name": self.tool,
                "arguments": { "query": question },
            },
        })
    }
}

#[async_trait]
impl AnswerProvider for McpAnswerClient {
    async fn answer(&self, request_id: u64, question: &str) -> Result<AnswerResponse, AnswerError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&self.request_body(request_id, question))
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(map_transport_error)?;

        if !status.is_success() {
            return Err(AnswerError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let response = parse_envelope(&body)?;
        debug!(
            "Answer provider replied to request {request_id} with {} content block(s)",
            response.content.len()
        );
        Ok(response)
    }
}

fn map_transport_error(err: reqwest::Error) -> AnswerError {
    if err.is_timeout() {
        AnswerError::Timeout
    } else {
        AnswerError::Http(err)
    }
}

/// Decodes a JSON-RPC reply body into a tool result.
fn parse_envelope(body: &str) -> Result<AnswerResponse, AnswerError> {
    let envelope: RpcEnvelope = serde_json::from_str(body)?;

    if let Some(error) = envelope.error {
        return Err(AnswerError::Rpc {
            code: error.code,
            message: error.message,
        });
    }

    let result = envelope.result.ok_or(AnswerError::EmptyContent)?;

    if result.is_error {
        let detail = result.text().unwrap_or("unknown tool error").to_string();
        return Err(AnswerError::ToolFailed(detail));
    }
    if result.content.is_empty() {
        return Err(AnswerError::EmptyContent);
    }

    Ok(result)
}
