use std::fmt;

use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

use crate::model::Model;
use crate::usage::UsageRecord;

/// Per-request failures. All of them are recoverable: the session reports
/// them and waits for the next prompt.
#[derive(Error, Debug)]
pub enum RequestError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Authentication failed: HTTP {status} - {message}")]
    Auth { status: u16, message: String },
    #[error("HTTP {status} - {message}")]
    Api { status: u16, message: String },
    #[error("Malformed API response: {0}")]
    MalformedResponse(String),
    #[error("Request interrupted by user.")]
    Interrupted,
}

impl From<reqwest::Error> for RequestError {
    fn from(err: reqwest::Error) -> Self {
        RequestError::Network(err.to_string())
    }
}

/// A single line of operator input, trimmed and never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt(String);

impl Prompt {
    /// Returns `None` for blank input.
    pub fn new(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() {
            None
        } else {
            Some(Self(text.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub model: Model,
    pub prompt: Prompt,
    pub max_tokens: u32,
}

/// A complete, non-streamed answer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BufferedResponse {
    pub text: String,
    /// Reasoning trace, returned by reasoning models such as grok-3-mini-beta.
    pub reasoning: Option<String>,
    pub usage: Option<UsageRecord>,
    /// Model id echoed by the server, if any.
    pub model: Option<String>,
}

/// Lazy, finite sequence of text fragments. Dropping it closes the
/// underlying connection.
pub type FragmentStream = BoxStream<'static, Result<String, RequestError>>;

#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Sends one request and waits for the full body.
    async fn send_buffered(
        &self,
        request: &CompletionRequest,
    ) -> Result<BufferedResponse, RequestError>;

    /// Sends one request and returns its text fragments as they arrive.
    /// Errors that happen before the first byte of body are returned directly.
    async fn send_streaming(&self, request: &CompletionRequest)
    -> Result<FragmentStream, RequestError>;
}
