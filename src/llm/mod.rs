pub mod openai;
pub mod request;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::chat::CompletionResult;
use self::request::ResponsesRequest;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LlmError {
    /// Transport, authentication or upstream API failure. Carries the upstream message verbatim.
    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, request: &ResponsesRequest) -> Result<CompletionResult, LlmError>;
}
