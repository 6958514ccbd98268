//! Error types for the llm crate.

use thiserror::Error;

/// Errors returned by AI providers and prompt rendering.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Provider '{provider}' is not configured: {reason}")]
    NotConfigured { provider: String, reason: String },

    #[error("API request failed: {reason}")]
    Request { reason: String },

    #[error("API returned error ({status}): {message}")]
    Api { status: String, message: String },

    #[error("Failed to parse model response: {reason}")]
    ResponseParse { reason: String },

    #[error("Embedding count mismatch: requested {requested}, received {received}")]
    EmbeddingMismatch { requested: usize, received: usize },

    #[error("Prompt template error: {reason}")]
    Template { reason: String },
}

/// Result alias for llm operations.
pub type LlmResult<T> = Result<T, LlmError>;

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        LlmError::Request {
            reason: err.to_string(),
        }
    }
}

impl From<handlebars::RenderError> for LlmError {
    fn from(err: handlebars::RenderError) -> Self {
        LlmError::Template {
            reason: err.to_string(),
        }
    }
}

impl From<handlebars::TemplateError> for LlmError {
    fn from(err: handlebars::TemplateError) -> Self {
        LlmError::Template {
            reason: err.to_string(),
        }
    }
}
