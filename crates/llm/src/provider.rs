//! AI provider traits and common types.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::{LlmError, LlmResult};

/// Role of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// System message (sets context/behavior)
    System,
    /// User message (input)
    User,
    /// Assistant message (model response)
    Assistant,
}

/// A message in a conversation with a model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message sender
    pub role: ChatRole,
    /// Content of the message
    pub content: String,
}

impl ChatMessage {
    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Token usage information from a model response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Number of input tokens
    pub input_tokens: u32,
    /// Number of output tokens
    pub output_tokens: u32,
    /// Total tokens (input + output)
    pub total_tokens: u32,
}

/// Response from a model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Generated text content
    pub text: String,
    /// Token usage information
    pub usage: TokenUsage,
    /// Model that generated the response
    pub model: String,
    /// Provider that generated the response
    pub provider: String,
}

/// Options for text generation.
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    /// Temperature for sampling (0.0 to 1.0)
    pub temperature: Option<f32>,
    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,
    /// Whether to request JSON output
    pub json_mode: bool,
}

/// Trait for chat-completion providers.
#[async_trait]
pub trait AiProvider: Send + Sync {
    /// Get the provider name (e.g., "gemini").
    fn name(&self) -> &'static str;

    /// Check if the provider is configured (has API key).
    fn is_configured(&self) -> bool;

    /// Generate text from messages.
    async fn generate_text(
        &self,
        model: &str,
        messages: &[ChatMessage],
        options: &GenerateOptions,
    ) -> LlmResult<ChatResponse>;
}

/// Trait for embedding providers.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a batch of texts, one vector per input, in input order.
    async fn embed(&self, model: &str, texts: &[String]) -> LlmResult<Vec<Vec<f32>>>;
}

/// Parse a structured object out of a model response.
///
/// Standalone function rather than a trait method because generic methods
/// are not dyn-compatible. Models often wrap JSON in markdown code fences;
/// those are stripped before parsing.
pub fn parse_model_json<T: for<'de> Deserialize<'de>>(text: &str) -> LlmResult<T> {
    let text = text.trim();

    let json_text = if text.starts_with("```json") {
        text.strip_prefix("```json")
            .and_then(|s| s.strip_suffix("```"))
            .unwrap_or(text)
            .trim()
    } else if text.starts_with("```") {
        text.strip_prefix("```")
            .and_then(|s| s.strip_suffix("```"))
            .unwrap_or(text)
            .trim()
    } else {
        text
    };

    serde_json::from_str(json_text).map_err(|e| LlmError::ResponseParse {
        reason: format!("invalid JSON: {e}. Response: {text}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Sample {
        answer: String,
    }

    #[test]
    fn test_parse_plain_json() {
        let parsed: Sample = parse_model_json(r#"{"answer": "42"}"#).unwrap();
        assert_eq!(parsed.answer, "42");
    }

    #[test]
    fn test_parse_fenced_json() {
        let parsed: Sample = parse_model_json("```json\n{\"answer\": \"42\"}\n```").unwrap();
        assert_eq!(parsed.answer, "42");
    }

    #[test]
    fn test_parse_bare_fenced_json() {
        let parsed: Sample = parse_model_json("```\n{\"answer\": \"42\"}\n```").unwrap();
        assert_eq!(parsed.answer, "42");
    }

    #[test]
    fn test_parse_invalid_json() {
        let result: LlmResult<Sample> = parse_model_json("not json at all");
        assert!(result.is_err());
    }

    #[test]
    fn test_message_constructors() {
        assert_eq!(ChatMessage::system("a").role, ChatRole::System);
        assert_eq!(ChatMessage::user("b").role, ChatRole::User);
        assert_eq!(ChatMessage::assistant("c").role, ChatRole::Assistant);
    }
}
