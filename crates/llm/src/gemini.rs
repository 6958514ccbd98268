//! Google Gemini provider implementation.
//!
//! Covers both chat completion (`generateContent`) and batch embeddings
//! (`batchEmbedContents`) against the Generative Language API.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::errors::{LlmError, LlmResult};
use crate::provider::{
    AiProvider, ChatMessage, ChatResponse, ChatRole, EmbeddingProvider, GenerateOptions, TokenUsage,
};

/// Generative Language API base URL.
const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com";

/// Default chat model.
pub const DEFAULT_CHAT_MODEL: &str = "gemini-2.0-flash";

/// Default embedding model.
pub const DEFAULT_EMBED_MODEL: &str = "embedding-001";

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: UsageMetadata,
    model_version: Option<String>,
}

#[derive(Debug, Serialize)]
struct EmbedContentRequest {
    model: String,
    content: Content,
}

#[derive(Debug, Serialize)]
struct BatchEmbedRequest {
    requests: Vec<EmbedContentRequest>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<EmbeddingValues>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiError,
}

/// Gemini provider.
pub struct GeminiProvider {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl GeminiProvider {
    /// Create a new provider with an API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: Some(api_key.into()),
            base_url: GEMINI_API_URL.to_string(),
        }
    }

    /// Create from the `GOOGLE_API_KEY` environment variable.
    ///
    /// A missing key yields an unconfigured provider; calls will fail with
    /// `LlmError::NotConfigured` rather than at construction time.
    pub fn from_env() -> Self {
        Self {
            client: Client::new(),
            api_key: std::env::var("GOOGLE_API_KEY").ok().filter(|s| !s.is_empty()),
            base_url: GEMINI_API_URL.to_string(),
        }
    }

    /// Set a custom base URL (useful for test servers).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn api_key(&self) -> LlmResult<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| LlmError::NotConfigured {
                provider: "gemini".to_string(),
                reason: "GOOGLE_API_KEY not set".to_string(),
            })
    }

    /// Fold chat messages into the Gemini wire shape: system messages become
    /// a single `systemInstruction`, the rest alternate user/model contents.
    fn convert_messages(messages: &[ChatMessage]) -> (Option<Content>, Vec<Content>) {
        let system_text: Vec<&str> = messages
            .iter()
            .filter(|m| m.role == ChatRole::System)
            .map(|m| m.content.as_str())
            .collect();

        let system_instruction = if system_text.is_empty() {
            None
        } else {
            Some(Content {
                role: None,
                parts: vec![Part {
                    text: system_text.join("\n\n"),
                }],
            })
        };

        let contents = messages
            .iter()
            .filter(|m| m.role != ChatRole::System)
            .map(|m| Content {
                role: Some(match m.role {
                    ChatRole::Assistant => "model".to_string(),
                    _ => "user".to_string(),
                }),
                parts: vec![Part {
                    text: m.content.clone(),
                }],
            })
            .collect();

        (system_instruction, contents)
    }

    async fn post_json<Req: Serialize, Resp: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        request: &Req,
    ) -> LlmResult<Resp> {
        let response = self.client.post(url).json(request).send().await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            if let Ok(err) = serde_json::from_str::<ApiErrorResponse>(&body) {
                return Err(LlmError::Api {
                    status: err.error.status.unwrap_or_else(|| status.to_string()),
                    message: err.error.message,
                });
            }
            return Err(LlmError::Api {
                status: status.to_string(),
                message: body,
            });
        }

        serde_json::from_str(&body).map_err(|e| LlmError::ResponseParse {
            reason: format!("unexpected Gemini response: {e}"),
        })
    }
}

#[async_trait]
impl AiProvider for GeminiProvider {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    #[instrument(skip(self, messages, options), fields(model = %model))]
    async fn generate_text(
        &self,
        model: &str,
        messages: &[ChatMessage],
        options: &GenerateOptions,
    ) -> LlmResult<ChatResponse> {
        let api_key = self.api_key()?;

        let (system_instruction, contents) = Self::convert_messages(messages);

        let generation_config = if options.temperature.is_some()
            || options.max_tokens.is_some()
            || options.json_mode
        {
            Some(GenerationConfig {
                temperature: options.temperature,
                max_output_tokens: options.max_tokens,
                response_mime_type: options
                    .json_mode
                    .then(|| "application/json".to_string()),
            })
        } else {
            None
        };

        let request = GenerateRequest {
            contents,
            system_instruction,
            generation_config,
        };

        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, model, api_key
        );

        let api_response: GenerateResponse = self.post_json(&url, &request).await?;

        let text = api_response
            .candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| {
                c.parts
                    .iter()
                    .map(|p| p.text.as_str())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        debug!(chars = text.len(), "Gemini generation complete");

        Ok(ChatResponse {
            text,
            usage: TokenUsage {
                input_tokens: api_response.usage_metadata.prompt_token_count,
                output_tokens: api_response.usage_metadata.candidates_token_count,
                total_tokens: api_response.usage_metadata.total_token_count,
            },
            model: api_response
                .model_version
                .unwrap_or_else(|| model.to_string()),
            provider: "gemini".to_string(),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiProvider {
    #[instrument(skip(self, texts), fields(model = %model, count = texts.len()))]
    async fn embed(&self, model: &str, texts: &[String]) -> LlmResult<Vec<Vec<f32>>> {
        let api_key = self.api_key()?;

        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let model_path = if model.starts_with("models/") {
            model.to_string()
        } else {
            format!("models/{model}")
        };

        let request = BatchEmbedRequest {
            requests: texts
                .iter()
                .map(|text| EmbedContentRequest {
                    model: model_path.clone(),
                    content: Content {
                        role: None,
                        parts: vec![Part { text: text.clone() }],
                    },
                })
                .collect(),
        };

        let url = format!(
            "{}/v1beta/{}:batchEmbedContents?key={}",
            self.base_url, model_path, api_key
        );

        let api_response: BatchEmbedResponse = self.post_json(&url, &request).await?;

        if api_response.embeddings.len() != texts.len() {
            return Err(LlmError::EmbeddingMismatch {
                requested: texts.len(),
                received: api_response.embeddings.len(),
            });
        }

        Ok(api_response.embeddings.into_iter().map(|e| e.values).collect())
    }
}
