#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]

//! # llm
//!
//! AI provider abstraction for the task gateway.
//!
//! This crate provides:
//! - `AiProvider` / `EmbeddingProvider` traits
//! - Gemini implementation (chat completion + batch embeddings)
//! - Handlebars prompt templates
//! - Helpers for parsing structured (JSON) model output

pub mod errors;
pub mod gemini;
pub mod prompts;
pub mod provider;

pub use errors::{LlmError, LlmResult};
pub use gemini::GeminiProvider;
pub use prompts::PromptManager;
pub use provider::{
    parse_model_json, AiProvider, ChatMessage, ChatResponse, ChatRole, EmbeddingProvider,
    GenerateOptions, TokenUsage,
};
