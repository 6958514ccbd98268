//! Retrieval QA handler.

use axum::extract::State;
use axum::response::Json;
use connectors::Platform;
use llm::PromptManager;
use rag::RetrievalQa;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, instrument};

use crate::errors::ApiError;
use crate::handlers::oauth::fetch_export;
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    /// Session id from the OAuth flow.
    pub uuid: String,
    /// Platform the session belongs to.
    pub platform: Platform,
    /// Natural-language question about the tasks.
    pub question: String,
}

/// Answer a question about the connected account's tasks.
///
/// Pulls the current export, embeds it into a fresh index, retrieves the
/// closest chunks, and asks the chat model.
#[instrument(skip(state, request), fields(platform = %request.platform))]
pub async fn ask(
    State(state): State<AppState>,
    Json(request): Json<AskRequest>,
) -> Result<Json<Value>, ApiError> {
    if !state.config.ai_configured() {
        return Err(ApiError::unavailable(
            "Chat is disabled: no model API key configured",
        ));
    }
    if request.question.trim().is_empty() {
        return Err(ApiError::bad_request("Question must not be empty"));
    }

    let (_, documents) = fetch_export(&state, request.platform, &request.uuid).await?;

    let prompts = PromptManager::new().map_err(|e| ApiError::internal(e.to_string()))?;
    let qa = RetrievalQa::new(
        state.ai.clone(),
        state.embedder.clone(),
        prompts,
        state.config.chat_model.clone(),
        state.config.embed_model.clone(),
        state.config.rag_top_k,
    );

    let index = qa.build_index(&documents).await?;
    let chunks_indexed = index.len();
    let answer = qa.ask(&index, &request.question).await?;

    info!(chunks_indexed, "Answered question");
    Ok(Json(json!({
        "answer": answer.answer,
        "context": answer.context,
        "chunks_indexed": chunks_indexed,
    })))
}
