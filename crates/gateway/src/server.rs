//! HTTP router and shared state.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::State;
use axum::response::Json;
use axum::routing::{delete, get, post};
use axum::Router;
use llm::{AiProvider, EmbeddingProvider, GeminiProvider};
use serde_json::{json, Value};
use store::SessionStore;
use tableflow::Workbook;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::config::Config;
use crate::handlers::{chat, oauth, table};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Configuration.
    pub config: Arc<Config>,
    /// OAuth session/token store.
    pub store: SessionStore,
    /// Uploaded table sessions.
    pub workbooks: Arc<RwLock<HashMap<Uuid, Workbook>>>,
    /// Chat model backend.
    pub ai: Arc<dyn AiProvider>,
    /// Embedding backend.
    pub embedder: Arc<dyn EmbeddingProvider>,
}

impl AppState {
    /// Build state from config, wiring up the Gemini backend.
    pub fn new(config: Config) -> Self {
        let gemini = Arc::new(match &config.google_api_key {
            Some(key) => GeminiProvider::new(key.clone()),
            None => GeminiProvider::from_env(),
        });
        Self::with_providers(config, gemini.clone(), gemini)
    }

    /// Build state with explicit model backends (used by tests).
    pub fn with_providers(
        config: Config,
        ai: Arc<dyn AiProvider>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        let store = SessionStore::new(&config.session_store_dir);
        Self {
            config: Arc::new(config),
            store,
            workbooks: Arc::new(RwLock::new(HashMap::new())),
            ai,
            embedder,
        }
    }
}

/// Build the HTTP router for the gateway.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // OAuth flow + data pull, one set of routes per platform segment
        .route("/{platform}/login", get(oauth::login))
        .route("/{platform}/callback", get(oauth::callback))
        .route("/{platform}/get-data", get(oauth::get_data))
        // Retrieval QA over the connected account
        .route("/chat/ask", post(chat::ask))
        // Tabular editing sessions
        .route("/table/upload", post(table::upload))
        .route("/table/{id}/instruct", post(table::instruct))
        .route("/table/{id}/apply", post(table::apply))
        .route("/table/{id}/preview", delete(table::discard))
        .route("/table/{id}/undo", post(table::undo))
        .route("/table/{id}/history", get(table::history))
        .route("/table/{id}/download", get(table::download))
        .route("/table/{id}/chart", get(table::chart))
        // Health checks
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        // Uploads are the largest bodies this service accepts
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(state)
}

/// Request body cap (covers table uploads).
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Health check endpoint.
async fn health_check() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

/// Readiness check endpoint.
async fn readiness_check(State(state): State<AppState>) -> Json<Value> {
    let platforms: Vec<String> = state
        .config
        .enabled_platforms()
        .iter()
        .map(ToString::to_string)
        .collect();
    Json(json!({
        "status": "ready",
        "platforms": platforms,
        "ai_configured": state.config.ai_configured(),
    }))
}
