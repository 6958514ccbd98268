//! HTTP error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use tracing::error;

/// An error with an HTTP status and a JSON body.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_GATEWAY,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = %self.status, error = %self.message, "Request failed");
        }
        (
            self.status,
            Json(json!({ "status": "error", "error": self.message })),
        )
            .into_response()
    }
}

impl From<store::StoreError> for ApiError {
    fn from(e: store::StoreError) -> Self {
        ApiError::internal(e.to_string())
    }
}

impl From<llm::LlmError> for ApiError {
    fn from(e: llm::LlmError) -> Self {
        match e {
            llm::LlmError::NotConfigured { .. } => ApiError::unavailable(e.to_string()),
            _ => ApiError::upstream(e.to_string()),
        }
    }
}

impl From<tableflow::TableError> for ApiError {
    fn from(e: tableflow::TableError) -> Self {
        match e {
            tableflow::TableError::Llm(inner) => inner.into(),
            _ => ApiError::bad_request(e.to_string()),
        }
    }
}

impl From<rag::RagError> for ApiError {
    fn from(e: rag::RagError) -> Self {
        match e {
            rag::RagError::Llm(inner) => inner.into(),
            rag::RagError::EmptyIndex => ApiError::bad_request(e.to_string()),
        }
    }
}
