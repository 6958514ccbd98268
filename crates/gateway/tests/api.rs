//! End-to-end router tests.

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use gateway::config::PlatformCredentials;
use gateway::{build_router, AppState, Config};
use llm::{
    AiProvider, ChatMessage, ChatResponse, EmbeddingProvider, GenerateOptions, LlmResult,
    TokenUsage,
};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Chat stub returning a fixed response.
struct FakeAi {
    response: String,
}

#[async_trait]
impl AiProvider for FakeAi {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn is_configured(&self) -> bool {
        true
    }

    async fn generate_text(
        &self,
        model: &str,
        _messages: &[ChatMessage],
        _options: &GenerateOptions,
    ) -> LlmResult<ChatResponse> {
        Ok(ChatResponse {
            text: self.response.clone(),
            usage: TokenUsage::default(),
            model: model.to_string(),
            provider: "fake".into(),
        })
    }
}

/// Embedder stub: every text maps to the same unit vector.
struct FakeEmbedder;

#[async_trait]
impl EmbeddingProvider for FakeEmbedder {
    async fn embed(&self, _model: &str, texts: &[String]) -> LlmResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
    }
}

fn base_config(dir: &TempDir) -> Config {
    Config {
        port: 0,
        public_base_url: "http://localhost:8080".to_string(),
        chat_ui_url: "http://localhost:8501/chat".to_string(),
        session_store_dir: dir.path().display().to_string(),
        asana: None,
        clickup: None,
        linear: None,
        google_api_key: None,
        chat_model: "fake-chat".to_string(),
        embed_model: "fake-embed".to_string(),
        rag_top_k: 4,
    }
}

fn app(config: Config, ai_response: &str) -> axum::Router {
    let state = AppState::with_providers(
        config,
        Arc::new(FakeAi {
            response: ai_response.to_string(),
        }),
        Arc::new(FakeEmbedder),
    );
    build_router(state)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

fn post_empty(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_health_and_ready() {
    let dir = TempDir::new().unwrap();
    let app = app(base_config(&dir), "");

    let response = app.clone().oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(get("/ready")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ready");
    assert_eq!(body["ai_configured"], false);
}

#[tokio::test]
async fn test_unknown_platform_is_404() {
    let dir = TempDir::new().unwrap();
    let app = app(base_config(&dir), "");

    let response = app
        .oneshot(get("/trello/login?uuid=u1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["status"], "error");
}

#[tokio::test]
async fn test_unconfigured_platform_is_503() {
    let dir = TempDir::new().unwrap();
    let app = app(base_config(&dir), "");

    let response = app.oneshot(get("/asana/login?uuid=u1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_login_redirects_to_provider() {
    let dir = TempDir::new().unwrap();
    let mut config = base_config(&dir);
    config.linear = Some(PlatformCredentials {
        client_id: "cid".to_string(),
        client_secret: "secret".to_string(),
        token_url: None,
        api_url: None,
    });
    let app = app(config, "");

    let response = app.oneshot(get("/linear/login?uuid=sess-1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);

    let location = response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(location.starts_with("https://linear.app/oauth/authorize"));
    // Linear round-trips the session id as the OAuth state.
    assert!(location.contains("state=sess-1"));
}

#[tokio::test]
async fn test_callback_and_get_data_flow() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "lin-token",
            "token_type": "Bearer"
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "viewer": {"id": "v1", "name": "Ada", "email": null},
                "teams": {"nodes": [{
                    "id": "t1", "name": "Core", "key": "COR",
                    "issues": {"nodes": [{
                        "id": "i1", "title": "Fix sync", "description": null,
                        "state": {"id": "s1", "name": "Todo"},
                        "assignee": null, "project": null
                    }]},
                    "projects": {"nodes": []}
                }]}
            }
        })))
        .mount(&server)
        .await;

    let mut config = base_config(&dir);
    config.linear = Some(PlatformCredentials {
        client_id: "cid".to_string(),
        client_secret: "secret".to_string(),
        token_url: Some(format!("{}/oauth/token", server.uri())),
        api_url: Some(format!("{}/graphql", server.uri())),
    });
    let app = app(config, "");

    let response = app
        .clone()
        .oneshot(get("/linear/login?uuid=sess-1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);

    let response = app
        .clone()
        .oneshot(get("/linear/callback?code=abc&state=sess-1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    let location = response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap();
    assert_eq!(
        location,
        "http://localhost:8501/chat?platform=linear&uuid=sess-1"
    );

    let response = app
        .oneshot(get("/linear/get-data?uuid=sess-1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["viewer"]["name"], "Ada");
    assert_eq!(body["teams"]["nodes"][0]["issues"]["nodes"][0]["title"], "Fix sync");
}

#[tokio::test]
async fn test_clickup_callback_resolves_pending_session() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "cu-token"
        })))
        .mount(&server)
        .await;

    // ClickUp wants the bare token, no Bearer prefix.
    Mock::given(method("GET"))
        .and(path("/team"))
        .and(wiremock::matchers::header("authorization", "cu-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "teams": [] })))
        .mount(&server)
        .await;

    let mut config = base_config(&dir);
    config.clickup = Some(PlatformCredentials {
        client_id: "cid".to_string(),
        client_secret: "secret".to_string(),
        token_url: Some(format!("{}/oauth/token", server.uri())),
        api_url: Some(server.uri()),
    });
    let app = app(config, "");

    let response = app
        .clone()
        .oneshot(get("/clickup/login?uuid=cu-1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    let location = response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(!location.contains("state="));

    // The callback carries no state; the pending record resolves it.
    let response = app
        .clone()
        .oneshot(get("/clickup/callback?code=abc"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    let location = response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap();
    assert_eq!(
        location,
        "http://localhost:8501/chat?platform=clickup&uuid=cu-1"
    );

    let response = app
        .clone()
        .oneshot(get("/clickup/get-data?uuid=cu-1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["teams"], json!([]));

    // The completed session no longer counts as pending.
    let response = app
        .oneshot(get("/clickup/callback?code=abc"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_asana_callback_uses_generated_state() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "as-token",
            "refresh_token": "rt"
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/workspaces"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
        .mount(&server)
        .await;

    let mut config = base_config(&dir);
    config.asana = Some(PlatformCredentials {
        client_id: "cid".to_string(),
        client_secret: "secret".to_string(),
        token_url: Some(format!("{}/oauth/token", server.uri())),
        api_url: Some(server.uri()),
    });
    let app = app(config, "");

    let response = app
        .clone()
        .oneshot(get("/asana/login?uuid=as-1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    let location = response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap();

    // Asana gets a fresh server-side state, distinct from the session id.
    let state = location.rsplit("state=").next().unwrap();
    assert_ne!(state, "as-1");
    assert_eq!(state.len(), 36);

    let response = app
        .clone()
        .oneshot(get(&format!("/asana/callback?code=abc&state={state}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    let location = response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap();
    assert_eq!(
        location,
        "http://localhost:8501/chat?platform=asana&uuid=as-1"
    );

    let response = app
        .oneshot(get("/asana/get-data?uuid=as-1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["projects"], json!([]));
}

#[tokio::test]
async fn test_callback_invalid_state_is_400() {
    let dir = TempDir::new().unwrap();
    let mut config = base_config(&dir);
    config.linear = Some(PlatformCredentials {
        client_id: "cid".to_string(),
        client_secret: "secret".to_string(),
        token_url: None,
        api_url: None,
    });
    let app = app(config, "");

    let response = app
        .oneshot(get("/linear/callback?code=abc&state=never-issued"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_get_data_without_token_is_401() {
    let dir = TempDir::new().unwrap();
    let mut config = base_config(&dir);
    config.linear = Some(PlatformCredentials {
        client_id: "cid".to_string(),
        client_secret: "secret".to_string(),
        token_url: None,
        api_url: None,
    });
    let app = app(config, "");

    // Login creates a pending record without a token.
    app.clone()
        .oneshot(get("/linear/login?uuid=sess-1"))
        .await
        .unwrap();

    let response = app
        .oneshot(get("/linear/get-data?uuid=sess-1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_chat_ask_disabled_without_api_key() {
    let dir = TempDir::new().unwrap();
    let app = app(base_config(&dir), "");

    let response = app
        .oneshot(post_json(
            "/chat/ask",
            &json!({"uuid": "u1", "platform": "linear", "question": "what is open?"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_chat_ask_answers_from_fetched_tasks() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "lin-token"
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "viewer": {"id": "v1", "name": "Ada", "email": null},
                "teams": {"nodes": [{
                    "id": "t1", "name": "Core", "key": "COR",
                    "issues": {"nodes": [{
                        "id": "i1", "title": "Fix sync", "description": null,
                        "state": null, "assignee": null, "project": null
                    }]},
                    "projects": {"nodes": []}
                }]}
            }
        })))
        .mount(&server)
        .await;

    let mut config = base_config(&dir);
    config.google_api_key = Some("test-key".to_string());
    config.linear = Some(PlatformCredentials {
        client_id: "cid".to_string(),
        client_secret: "secret".to_string(),
        token_url: Some(format!("{}/oauth/token", server.uri())),
        api_url: Some(format!("{}/graphql", server.uri())),
    });
    let app = app(config, "One task is open: Fix sync.");

    app.clone()
        .oneshot(get("/linear/login?uuid=sess-1"))
        .await
        .unwrap();
    app.clone()
        .oneshot(get("/linear/callback?code=abc&state=sess-1"))
        .await
        .unwrap();

    let response = app
        .oneshot(post_json(
            "/chat/ask",
            &json!({"uuid": "sess-1", "platform": "linear", "question": "what is open?"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["answer"], "One task is open: Fix sync.");
    // one task chunk plus the team header chunk
    assert_eq!(body["chunks_indexed"], 2);
}

#[tokio::test]
async fn test_table_upload_instruct_apply_undo() {
    let dir = TempDir::new().unwrap();
    let mut config = base_config(&dir);
    config.google_api_key = Some("test-key".to_string());
    let app = app(
        config,
        r#"[{"op": "drop_column", "name": "city"}]"#,
    );

    // Upload
    let response = app
        .clone()
        .oneshot(post_json(
            "/table/upload",
            &json!({"file_name": "people.csv", "content": "name,city\nada,paris\ngrace,dc\n"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let table_id = body["table_id"].as_str().unwrap().to_string();
    assert_eq!(body["columns"], json!(["name", "city"]));
    assert_eq!(body["rows"], 2);

    // Instruct stages a preview with the planned ops
    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/table/{table_id}/instruct"),
            &json!({"instruction": "remove the city column"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["ops"][0]["op"], "drop_column");
    assert_eq!(body["preview"]["columns"], json!(["name"]));

    // Apply commits
    let response = app
        .clone()
        .oneshot(post_empty(&format!("/table/{table_id}/apply")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["history_len"], 2);

    // History shows both entries
    let response = app
        .clone()
        .oneshot(get(&format!("/table/{table_id}/history")))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["history"][0], "Initial upload");
    assert_eq!(body["history"][1], "drop column 'city'");

    // Undo restores the city column
    let response = app
        .clone()
        .oneshot(post_empty(&format!("/table/{table_id}/undo")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // A second undo hits the initial upload
    let response = app
        .clone()
        .oneshot(post_empty(&format!("/table/{table_id}/undo")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "No more changes to undo");

    // Download returns CSV
    let response = app
        .oneshot(get(&format!("/table/{table_id}/download")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/csv"
    );
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let csv = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(csv.starts_with("name,city\n"));
}

#[tokio::test]
async fn test_discard_drops_staged_preview() {
    let dir = TempDir::new().unwrap();
    let mut config = base_config(&dir);
    config.google_api_key = Some("test-key".to_string());
    let app = app(config, r#"[{"op": "drop_column", "name": "city"}]"#);

    let response = app
        .clone()
        .oneshot(post_json(
            "/table/upload",
            &json!({"file_name": "people.csv", "content": "name,city\nada,paris\n"}),
        ))
        .await
        .unwrap();
    let body = body_json(response).await;
    let table_id = body["table_id"].as_str().unwrap().to_string();

    app.clone()
        .oneshot(post_json(
            &format!("/table/{table_id}/instruct"),
            &json!({"instruction": "remove the city column"}),
        ))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(delete(&format!("/table/{table_id}/preview")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["history_len"], 1);

    // Nothing left to commit.
    let response = app
        .oneshot(post_empty(&format!("/table/{table_id}/apply")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "No pending change to apply");
}

#[tokio::test]
async fn test_download_of_json_upload_is_named_csv() {
    let dir = TempDir::new().unwrap();
    let app = app(base_config(&dir), "");

    let response = app
        .clone()
        .oneshot(post_json(
            "/table/upload",
            &json!({
                "file_name": "cities.json",
                "content": r#"[{"name": "ada", "city": "paris"}]"#
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let table_id = body["table_id"].as_str().unwrap().to_string();

    let response = app
        .oneshot(get(&format!("/table/{table_id}/download")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/csv"
    );
    assert_eq!(
        response.headers().get(header::CONTENT_DISPOSITION).unwrap(),
        "attachment; filename=\"cities.csv\""
    );
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(bytes.as_ref(), b"name,city\nAda,Paris\n");
}

#[tokio::test]
async fn test_table_upload_rejects_xlsx() {
    let dir = TempDir::new().unwrap();
    let app = app(base_config(&dir), "");

    let response = app
        .oneshot(post_json(
            "/table/upload",
            &json!({"file_name": "report.xlsx", "content": "binary"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("xlsx"));
}

#[tokio::test]
async fn test_chart_endpoint() {
    let dir = TempDir::new().unwrap();
    let app = app(base_config(&dir), "");

    let response = app
        .clone()
        .oneshot(post_json(
            "/table/upload",
            &json!({"file_name": "ages.csv", "content": "city,age\nparis,30\ndc,40\nparis,50\n"}),
        ))
        .await
        .unwrap();
    let body = body_json(response).await;
    let table_id = body["table_id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(get(&format!(
            "/table/{table_id}/chart?kind=value_counts&column=city"
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["labels"], json!(["Paris", "Dc"]));
    assert_eq!(body["data"]["counts"], json!([2, 1]));

    let response = app
        .clone()
        .oneshot(get(&format!(
            "/table/{table_id}/chart?kind=histogram&column=age&bins=2"
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(get(&format!("/table/{table_id}/chart?kind=pie&column=city")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_table_is_404() {
    let dir = TempDir::new().unwrap();
    let app = app(base_config(&dir), "");

    let id = uuid::Uuid::new_v4();
    let response = app
        .oneshot(get(&format!("/table/{id}/history")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
