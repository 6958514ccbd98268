//! OAuth login/callback and data-pull handlers.

use axum::extract::{Path, Query, State};
use axum::response::{Json, Redirect};
use connectors::{asana, clickup, linear, OauthConfig, OauthToken, Platform, TaskDocument};
use serde::Deserialize;
use serde_json::Value;
use store::SessionRecord;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::errors::ApiError;
use crate::server::AppState;

/// Parse the path segment into a platform; unknown segments 404.
fn parse_platform(segment: &str) -> Result<Platform, ApiError> {
    segment
        .parse()
        .map_err(|_| ApiError::not_found(format!("Unknown platform: '{segment}'")))
}

/// OAuth config for the platform; unconfigured platforms 503.
fn oauth_config(state: &AppState, platform: Platform) -> Result<OauthConfig, ApiError> {
    state.config.oauth(platform).ok_or_else(|| {
        ApiError::unavailable(format!("Platform '{platform}' is not configured"))
    })
}

#[derive(Debug, Deserialize)]
pub struct LoginParams {
    /// Caller-chosen session id, echoed back to the chat UI after callback.
    uuid: String,
}

/// Start the OAuth flow: record the session and redirect to the provider.
#[instrument(skip(state))]
pub async fn login(
    State(state): State<AppState>,
    Path(platform): Path<String>,
    Query(params): Query<LoginParams>,
) -> Result<Redirect, ApiError> {
    let platform = parse_platform(&platform)?;
    let oauth = oauth_config(&state, platform)?;

    // ClickUp's callback carries no state parameter; the pending record is
    // resolved by platform instead. Linear round-trips the session id itself.
    let oauth_state = match platform {
        Platform::Asana => Some(Uuid::new_v4().to_string()),
        Platform::ClickUp => None,
        Platform::Linear => Some(params.uuid.clone()),
    };

    state
        .store
        .save(
            &params.uuid,
            SessionRecord::pending(platform.as_str(), oauth_state.clone()),
        )
        .await?;

    let url = match platform {
        Platform::Asana => {
            asana::authorize_url(&oauth, oauth_state.as_deref().unwrap_or_default())
        }
        Platform::ClickUp => clickup::authorize_url(&oauth),
        Platform::Linear => {
            linear::authorize_url(&oauth, oauth_state.as_deref().unwrap_or_default())
        }
    };

    info!(%platform, uuid = %params.uuid, "Starting OAuth flow");
    Ok(Redirect::temporary(&url))
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    code: String,
    #[serde(default)]
    state: Option<String>,
}

/// Complete the OAuth flow: resolve the session, exchange the code, store
/// the token, and send the user back to the chat UI.
#[instrument(skip(state, params))]
pub async fn callback(
    State(state): State<AppState>,
    Path(platform): Path<String>,
    Query(params): Query<CallbackParams>,
) -> Result<Redirect, ApiError> {
    let platform = parse_platform(&platform)?;
    let oauth = oauth_config(&state, platform)?;

    let (uuid, mut record) = match platform {
        Platform::ClickUp => state
            .store
            .find_pending(platform.as_str())
            .await?
            .ok_or_else(|| ApiError::bad_request("No pending ClickUp login"))?,
        _ => {
            let oauth_state = params
                .state
                .as_deref()
                .ok_or_else(|| ApiError::bad_request("Missing state parameter"))?;
            state
                .store
                .find_by_state(oauth_state)
                .await?
                .ok_or_else(|| ApiError::bad_request("Invalid or expired state"))?
        }
    };

    if record.platform != platform.as_str() {
        warn!(expected = %platform, got = %record.platform, "State resolved to wrong platform");
        return Err(ApiError::bad_request("Invalid or expired state"));
    }

    let token = exchange_code(&state, platform, &oauth, &params.code).await?;
    record.token = Some(
        serde_json::to_value(&token)
            .map_err(|e| ApiError::internal(format!("Failed to serialize token: {e}")))?,
    );
    record.state = None;
    state.store.save(&uuid, record).await?;

    info!(%platform, uuid = %uuid, "OAuth flow completed");
    Ok(Redirect::temporary(&format!(
        "{}?platform={platform}&uuid={uuid}",
        state.config.chat_ui_url
    )))
}

async fn exchange_code(
    state: &AppState,
    platform: Platform,
    oauth: &OauthConfig,
    code: &str,
) -> Result<OauthToken, ApiError> {
    let token_url = state
        .config
        .credentials(platform)
        .and_then(|c| c.token_url.clone());

    let result = match platform {
        Platform::Asana => {
            let url = token_url.as_deref().unwrap_or(asana::TOKEN_URL);
            asana::exchange_code_at(oauth, code, url).await
        }
        Platform::ClickUp => {
            let url = token_url.as_deref().unwrap_or(clickup::TOKEN_URL);
            clickup::exchange_code_at(oauth, code, url).await
        }
        Platform::Linear => {
            let url = token_url.as_deref().unwrap_or(linear::TOKEN_URL);
            linear::exchange_code_at(oauth, code, url).await
        }
    };

    result.map_err(|e| ApiError::upstream(format!("Token exchange failed: {e}")))
}

#[derive(Debug, Deserialize)]
pub struct GetDataParams {
    uuid: String,
}

/// Pull the connected account's full export.
#[instrument(skip(state))]
pub async fn get_data(
    State(state): State<AppState>,
    Path(platform): Path<String>,
    Query(params): Query<GetDataParams>,
) -> Result<Json<Value>, ApiError> {
    let platform = parse_platform(&platform)?;
    let (export, _) = fetch_export(&state, platform, &params.uuid).await?;
    Ok(Json(export))
}

/// Load the stored token and fetch everything the platform has for it.
///
/// Returns the raw export JSON alongside the flattened documents so the
/// chat flow can reuse this path.
pub async fn fetch_export(
    state: &AppState,
    platform: Platform,
    uuid: &str,
) -> Result<(Value, Vec<TaskDocument>), ApiError> {
    let record = state
        .store
        .get(uuid)
        .await?
        .ok_or_else(|| ApiError::bad_request(format!("Unknown session: '{uuid}'")))?;

    if record.platform != platform.as_str() {
        return Err(ApiError::bad_request(format!(
            "Session '{uuid}' belongs to platform '{}'",
            record.platform
        )));
    }

    let access_token = record
        .token
        .as_ref()
        .and_then(|t| t.get("access_token"))
        .and_then(Value::as_str)
        .ok_or_else(|| ApiError::unauthorized("No token stored; complete the OAuth flow first"))?;

    let api_url = state
        .config
        .credentials(platform)
        .and_then(|c| c.api_url.clone());

    match platform {
        Platform::Asana => {
            let client = match &api_url {
                Some(url) => asana::AsanaClient::with_url(access_token, url),
                None => asana::AsanaClient::new(access_token),
            }
            .map_err(|e| ApiError::internal(e.to_string()))?;
            let export = client
                .fetch_all()
                .await
                .map_err(|e| ApiError::upstream(e.to_string()))?;
            let docs = export.to_documents();
            Ok((to_json(&export)?, docs))
        }
        Platform::ClickUp => {
            let client = match &api_url {
                Some(url) => clickup::ClickUpClient::with_url(access_token, url),
                None => clickup::ClickUpClient::new(access_token),
            }
            .map_err(|e| ApiError::internal(e.to_string()))?;
            let export = client
                .fetch_all()
                .await
                .map_err(|e| ApiError::upstream(e.to_string()))?;
            let docs = export.to_documents();
            Ok((to_json(&export)?, docs))
        }
        Platform::Linear => {
            let client = match &api_url {
                Some(url) => linear::LinearClient::with_url(access_token, url),
                None => linear::LinearClient::new(access_token),
            }
            .map_err(|e| ApiError::internal(e.to_string()))?;
            let export = client
                .fetch_all()
                .await
                .map_err(|e| ApiError::upstream(e.to_string()))?;
            let docs = export.to_documents();
            Ok((to_json(&export)?, docs))
        }
    }
}

fn to_json<T: serde::Serialize>(export: &T) -> Result<Value, ApiError> {
    serde_json::to_value(export)
        .map_err(|e| ApiError::internal(format!("Failed to serialize export: {e}")))
}
