//! Tabular editing handlers.

use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Json, Response};
use llm::PromptManager;
use serde::Deserialize;
use serde_json::{json, Value};
use tableflow::{apply_ops, charts, DataTable, Planner, TableError, Workbook};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::errors::ApiError;
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct UploadRequest {
    /// Original file name; the extension selects the parser.
    pub file_name: String,
    /// File content as text.
    pub content: String,
}

/// Upload a CSV or JSON table and open an editing session.
#[instrument(skip(state, request), fields(file_name = %request.file_name))]
pub async fn upload(
    State(state): State<AppState>,
    Json(request): Json<UploadRequest>,
) -> Result<Json<Value>, ApiError> {
    let extension = request
        .file_name
        .rsplit('.')
        .next()
        .unwrap_or_default()
        .to_lowercase();

    let table = match extension.as_str() {
        "csv" => DataTable::from_csv(&request.content)?,
        "json" => DataTable::from_json(&request.content)?,
        other => {
            return Err(TableError::UnsupportedFormat {
                extension: other.to_string(),
            }
            .into())
        }
    };

    let table_id = Uuid::new_v4();
    let workbook = Workbook::new(&request.file_name, table);
    let (columns, rows) = {
        let current = workbook.current();
        (current.columns.clone(), current.rows.len())
    };
    state.workbooks.write().await.insert(table_id, workbook);

    info!(%table_id, rows, "Opened table session");
    Ok(Json(json!({
        "table_id": table_id,
        "columns": columns,
        "rows": rows,
    })))
}

#[derive(Debug, Deserialize)]
pub struct InstructRequest {
    /// Natural-language edit instruction.
    pub instruction: String,
}

/// Translate an instruction into an operation plan and stage a preview.
#[instrument(skip(state, request))]
pub async fn instruct(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<InstructRequest>,
) -> Result<Json<Value>, ApiError> {
    if !state.config.ai_configured() {
        return Err(ApiError::unavailable(
            "Instructions are disabled: no model API key configured",
        ));
    }

    let prompts = PromptManager::new().map_err(|e| ApiError::internal(e.to_string()))?;
    let planner = Planner::new(state.ai.clone(), prompts, state.config.chat_model.clone());

    // Plan against a snapshot so the lock is not held across the model call.
    let current = {
        let workbooks = state.workbooks.read().await;
        workbooks
            .get(&id)
            .ok_or_else(|| ApiError::not_found(format!("Unknown table: '{id}'")))?
            .current()
            .clone()
    };

    let ops = planner.plan(&current, &request.instruction).await?;
    let next = apply_ops(&current, &ops)?;

    let action = ops
        .iter()
        .map(tableflow::TableOp::describe)
        .collect::<Vec<_>>()
        .join("; ");

    let mut workbooks = state.workbooks.write().await;
    let workbook = workbooks
        .get_mut(&id)
        .ok_or_else(|| ApiError::not_found(format!("Unknown table: '{id}'")))?;
    workbook.stage(&action, next);

    let preview = workbook.preview().ok_or_else(|| {
        ApiError::internal("Preview vanished after staging")
    })?;

    info!(%id, ops = ops.len(), "Staged table change");
    Ok(Json(json!({
        "ops": ops,
        "action": action,
        "preview": preview,
    })))
}

/// Drop the staged preview without committing.
#[instrument(skip(state))]
pub async fn discard(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let mut workbooks = state.workbooks.write().await;
    let workbook = workbooks
        .get_mut(&id)
        .ok_or_else(|| ApiError::not_found(format!("Unknown table: '{id}'")))?;

    workbook.discard();

    info!(%id, "Discarded staged change");
    Ok(Json(json!({
        "rows": workbook.current().rows.len(),
        "history_len": workbook.history_len(),
    })))
}

/// Commit the staged preview.
#[instrument(skip(state))]
pub async fn apply(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let mut workbooks = state.workbooks.write().await;
    let workbook = workbooks
        .get_mut(&id)
        .ok_or_else(|| ApiError::not_found(format!("Unknown table: '{id}'")))?;

    let table = workbook.apply()?;
    let rows = table.rows.len();
    let history_len = workbook.history_len();

    info!(%id, rows, "Applied table change");
    Ok(Json(json!({ "rows": rows, "history_len": history_len })))
}

/// Revert the last committed change.
#[instrument(skip(state))]
pub async fn undo(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let mut workbooks = state.workbooks.write().await;
    let workbook = workbooks
        .get_mut(&id)
        .ok_or_else(|| ApiError::not_found(format!("Unknown table: '{id}'")))?;

    let table = workbook.undo()?;
    let rows = table.rows.len();
    let history_len = workbook.history_len();

    info!(%id, "Undid table change");
    Ok(Json(json!({ "rows": rows, "history_len": history_len })))
}

/// Action log, oldest first.
pub async fn history(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let workbooks = state.workbooks.read().await;
    let workbook = workbooks
        .get(&id)
        .ok_or_else(|| ApiError::not_found(format!("Unknown table: '{id}'")))?;
    Ok(Json(json!({ "history": workbook.log() })))
}

/// Download the current table as CSV.
pub async fn download(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let workbooks = state.workbooks.read().await;
    let workbook = workbooks
        .get(&id)
        .ok_or_else(|| ApiError::not_found(format!("Unknown table: '{id}'")))?;

    let csv = workbook.current().to_csv();
    // JSON uploads download as CSV too, so the name keeps only the stem.
    let stem = workbook
        .file_name
        .rsplit_once('.')
        .map_or(workbook.file_name.as_str(), |(stem, _)| stem);
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{stem}.csv\""),
            ),
        ],
        csv,
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
pub struct ChartParams {
    /// Chart kind: histogram, value_counts, summary, crosstab, correlation.
    pub kind: String,
    #[serde(default)]
    pub column: Option<String>,
    #[serde(default)]
    pub column2: Option<String>,
    #[serde(default)]
    pub bins: Option<usize>,
}

/// Default histogram bin count.
const DEFAULT_BINS: usize = 10;

/// Build chart data from the current table.
#[instrument(skip(state))]
pub async fn chart(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<ChartParams>,
) -> Result<Json<Value>, ApiError> {
    let workbooks = state.workbooks.read().await;
    let table = workbooks
        .get(&id)
        .ok_or_else(|| ApiError::not_found(format!("Unknown table: '{id}'")))?
        .current();

    let column = params.column.as_deref();
    let need_column =
        || column.ok_or_else(|| ApiError::bad_request("Missing 'column' parameter"));

    let data = match params.kind.as_str() {
        "histogram" => to_json(&charts::histogram(
            table,
            need_column()?,
            params.bins.unwrap_or(DEFAULT_BINS),
        )?)?,
        "value_counts" => to_json(&charts::value_counts(table, need_column()?)?)?,
        "summary" => to_json(&charts::summary_stats(table, need_column()?)?)?,
        "crosstab" => {
            let column2 = params
                .column2
                .as_deref()
                .ok_or_else(|| ApiError::bad_request("Missing 'column2' parameter"))?;
            to_json(&charts::crosstab(table, need_column()?, column2)?)?
        }
        "correlation" => to_json(&charts::correlation_matrix(table)?)?,
        other => {
            return Err(ApiError::bad_request(format!(
                "Unknown chart kind: '{other}'"
            )))
        }
    };

    Ok(Json(json!({ "kind": params.kind, "data": data })))
}

fn to_json<T: serde::Serialize>(data: &T) -> Result<Value, ApiError> {
    serde_json::to_value(data)
        .map_err(|e| ApiError::internal(format!("Failed to serialize chart: {e}")))
}
