//! Handlers for script records and for starting runs.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use scriptrun_core::runs::StartRun;
use scriptrun_core::types::RunId;
use scriptrun_store::models::{CreateScript, Script, ScriptSummary, UpdateScript};
use serde::Serialize;
use serde_json::Value;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Script CRUD handlers
// ---------------------------------------------------------------------------

/// GET /api/v1/scripts
pub async fn list_scripts(
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<Vec<ScriptSummary>>>> {
    let scripts = state.scripts.list().await?;
    Ok(Json(DataResponse { data: scripts }))
}

/// POST /api/v1/scripts
pub async fn create_script(
    State(state): State<AppState>,
    Json(input): Json<CreateScript>,
) -> AppResult<(StatusCode, Json<DataResponse<Script>>)> {
    let script = state.scripts.create(input).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: script })))
}

/// GET /api/v1/scripts/{id}
pub async fn get_script(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<DataResponse<Script>>> {
    let script = state.scripts.find_by_id(&id).await?;
    Ok(Json(DataResponse { data: script }))
}

/// PUT /api/v1/scripts/{id}
pub async fn update_script(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<UpdateScript>,
) -> AppResult<Json<DataResponse<Script>>> {
    let script = state.scripts.update(&id, input).await?;
    Ok(Json(DataResponse { data: script }))
}

/// DELETE /api/v1/scripts/{id}
pub async fn delete_script(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    state.scripts.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Run start
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct RunStarted {
    pub run_id: RunId,
}

/// POST /api/v1/scripts/{id}/run
///
/// The body is optional. When present it must be a JSON object with an
/// optional string `input` (written to the script's stdin) and an optional
/// boolean `run_as_sudo`. Returns as soon as the run is registered; output
/// is read from `/runs/{run_id}/stream`.
pub async fn start_run(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> AppResult<(StatusCode, Json<DataResponse<RunStarted>>)> {
    let request = parse_start_request(&body)?;
    let run_id = state.runs.start(&id, request).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(DataResponse {
            data: RunStarted { run_id },
        }),
    ))
}

/// Decode the optional start body.
///
/// An empty `input` string is treated as no input, so stdin is closed
/// without a trailing newline being written.
fn parse_start_request(body: &[u8]) -> Result<StartRun, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(StartRun::default());
    }

    let value: Value = serde_json::from_slice(body)
        .map_err(|e| AppError::BadRequest(format!("Request body must be JSON: {e}")))?;
    let fields = match value {
        Value::Object(fields) => fields,
        Value::Null => return Ok(StartRun::default()),
        _ => {
            return Err(AppError::BadRequest(
                "Request body must be a JSON object".to_string(),
            ))
        }
    };

    let input = match fields.get("input") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.is_empty() => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => return Err(AppError::BadRequest("Input must be a string".to_string())),
    };

    let elevate = match fields.get("run_as_sudo") {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(_) => {
            return Err(AppError::BadRequest(
                "run_as_sudo must be a boolean".to_string(),
            ))
        }
    };

    Ok(StartRun { input, elevate })
}
