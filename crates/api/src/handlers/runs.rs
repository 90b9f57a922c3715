//! Handlers for observing and stopping runs.

use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;
use scriptrun_core::runs::{RunSnapshot, StopOutcome};
use serde::Serialize;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::sse;
use crate::state::AppState;

/// GET /api/v1/runs/{id}
pub async fn get_run(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<DataResponse<RunSnapshot>>> {
    let record = state.runs.get(&id).await?;
    Ok(Json(DataResponse {
        data: record.snapshot(),
    }))
}

/// GET /api/v1/runs/{id}/stream
///
/// Server-Sent Events: one `data` event per output line (JSON string),
/// empty `data: ` keep-alive events while idle, then `event: done`.
pub async fn stream_run(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let record = state.runs.get(&id).await?;
    tracing::debug!(run_id = %id, "Stream attached");
    Ok(sse::publisher::output_response(
        record,
        state.config.stream_keepalive,
    ))
}

#[derive(Debug, Serialize)]
pub struct StopResponse {
    pub ok: bool,
    #[serde(flatten)]
    pub outcome: StopOutcome,
}

/// POST /api/v1/runs/{id}/stop
///
/// Succeeds for every known run, including ones that never started or have
/// already exited.
pub async fn stop_run(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<DataResponse<StopResponse>>> {
    let outcome = state.runs.stop(&id).await?;
    Ok(Json(DataResponse {
        data: StopResponse { ok: true, outcome },
    }))
}
