use std::path::PathBuf;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::response::DataResponse;
use crate::state::AppState;

/// Payload of `GET /api/v1/info`.
#[derive(Debug, Serialize)]
pub struct ServerInfo {
    pub version: &'static str,
    pub container: bool,
    pub scripts_dir: PathBuf,
    pub active_runs: usize,
}

/// GET /api/v1/info
pub async fn get_info(State(state): State<AppState>) -> Json<DataResponse<ServerInfo>> {
    Json(DataResponse {
        data: ServerInfo {
            version: env!("CARGO_PKG_VERSION"),
            container: state.config.container,
            scripts_dir: state.scripts.root().to_path_buf(),
            active_runs: state.runs.active_runs().await,
        },
    })
}
