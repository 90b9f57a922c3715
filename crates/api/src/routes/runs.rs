use axum::routing::{get, post};
use axum::Router;

use crate::handlers::runs;
use crate::state::AppState;

/// Routes mounted at `/runs`.
///
/// ```text
/// GET    /{id}            -> get_run
/// GET    /{id}/stream     -> stream_run
/// POST   /{id}/stop       -> stop_run
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{id}", get(runs::get_run))
        .route("/{id}/stream", get(runs::stream_run))
        .route("/{id}/stop", post(runs::stop_run))
}
