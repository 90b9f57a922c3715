pub mod health;
pub mod runs;
pub mod scripts;

use axum::routing::get;
use axum::Router;

use crate::handlers;
use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /info                                 server info
///
/// /scripts                              list, create
/// /scripts/{id}                         get, update, delete
/// /scripts/{id}/run                     start a run (POST)
///
/// /runs/{id}                            run snapshot
/// /runs/{id}/stream                     SSE output stream
/// /runs/{id}/stop                       terminate (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/info", get(handlers::info::get_info))
        .nest("/scripts", scripts::router())
        .nest("/runs", runs::router())
}
