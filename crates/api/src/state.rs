use std::sync::Arc;

use scriptrun_core::runs::RunManager;
use scriptrun_store::ScriptStore;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Filesystem script records.
    pub scripts: Arc<ScriptStore>,
    /// Run engine: registry, launcher tasks, cancellation.
    pub runs: Arc<RunManager>,
}

impl AppState {
    /// Wire a run engine over `scripts` using the run settings from `config`.
    pub fn new(config: ServerConfig, scripts: ScriptStore) -> Self {
        let scripts = Arc::new(scripts);
        let runs = Arc::new(RunManager::new(scripts.clone(), config.run_settings()));
        Self {
            config: Arc::new(config),
            scripts,
            runs,
        }
    }
}
