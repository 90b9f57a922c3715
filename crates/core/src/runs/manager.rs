//! Entry point for starting, observing and stopping runs.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::task::TaskTracker;
use uuid::Uuid;

use crate::error::CoreError;
use crate::runs::cancel::{self, StopOutcome};
use crate::runs::launcher::{self, LaunchRequest, LaunchSettings};
use crate::runs::record::RunRecord;
use crate::runs::registry::RunRegistry;
use crate::runs::resolver::ScriptResolver;
use crate::types::RunId;

/// Tunables for the run engine.
#[derive(Debug, Clone, Default)]
pub struct RunSettings {
    pub launch: LaunchSettings,
    /// Grace period after SIGTERM before the group is sent SIGKILL.
    /// `None` never escalates.
    pub stop_escalation: Option<Duration>,
}

/// Parameters of a start request beyond the script id.
#[derive(Debug, Clone, Default)]
pub struct StartRun {
    pub input: Option<String>,
    pub elevate: bool,
}

/// Owns the run registry and the tasks that drive each child process.
///
/// Held in application state as `Arc<RunManager>`. Drain tasks are detached
/// onto a [`TaskTracker`] so [`shutdown`](Self::shutdown) can decide
/// explicitly how long to wait for them.
pub struct RunManager {
    registry: RunRegistry,
    resolver: Arc<dyn ScriptResolver>,
    tracker: TaskTracker,
    settings: Arc<RunSettings>,
}

impl RunManager {
    pub fn new(resolver: Arc<dyn ScriptResolver>, settings: RunSettings) -> Self {
        Self {
            registry: RunRegistry::new(),
            resolver,
            tracker: TaskTracker::new(),
            settings: Arc::new(settings),
        }
    }

    pub fn registry(&self) -> &RunRegistry {
        &self.registry
    }

    /// Start a run of `script_id` and return its id without waiting for the
    /// child to spawn.
    ///
    /// Fails with [`CoreError::NotFound`] before any record is created when
    /// the script is unknown.
    pub async fn start(&self, script_id: &str, request: StartRun) -> Result<RunId, CoreError> {
        let script_path = self.resolver.resolve(script_id).await?;

        let run_id = Uuid::new_v4().to_string();
        let (record, sender) = RunRecord::new(run_id.clone(), script_id.to_string());
        let record = Arc::new(record);
        self.registry.register(Arc::clone(&record)).await?;

        tracing::info!(
            run_id = %run_id,
            script_id,
            elevate = request.elevate,
            has_input = request.input.is_some(),
            "Starting run",
        );

        let launch = LaunchRequest {
            script_path,
            input: request.input,
            elevate: request.elevate,
        };
        let settings = Arc::clone(&self.settings);
        self.tracker.spawn(async move {
            launcher::run(record, sender, launch, &settings.launch).await;
        });

        Ok(run_id)
    }

    pub async fn get(&self, run_id: &str) -> Result<Arc<RunRecord>, CoreError> {
        self.registry
            .get(run_id)
            .await
            .ok_or_else(|| CoreError::not_found("run", run_id))
    }

    /// Ask a run's process group to terminate.
    ///
    /// Succeeds for every known run, whether or not a signal was delivered.
    pub async fn stop(&self, run_id: &str) -> Result<StopOutcome, CoreError> {
        let record = self.get(run_id).await?;
        let outcome = cancel::terminate(&record);
        tracing::info!(run_id, ?outcome, "Stop requested");

        if let (StopOutcome::Signalled { .. }, Some(grace)) = (outcome, self.settings.stop_escalation)
        {
            self.tracker.spawn(escalate(record, grace));
        }

        Ok(outcome)
    }

    /// Number of runs whose launcher has not finished.
    pub async fn active_runs(&self) -> usize {
        self.registry.running().await.len()
    }

    /// Drop finished runs older than `retention` from the registry.
    pub async fn evict_finished(&self, retention: Duration) -> usize {
        let older_than =
            chrono::Duration::from_std(retention).unwrap_or(chrono::Duration::MAX);
        self.registry.evict_finished(older_than).await
    }

    /// Terminate every running child and wait up to `timeout` for the drain
    /// tasks. Tasks still alive afterwards are abandoned.
    ///
    /// Returns `true` when everything drained in time.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        let running = self.registry.running().await;
        for record in &running {
            cancel::terminate(record);
        }
        tracing::info!(running = running.len(), "Terminating active runs");

        self.tracker.close();
        match tokio::time::timeout(timeout, self.tracker.wait()).await {
            Ok(()) => true,
            Err(_) => {
                tracing::warn!(
                    remaining = self.tracker.len(),
                    timeout_secs = timeout.as_secs(),
                    "Abandoning run tasks that did not finish in time",
                );
                false
            }
        }
    }
}

/// SIGKILL the group if the child is still around after `grace`.
async fn escalate(record: Arc<RunRecord>, grace: Duration) {
    tokio::time::sleep(grace).await;
    if let StopOutcome::Signalled { pid } = cancel::kill(&record) {
        tracing::warn!(run_id = %record.run_id(), pid, "Run ignored SIGTERM, sent SIGKILL");
    }
}
