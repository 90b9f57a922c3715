use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;

use crate::error::CoreError;
use crate::runs::record::RunRecord;
use crate::types::RunId;

/// Process-wide map of run id to [`RunRecord`].
///
/// A single mutex guards the map and is held only for the lookup or insert
/// itself, never across I/O. Records are fully built before insertion, so a
/// concurrent `get` only ever sees complete records.
#[derive(Debug, Default)]
pub struct RunRegistry {
    runs: Mutex<HashMap<RunId, Arc<RunRecord>>>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record under its own run id.
    ///
    /// Fails with [`CoreError::Conflict`] if the id is already taken.
    pub async fn register(&self, record: Arc<RunRecord>) -> Result<(), CoreError> {
        let mut runs = self.runs.lock().await;
        if runs.contains_key(record.run_id()) {
            return Err(CoreError::Conflict(format!(
                "run id {} is already registered",
                record.run_id()
            )));
        }
        runs.insert(record.run_id().to_string(), record);
        Ok(())
    }

    pub async fn get(&self, run_id: &str) -> Option<Arc<RunRecord>> {
        self.runs.lock().await.get(run_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.runs.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Records whose launcher has not finished yet.
    pub async fn running(&self) -> Vec<Arc<RunRecord>> {
        self.runs
            .lock()
            .await
            .values()
            .filter(|r| !r.is_done())
            .cloned()
            .collect()
    }

    /// Drop finished records that completed more than `older_than` ago.
    ///
    /// Records still running are never evicted. Returns the number removed.
    /// A window reaching past the earliest representable time evicts nothing.
    pub async fn evict_finished(&self, older_than: chrono::Duration) -> usize {
        let Some(cutoff) = Utc::now().checked_sub_signed(older_than) else {
            return 0;
        };
        let mut runs = self.runs.lock().await;
        let before = runs.len();
        runs.retain(|_, record| match record.finished_at() {
            Some(finished) if record.is_done() => finished > cutoff,
            _ => true,
        });
        before - runs.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
