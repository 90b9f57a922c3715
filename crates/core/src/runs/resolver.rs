use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::CoreError;

/// Lookup from a script id to the executable file backing it.
///
/// This is the only thing the run engine needs from script storage.
/// Implementations return [`CoreError::NotFound`] for unknown ids.
#[async_trait]
pub trait ScriptResolver: Send + Sync {
    async fn resolve(&self, script_id: &str) -> Result<PathBuf, CoreError>;
}
