use scriptrun_core::error::CoreError;

/// Errors raised by [`ScriptStore`](crate::ScriptStore) operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No script with this id (also used for ids that fail validation).
    #[error("Script not found: {0}")]
    NotFound(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt script metadata: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => CoreError::not_found("script", id),
            StoreError::Validation(msg) => CoreError::Validation(msg),
            other => CoreError::Internal(other.to_string()),
        }
    }
}
