/// Identifier of a stored script (the name of its directory in the store).
pub type ScriptId = String;

/// Opaque handle for one execution; a UUID v4 string, never reused.
pub type RunId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
