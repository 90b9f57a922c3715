use scriptrun_core::types::{ScriptId, Timestamp};
use serde::{Deserialize, Serialize};

/// Contents of `meta.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptMeta {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub created: Timestamp,
}

/// A script as listed, without its source.
#[derive(Debug, Clone, Serialize)]
pub struct ScriptSummary {
    pub id: ScriptId,
    pub name: String,
    pub description: String,
    pub created: Timestamp,
}

/// A script with its source.
#[derive(Debug, Clone, Serialize)]
pub struct Script {
    pub id: ScriptId,
    pub name: String,
    pub description: String,
    pub created: Timestamp,
    pub script: String,
}

/// DTO for creating a script.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateScript {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Source; defaults to an empty bash script.
    #[serde(default)]
    pub script: Option<String>,
}

/// DTO for updating a script. All fields optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateScript {
    pub name: Option<String>,
    pub description: Option<String>,
    pub script: Option<String>,
}

impl ScriptSummary {
    pub fn from_meta(id: ScriptId, meta: ScriptMeta) -> Self {
        Self {
            id,
            name: meta.name,
            description: meta.description,
            created: meta.created,
        }
    }
}
