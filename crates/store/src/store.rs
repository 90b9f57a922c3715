use std::io::ErrorKind;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use scriptrun_core::error::CoreError;
use scriptrun_core::runs::ScriptResolver;
use tokio::fs;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{CreateScript, Script, ScriptMeta, ScriptSummary, UpdateScript};

const META_FILE: &str = "meta.json";
const SCRIPT_FILE: &str = "script";

/// Source written when a script is created without a body.
pub const DEFAULT_SCRIPT: &str = "#!/bin/bash\n\n";

/// Length of generated script ids (hex characters).
const ID_LEN: usize = 8;

/// Script ids become directory names, so only a conservative character set
/// is accepted. Anything else is reported as not found.
pub fn is_valid_script_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 64
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Directory-per-script store rooted at a single directory.
#[derive(Debug, Clone)]
pub struct ScriptStore {
    root: PathBuf,
}

impl ScriptStore {
    /// Open (creating if needed) the store rooted at `root`.
    pub async fn open(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        fs::create_dir_all(root.as_ref()).await?;
        let root = fs::canonicalize(root.as_ref()).await?;
        tracing::debug!(root = %root.display(), "Script store opened");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// All scripts with readable metadata, sorted by id.
    pub async fn list(&self) -> Result<Vec<ScriptSummary>, StoreError> {
        let mut scripts = Vec::new();
        let mut entries = fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let Some(id) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if !is_valid_script_id(&id) {
                continue;
            }
            match self.read_meta(&id).await {
                Ok(meta) => scripts.push(ScriptSummary::from_meta(id, meta)),
                Err(StoreError::NotFound(_)) => {}
                Err(e) => {
                    tracing::warn!(script_id = %id, error = %e, "Skipping unreadable script");
                }
            }
        }
        scripts.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(scripts)
    }

    /// A single script including its source.
    pub async fn find_by_id(&self, id: &str) -> Result<Script, StoreError> {
        let meta = self.read_meta(id).await?;
        let script = match fs::read_to_string(self.script_path(id)).await {
            Ok(source) => source,
            Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Script {
            id: id.to_string(),
            name: meta.name,
            description: meta.description,
            created: meta.created,
            script,
        })
    }

    pub async fn create(&self, input: CreateScript) -> Result<Script, StoreError> {
        let name = input.name.trim();
        if name.is_empty() {
            return Err(StoreError::Validation("Name is required".to_string()));
        }

        let id = self.allocate_id().await?;
        let meta = ScriptMeta {
            name: name.to_string(),
            description: input.description.unwrap_or_default(),
            created: Utc::now(),
        };
        let source = input.script.unwrap_or_else(|| DEFAULT_SCRIPT.to_string());

        self.write_meta(&id, &meta).await?;
        self.write_script(&id, &source).await?;
        tracing::info!(script_id = %id, name = %meta.name, "Script created");

        Ok(Script {
            id,
            name: meta.name,
            description: meta.description,
            created: meta.created,
            script: source,
        })
    }

    pub async fn update(&self, id: &str, input: UpdateScript) -> Result<Script, StoreError> {
        let mut meta = self.read_meta(id).await?;

        if let Some(name) = input.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(StoreError::Validation("Name must not be empty".to_string()));
            }
            meta.name = name.to_string();
        }
        if let Some(description) = input.description {
            meta.description = description;
        }
        self.write_meta(id, &meta).await?;

        if let Some(source) = input.script {
            self.write_script(id, &source).await?;
        }
        tracing::info!(script_id = %id, "Script updated");

        self.find_by_id(id).await
    }

    pub async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let dir = self.script_dir(id)?;
        match fs::remove_dir_all(&dir).await {
            Ok(()) => {
                tracing::info!(script_id = %id, "Script deleted");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::NotFound(id.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    /// Path of the executable for `id`, if the script exists.
    pub async fn executable_path(&self, id: &str) -> Result<PathBuf, StoreError> {
        self.read_meta(id).await?;
        let path = self.script_path(id);
        match fs::metadata(&path).await {
            Ok(_) => Ok(path),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::NotFound(id.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    fn script_dir(&self, id: &str) -> Result<PathBuf, StoreError> {
        if !is_valid_script_id(id) {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(self.root.join(id))
    }

    fn script_path(&self, id: &str) -> PathBuf {
        self.root.join(id).join(SCRIPT_FILE)
    }

    async fn read_meta(&self, id: &str) -> Result<ScriptMeta, StoreError> {
        let path = self.script_dir(id)?.join(META_FILE);
        let raw = match fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StoreError::NotFound(id.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_slice(&raw)?)
    }

    async fn write_meta(&self, id: &str, meta: &ScriptMeta) -> Result<(), StoreError> {
        let dir = self.script_dir(id)?;
        fs::create_dir_all(&dir).await?;
        let json = serde_json::to_vec_pretty(meta)?;
        fs::write(dir.join(META_FILE), json).await?;
        Ok(())
    }

    async fn write_script(&self, id: &str, source: &str) -> Result<(), StoreError> {
        let path = self.script_dir(id)?.join(SCRIPT_FILE);
        fs::write(&path, source).await?;
        fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).await?;
        Ok(())
    }

    /// Pick a fresh short id that has no directory yet.
    async fn allocate_id(&self) -> Result<String, StoreError> {
        loop {
            let mut id = Uuid::new_v4().simple().to_string();
            id.truncate(ID_LEN);
            if !fs::try_exists(self.root.join(&id)).await? {
                return Ok(id);
            }
        }
    }
}

#[async_trait]
impl ScriptResolver for ScriptStore {
    async fn resolve(&self, script_id: &str) -> Result<PathBuf, CoreError> {
        Ok(self.executable_path(script_id).await?)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
