//! Client-side fallback cache.
//!
//! Holds scenarios saved while the durable store is unreachable. Backed by a
//! JSON file (one array, newest first) or kept purely in memory. A single
//! client owns the file; concurrent writers are not coordinated.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

use super::{sort_newest_first, ScenarioBackend, StoreError};
use crate::models::{Scenario, ScenarioDraft, ScenarioId};

pub struct LocalScenarioCache {
    path: Option<PathBuf>,
    entries: Mutex<Vec<Scenario>>,
}

impl LocalScenarioCache {
    pub fn in_memory() -> Self {
        Self {
            path: None,
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Load the cache file at `path`. A missing file is an empty cache.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let entries = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Vec::new(),
            Ok(bytes) => serde_json::from_slice::<Vec<Scenario>>(&bytes).map_err(|e| {
                StoreError::Backend(format!("corrupt cache {}: {e}", path.display()))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                return Err(StoreError::Backend(format!(
                    "read cache {}: {e}",
                    path.display()
                )))
            }
        };
        debug!(path = %path.display(), entries = entries.len(), "local scenario cache loaded");

        Ok(Self {
            path: Some(path),
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Write the whole cache through a temp file so a crash never leaves half a file.
    async fn persist(&self, entries: &[Scenario]) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let bytes = serde_json::to_vec_pretty(entries)
            .map_err(|e| StoreError::Backend(format!("encode cache: {e}")))?;

        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| StoreError::Backend(format!("write cache {}: {e}", tmp.display())))?;
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|e| StoreError::Backend(format!("replace cache {}: {e}", path.display())))
    }
}

#[async_trait]
impl ScenarioBackend for LocalScenarioCache {
    async fn create(&self, draft: ScenarioDraft) -> Result<Scenario, StoreError> {
        // JSON has no NaN or infinity; such a record could never be read back.
        if !draft.input.is_finite() || !draft.result.is_finite() {
            return Err(StoreError::Validation(
                "scenario contains non-finite numbers".to_string(),
            ));
        }
        let scenario = draft.into_scenario(ScenarioId::mint_local());
        let mut entries = self.entries.lock().await;
        entries.insert(0, scenario.clone());
        if let Err(e) = self.persist(&entries).await {
            entries.remove(0);
            return Err(e);
        }
        Ok(scenario)
    }

    async fn list(&self) -> Result<Vec<Scenario>, StoreError> {
        let mut entries = self.entries.lock().await.clone();
        sort_newest_first(&mut entries);
        Ok(entries)
    }

    async fn get(&self, id: &ScenarioId) -> Result<Scenario, StoreError> {
        self.entries
            .lock()
            .await
            .iter()
            .find(|s| &s.id == id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    async fn delete(&self, id: &ScenarioId) -> Result<bool, StoreError> {
        let mut entries = self.entries.lock().await;
        let Some(pos) = entries.iter().position(|s| &s.id == id) else {
            return Ok(false);
        };
        let removed = entries.remove(pos);
        if let Err(e) = self.persist(&entries).await {
            entries.insert(pos, removed);
            return Err(e);
        }
        Ok(true)
    }
}
