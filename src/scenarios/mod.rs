//! Scenario persistence.
//!
//! Every physical store (durable SQLite, remote HTTP API, local fallback cache)
//! implements [`ScenarioBackend`]. [`ScenarioStore`] wraps a backend and runs
//! the simulation before anything is written, and [`reconcile::ScenarioReconciler`]
//! merges a durable store with a local fallback.

pub mod local;
pub mod reconcile;
pub mod remote;
pub mod sqlite;

use async_trait::async_trait;
use chrono::{SubsecRound, Utc};
use std::sync::Arc;
use thiserror::Error;

use crate::models::{Scenario, ScenarioDraft, ScenarioId, SimulationInput};
use crate::simulation::simulate;

pub use local::LocalScenarioCache;
pub use reconcile::{RemoveOutcome, SaveOutcome, ScenarioReconciler, StoreTarget};
pub use remote::HttpScenarioBackend;
pub use sqlite::SqliteScenarioBackend;

/// Message reported when no durable backend is configured.
pub const DB_NOT_CONFIGURED: &str = "DB not configured";

/// Errors raised by scenario backends.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Durable backend missing or unreachable. Recoverable by falling back.
    #[error("{0}")]
    Unavailable(String),

    #[error("scenario not found: {0}")]
    NotFound(ScenarioId),

    /// Request rejected before reaching any store.
    #[error("invalid input: {0}")]
    Validation(String),

    /// The store answered but the operation failed.
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn not_configured() -> Self {
        StoreError::Unavailable(DB_NOT_CONFIGURED.to_string())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

/// Minimal create/list/get/delete contract shared by all stores.
///
/// Records are write-once: there is no update.
#[async_trait]
pub trait ScenarioBackend: Send + Sync {
    /// Persist a draft and return it with the identifier this store assigned.
    async fn create(&self, draft: ScenarioDraft) -> Result<Scenario, StoreError>;

    /// All scenarios, newest first.
    async fn list(&self) -> Result<Vec<Scenario>, StoreError>;

    async fn get(&self, id: &ScenarioId) -> Result<Scenario, StoreError>;

    /// Returns whether a record with this id existed.
    async fn delete(&self, id: &ScenarioId) -> Result<bool, StoreError>;
}

/// Scenario CRUD on top of a backend, computing results on create.
#[derive(Clone)]
pub struct ScenarioStore {
    backend: Arc<dyn ScenarioBackend>,
}

impl ScenarioStore {
    pub fn new(backend: Arc<dyn ScenarioBackend>) -> Self {
        Self { backend }
    }

    /// Simulate `input` and persist input plus result as one record.
    pub async fn create(&self, input: SimulationInput) -> Result<Scenario, StoreError> {
        self.backend.create(draft_for(input)).await
    }

    pub async fn list(&self) -> Result<Vec<Scenario>, StoreError> {
        self.backend.list().await
    }

    pub async fn get(&self, id: &ScenarioId) -> Result<Scenario, StoreError> {
        self.backend.get(id).await
    }

    pub async fn delete(&self, id: &ScenarioId) -> Result<bool, StoreError> {
        self.backend.delete(id).await
    }
}

/// Build an unsaved record stamped with the current time.
///
/// Timestamps are truncated to microseconds so they survive storage unchanged.
pub fn draft_for(input: SimulationInput) -> ScenarioDraft {
    let input = input.sanitized();
    ScenarioDraft {
        result: simulate(&input),
        input,
        created_at: Utc::now().trunc_subsecs(6),
    }
}

/// Newest first; ties keep their existing order.
pub(crate) fn sort_newest_first(scenarios: &mut [Scenario]) {
    scenarios.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_then_get_matches_simulation() {
        let store = ScenarioStore::new(Arc::new(LocalScenarioCache::in_memory()));
        let input = SimulationInput {
            scenario_name: Some("Baseline".into()),
            ..SimulationInput::starter()
        };

        let created = store.create(input.clone()).await.unwrap();
        let fetched = store.get(&created.id).await.unwrap();

        assert_eq!(fetched.result, simulate(&input));
        assert_eq!(fetched.input, input);
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn test_delete_reports_prior_existence() {
        let store = ScenarioStore::new(Arc::new(LocalScenarioCache::in_memory()));
        let created = store.create(SimulationInput::starter()).await.unwrap();

        assert!(store.delete(&created.id).await.unwrap());
        assert!(!store.delete(&created.id).await.unwrap());
        assert!(store.get(&created.id).await.unwrap_err().is_not_found());
    }

    #[test]
    fn test_not_configured_message() {
        assert_eq!(StoreError::not_configured().to_string(), "DB not configured");
    }
}
