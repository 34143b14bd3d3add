//! Reconciliation of the durable store with the local fallback cache.
//!
//! Callers see one scenario list. Writes go to the durable store when it
//! answers and to the local cache when it does not. Durable errors never reach
//! the caller; the only terminal error is a record that neither store holds.
//!
//! Precedence: a durable record wins over a local record with the same id, and
//! durable records are listed before local ones.

use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

use super::{ScenarioBackend, ScenarioStore, StoreError};
use crate::models::{Scenario, ScenarioId, SimulationInput};

/// Which physical store served a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreTarget {
    Durable,
    Local,
}

#[derive(Debug, Clone)]
pub struct SaveOutcome {
    pub scenario: Scenario,
    pub target: StoreTarget,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoveOutcome {
    pub target: StoreTarget,
}

pub struct ScenarioReconciler {
    durable: ScenarioStore,
    local: ScenarioStore,
}

impl ScenarioReconciler {
    pub fn new(durable: Arc<dyn ScenarioBackend>, local: Arc<dyn ScenarioBackend>) -> Self {
        Self {
            durable: ScenarioStore::new(durable),
            local: ScenarioStore::new(local),
        }
    }

    /// Save to the durable store, or to the local cache if that fails.
    pub async fn save(&self, input: SimulationInput) -> Result<SaveOutcome, StoreError> {
        match self.durable.create(input.clone()).await {
            Ok(scenario) => Ok(SaveOutcome {
                scenario,
                target: StoreTarget::Durable,
            }),
            Err(e) => {
                warn!(error = %e, "durable save failed, saving locally");
                let scenario = self.local.create(input).await?;
                Ok(SaveOutcome {
                    scenario,
                    target: StoreTarget::Local,
                })
            }
        }
    }

    /// Durable records first, then local records whose id no durable record uses.
    pub async fn list(&self) -> Result<Vec<Scenario>, StoreError> {
        let durable = match self.durable.list().await {
            Ok(durable) => durable,
            Err(e) => {
                warn!(error = %e, "durable list failed, serving local cache only");
                return self.local.list().await;
            }
        };

        let local = match self.local.list().await {
            Ok(local) => local,
            Err(e) => {
                warn!(error = %e, "local cache unreadable, serving durable list only");
                Vec::new()
            }
        };

        Ok(merge(durable, local))
    }

    /// Durable lookup first, local cache second.
    pub async fn load(&self, id: &ScenarioId) -> Result<Scenario, StoreError> {
        match self.durable.get(id).await {
            Ok(scenario) => return Ok(scenario),
            Err(e) if e.is_not_found() => {}
            Err(e) => debug!(error = %e, id = %id, "durable lookup failed, trying local cache"),
        }
        self.local.get(id).await
    }

    /// Delete from the durable store; if it fails or holds no such record,
    /// delete from the local cache instead. At most one store is mutated.
    pub async fn remove(&self, id: &ScenarioId) -> Result<RemoveOutcome, StoreError> {
        match self.durable.delete(id).await {
            Ok(true) => {
                return Ok(RemoveOutcome {
                    target: StoreTarget::Durable,
                })
            }
            Ok(false) => {}
            Err(e) => warn!(error = %e, id = %id, "durable delete failed, trying local cache"),
        }

        if self.local.delete(id).await? {
            Ok(RemoveOutcome {
                target: StoreTarget::Local,
            })
        } else {
            Err(StoreError::NotFound(id.clone()))
        }
    }

    /// Copy a scenario into the local cache under a new local id.
    ///
    /// Duplicates are never written to the durable store, wherever the source lives.
    pub async fn duplicate(&self, id: &ScenarioId) -> Result<Scenario, StoreError> {
        let source = self.load(id).await?;
        let mut input = source.input;
        let base = input.label().unwrap_or("Copy").to_string();
        input.scenario_name = Some(format!("{base} (copy)"));

        self.local.create(input).await
    }
}

/// Durable-first merge; a local record survives only if its id is unused by
/// any durable record (compared by wire form).
pub fn merge(durable: Vec<Scenario>, local: Vec<Scenario>) -> Vec<Scenario> {
    let durable_ids: HashSet<String> = durable.iter().map(|s| s.id.to_string()).collect();
    let mut merged = durable;
    merged.extend(
        local
            .into_iter()
            .filter(|s| !durable_ids.contains(&s.id.to_string())),
    );
    merged
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ScenarioDraft;
    use crate::scenarios::{draft_for, LocalScenarioCache};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::Mutex;

    /// Durable-store double that can be taken offline.
    #[derive(Default)]
    struct FlakyDurable {
        entries: Mutex<Vec<Scenario>>,
        offline: AtomicBool,
    }

    impl FlakyDurable {
        fn set_offline(&self, offline: bool) {
            self.offline.store(offline, Ordering::SeqCst);
        }

        fn check(&self) -> Result<(), StoreError> {
            if self.offline.load(Ordering::SeqCst) {
                Err(StoreError::Unavailable("connection refused".into()))
            } else {
                Ok(())
            }
        }

        async fn len(&self) -> usize {
            self.entries.lock().await.len()
        }
    }

    #[async_trait]
    impl ScenarioBackend for FlakyDurable {
        async fn create(&self, draft: ScenarioDraft) -> Result<Scenario, StoreError> {
            self.check()?;
            let scenario = draft.into_scenario(ScenarioId::mint_durable());
            self.entries.lock().await.insert(0, scenario.clone());
            Ok(scenario)
        }

        async fn list(&self) -> Result<Vec<Scenario>, StoreError> {
            self.check()?;
            Ok(self.entries.lock().await.clone())
        }

        async fn get(&self, id: &ScenarioId) -> Result<Scenario, StoreError> {
            self.check()?;
            self.entries
                .lock()
                .await
                .iter()
                .find(|s| &s.id == id)
                .cloned()
                .ok_or_else(|| StoreError::NotFound(id.clone()))
        }

        async fn delete(&self, id: &ScenarioId) -> Result<bool, StoreError> {
            self.check()?;
            let mut entries = self.entries.lock().await;
            let before = entries.len();
            entries.retain(|s| &s.id != id);
            Ok(entries.len() != before)
        }
    }

    fn setup() -> (Arc<FlakyDurable>, Arc<LocalScenarioCache>, ScenarioReconciler) {
        let durable = Arc::new(FlakyDurable::default());
        let local = Arc::new(LocalScenarioCache::in_memory());
        let reconciler = ScenarioReconciler::new(durable.clone(), local.clone());
        (durable, local, reconciler)
    }

    fn named(name: &str) -> SimulationInput {
        SimulationInput {
            scenario_name: Some(name.to_string()),
            ..SimulationInput::starter()
        }
    }

    fn names(list: &[Scenario]) -> Vec<String> {
        list.iter().map(Scenario::label).collect()
    }

    #[tokio::test]
    async fn test_save_prefers_durable() {
        let (durable, local, reconciler) = setup();

        let saved = reconciler.save(named("a")).await.unwrap();
        assert_eq!(saved.target, StoreTarget::Durable);
        assert!(!saved.scenario.id.is_local());
        assert_eq!(durable.len().await, 1);
        assert!(local.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_falls_back_when_durable_offline() {
        let (durable, _local, reconciler) = setup();
        durable.set_offline(true);

        let saved = reconciler.save(named("offline")).await.unwrap();
        assert_eq!(saved.target, StoreTarget::Local);
        assert!(saved.scenario.id.is_local());

        let listed = reconciler.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, saved.scenario.id);
    }

    #[tokio::test]
    async fn test_list_puts_durable_first_and_is_stable() {
        let (durable, _local, reconciler) = setup();
        durable.set_offline(true);
        reconciler.save(named("local-1")).await.unwrap();
        durable.set_offline(false);
        reconciler.save(named("durable-1")).await.unwrap();
        reconciler.save(named("durable-2")).await.unwrap();

        let first = reconciler.list().await.unwrap();
        assert_eq!(names(&first), vec!["durable-2", "durable-1", "local-1"]);

        let second = reconciler.list().await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_merge_drops_local_records_shadowed_by_durable() {
        let make = |id: ScenarioId, name: &str| draft_for(named(name)).into_scenario(id);
        let shared = ScenarioId::Durable("shared".into());

        let durable = vec![make(shared.clone(), "server copy")];
        let local = vec![
            make(shared.clone(), "stale local copy"),
            make(ScenarioId::Local("only-local".into()), "offline"),
        ];

        let merged = merge(durable, local);
        assert_eq!(names(&merged), vec!["server copy", "offline"]);
    }

    #[tokio::test]
    async fn test_list_serves_local_when_durable_fails() {
        let (durable, local, reconciler) = setup();
        reconciler.save(named("server")).await.unwrap();
        local.create(draft_for(named("cached"))).await.unwrap();
        durable.set_offline(true);

        assert_eq!(names(&reconciler.list().await.unwrap()), vec!["cached"]);
    }

    #[tokio::test]
    async fn test_load_falls_back_to_local() {
        let (durable, _local, reconciler) = setup();
        let server = reconciler.save(named("server")).await.unwrap().scenario;
        durable.set_offline(true);
        let offline = reconciler.save(named("offline")).await.unwrap().scenario;

        // Durable unreachable: its records are gone from view, local ones load.
        assert!(reconciler.load(&server.id).await.unwrap_err().is_not_found());
        assert_eq!(reconciler.load(&offline.id).await.unwrap(), offline);

        // Durable back: both load, local via NotFound fallthrough.
        durable.set_offline(false);
        assert_eq!(reconciler.load(&server.id).await.unwrap(), server);
        assert_eq!(reconciler.load(&offline.id).await.unwrap(), offline);

        let missing = ScenarioId::mint_local();
        assert!(reconciler.load(&missing).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_remove_touches_exactly_one_store() {
        let (durable, local, reconciler) = setup();
        let server = reconciler.save(named("server")).await.unwrap().scenario;
        durable.set_offline(true);
        let offline = reconciler.save(named("offline")).await.unwrap().scenario;
        durable.set_offline(false);

        let removed = reconciler.remove(&server.id).await.unwrap();
        assert_eq!(removed.target, StoreTarget::Durable);
        assert_eq!(durable.len().await, 0);
        assert_eq!(local.list().await.unwrap().len(), 1);

        let removed = reconciler.remove(&offline.id).await.unwrap();
        assert_eq!(removed.target, StoreTarget::Local);
        assert!(local.list().await.unwrap().is_empty());

        for id in [&server.id, &offline.id] {
            assert!(reconciler.load(id).await.unwrap_err().is_not_found());
            assert!(reconciler.remove(id).await.unwrap_err().is_not_found());
        }
    }

    #[tokio::test]
    async fn test_remove_local_while_durable_offline() {
        let (durable, local, reconciler) = setup();
        durable.set_offline(true);
        let offline = reconciler.save(named("offline")).await.unwrap().scenario;

        let removed = reconciler.remove(&offline.id).await.unwrap();
        assert_eq!(removed.target, StoreTarget::Local);
        assert!(local.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_is_local_only() {
        let (durable, local, reconciler) = setup();
        let server = reconciler.save(named("Q3 plan")).await.unwrap().scenario;

        let copy = reconciler.duplicate(&server.id).await.unwrap();
        assert!(copy.id.is_local());
        assert_ne!(copy.id, server.id);
        assert_eq!(copy.input.scenario_name.as_deref(), Some("Q3 plan (copy)"));
        assert_eq!(copy.result.monthly_savings, server.result.monthly_savings);

        assert_eq!(durable.len().await, 1);
        assert_eq!(local.list().await.unwrap(), vec![copy]);
    }

    #[tokio::test]
    async fn test_duplicate_unnamed_and_missing() {
        let (_durable, _local, reconciler) = setup();
        let unnamed = reconciler
            .save(SimulationInput::starter())
            .await
            .unwrap()
            .scenario;

        let copy = reconciler.duplicate(&unnamed.id).await.unwrap();
        assert_eq!(copy.input.scenario_name.as_deref(), Some("Copy (copy)"));

        let missing = ScenarioId::mint_durable();
        assert!(reconciler.duplicate(&missing).await.unwrap_err().is_not_found());
    }
}
