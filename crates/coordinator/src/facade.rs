//! Registry operations exposed to the rest of the gateway
//!
//! The facade is the only writer of the registry. Administrative calls go to
//! the durable store first and touch memory only when the store reports a
//! change, so a failed write never leaves a node routable that storage does
//! not know about.

use crate::probe::LivenessProbe;
use crate::record::{self, CoordinatorRecord};
use crate::registry::{CoordinatorRegistry, Removal};
use crate::selector::RotationSelector;
use crate::store::CoordinatorStore;
use qgate_common::error::{GatewayError, Result};
use qgate_common::METRICS;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Coordinator registry, selector, probe and store composed together
pub struct RegistryFacade {
    registry: CoordinatorRegistry,
    selector: RotationSelector,
    probe: Arc<dyn LivenessProbe>,
    store: Arc<dyn CoordinatorStore>,
}

impl RegistryFacade {
    /// Create a facade with an empty registry
    ///
    /// Call [`reload`](Self::reload) to load the active coordinators.
    pub fn new(probe: Arc<dyn LivenessProbe>, store: Arc<dyn CoordinatorStore>) -> Self {
        Self {
            registry: CoordinatorRegistry::new(),
            selector: RotationSelector::new(),
            probe,
            store,
        }
    }

    /// Replace the registry with the store's active coordinators
    ///
    /// Returns the number of coordinators installed. On a store error the
    /// registry is left as it was.
    pub async fn reload(&self) -> Result<usize> {
        let records = self
            .store
            .list_active_coordinators()
            .await
            .inspect_err(|e| METRICS.coordinator.record_admin_failure(e.kind()))?;

        let count = self.registry.replace_all(records);
        METRICS.coordinator.coordinators.set(count as i64);
        info!(count, "Reloaded coordinators");
        Ok(count)
    }

    /// Admit a coordinator after it passes the liveness probe
    ///
    /// Returns the registry contents after the add. A key that is already
    /// stored fails with `PersistenceNoop`, including rows the health monitor
    /// flagged inactive: remove the row or reactivate it with
    /// `SqliteCoordinatorStore::set_active` before adding it again.
    pub async fn add(&self, host: &str, port: u16) -> Result<Arc<Vec<CoordinatorRecord>>> {
        self.try_add(host, port)
            .await
            .inspect_err(|e| METRICS.coordinator.record_admin_failure(e.kind()))
    }

    async fn try_add(&self, host: &str, port: u16) -> Result<Arc<Vec<CoordinatorRecord>>> {
        record::validate(host, port)?;

        if !self.probe_detached(host, port).await {
            warn!(host, port, "Refusing to add inactive coordinator");
            return Err(GatewayError::InactiveCoordinator {
                host: host.to_string(),
                port,
            });
        }

        let coordinator = CoordinatorRecord::new(host, port, true)?;
        let count = self.store.insert_coordinator(&coordinator).await?;
        if count == 0 {
            return Err(GatewayError::PersistenceNoop {
                host: host.to_string(),
                port,
            });
        }

        match self.registry.upsert(coordinator) {
            Ok(()) => info!(host, port, "Added coordinator"),
            // Already routable; memory and store agree.
            Err(GatewayError::DuplicateCoordinator { .. }) => {
                debug!(host, port, "Coordinator already registered in memory")
            }
            Err(e) => return Err(e),
        }

        METRICS.coordinator.coordinators.set(self.registry.size() as i64);
        Ok(self.registry.snapshot())
    }

    /// Delete a coordinator from storage and from the registry
    ///
    /// This removes the stored record, not just the in-memory entry.
    pub async fn remove(&self, host: &str, port: u16) -> Result<()> {
        self.try_remove(host, port)
            .await
            .inspect_err(|e| METRICS.coordinator.record_admin_failure(e.kind()))
    }

    pub async fn remove_record(&self, coordinator: &CoordinatorRecord) -> Result<()> {
        self.remove(&coordinator.host, coordinator.port).await
    }

    async fn try_remove(&self, host: &str, port: u16) -> Result<()> {
        let count = self.store.delete_coordinator(host, port).await?;
        if count == 0 {
            return Err(GatewayError::RemovalFailed {
                host: host.to_string(),
                port,
            });
        }

        match self.registry.remove_entry(host, port) {
            Removal::Removed => {}
            // Stored but inactive coordinators are never loaded into memory.
            Removal::Absent => {
                debug!(host, port, "Removed coordinator was not registered in memory")
            }
            Removal::StillPresent => {
                let msg = format!("{}:{} deleted from storage but still registered", host, port);
                error!(host, port, "Coordinator registry diverged from storage");
                return Err(GatewayError::inconsistency(msg));
            }
        }

        METRICS.coordinator.coordinators.set(self.registry.size() as i64);
        info!(host, port, "Removed coordinator");
        Ok(())
    }

    /// Base URL of the next coordinator, e.g. `http://host:8080`
    pub fn select(&self) -> Result<String> {
        self.select_record().map(|c| c.url())
    }

    /// Next coordinator in the rotation
    pub fn select_record(&self) -> Result<CoordinatorRecord> {
        self.selector.select(&self.registry)
    }

    /// Liveness check, shared with the external health monitor
    pub async fn is_active(&self, host: &str, port: u16) -> bool {
        self.probe.is_active(host, port).await
    }

    /// Current coordinators in selection order
    pub fn coordinators(&self) -> Arc<Vec<CoordinatorRecord>> {
        self.registry.snapshot()
    }

    pub fn registry(&self) -> &CoordinatorRegistry {
        &self.registry
    }

    /// Probe on its own task so cancelling the caller does not cut it short
    async fn probe_detached(&self, host: &str, port: u16) -> bool {
        let probe = Arc::clone(&self.probe);
        let host_owned = host.to_string();
        let handle = tokio::spawn(async move { probe.is_active(&host_owned, port).await });

        match handle.await {
            Ok(active) => active,
            Err(e) => {
                warn!(host, port, error = %e, "Liveness probe task failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryCoordinatorStore;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Probe answering from a fixed set of live ports
    struct ScriptedProbe {
        live_ports: HashSet<u16>,
        calls: AtomicUsize,
    }

    impl ScriptedProbe {
        fn live(ports: &[u16]) -> Arc<Self> {
            Arc::new(Self {
                live_ports: ports.iter().copied().collect(),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl LivenessProbe for ScriptedProbe {
        async fn is_active(&self, _host: &str, port: u16) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.live_ports.contains(&port)
        }
    }

    /// Store whose writes always affect zero rows
    struct NoopStore;

    #[async_trait]
    impl CoordinatorStore for NoopStore {
        async fn list_active_coordinators(&self) -> Result<Vec<CoordinatorRecord>> {
            Ok(Vec::new())
        }

        async fn insert_coordinator(&self, _record: &CoordinatorRecord) -> Result<usize> {
            Ok(0)
        }

        async fn delete_coordinator(&self, _host: &str, _port: u16) -> Result<usize> {
            Ok(0)
        }
    }

    /// Store that fails every call
    struct BrokenStore;

    #[async_trait]
    impl CoordinatorStore for BrokenStore {
        async fn list_active_coordinators(&self) -> Result<Vec<CoordinatorRecord>> {
            Err(GatewayError::storage("database is locked"))
        }

        async fn insert_coordinator(&self, _record: &CoordinatorRecord) -> Result<usize> {
            Err(GatewayError::storage("database is locked"))
        }

        async fn delete_coordinator(&self, _host: &str, _port: u16) -> Result<usize> {
            Err(GatewayError::storage("database is locked"))
        }
    }

    fn record(host: &str, port: u16) -> CoordinatorRecord {
        CoordinatorRecord::new(host, port, true).unwrap()
    }

    fn abc_store() -> Arc<InMemoryCoordinatorStore> {
        Arc::new(InMemoryCoordinatorStore::with_records(vec![
            record("a", 1),
            record("b", 2),
            record("c", 3),
        ]))
    }

    #[tokio::test]
    async fn test_reload_then_round_robin() {
        let facade = RegistryFacade::new(ScriptedProbe::live(&[]), abc_store());
        assert_eq!(facade.reload().await.unwrap(), 3);

        let urls: Vec<String> = (0..4).map(|_| facade.select().unwrap()).collect();
        assert_eq!(
            urls,
            vec!["http://a:1", "http://b:2", "http://c:3", "http://a:1"]
        );
    }

    #[tokio::test]
    async fn test_reload_replaces_contents() {
        let store = abc_store();
        let facade = RegistryFacade::new(ScriptedProbe::live(&[9]), store.clone());
        facade.add("z", 9).await.unwrap();
        facade.reload().await.unwrap();

        store.delete_coordinator("b", 2).await.unwrap();
        facade.reload().await.unwrap();

        let keys: HashSet<String> = (0..6).map(|_| facade.select().unwrap()).collect();
        let expected: HashSet<String> = ["http://a:1", "http://c:3", "http://z:9"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(keys, expected);
    }

    #[tokio::test]
    async fn test_reload_failure_keeps_registry() {
        let facade = RegistryFacade::new(ScriptedProbe::live(&[]), Arc::new(BrokenStore));
        facade.registry().replace_all(vec![record("a", 1)]);

        assert!(matches!(facade.reload().await, Err(GatewayError::Storage(_))));
        assert_eq!(facade.coordinators().len(), 1);
    }

    #[tokio::test]
    async fn test_select_empty_registry() {
        let store = Arc::new(InMemoryCoordinatorStore::new());
        let facade = RegistryFacade::new(ScriptedProbe::live(&[]), store);
        facade.reload().await.unwrap();

        assert!(matches!(facade.select(), Err(GatewayError::NoActiveCoordinator)));
    }

    #[tokio::test]
    async fn test_add_inactive_coordinator_is_rejected() {
        let store = Arc::new(InMemoryCoordinatorStore::new());
        let probe = ScriptedProbe::live(&[]);
        let facade = RegistryFacade::new(probe.clone(), store.clone());

        let result = facade.add("x", 9).await;

        assert!(matches!(
            result,
            Err(GatewayError::InactiveCoordinator { ref host, port: 9 }) if host == "x"
        ));
        assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
        assert!(store.is_empty());
        assert!(facade.coordinators().is_empty());
    }

    #[tokio::test]
    async fn test_add_persists_and_registers() {
        let store = Arc::new(InMemoryCoordinatorStore::new());
        let facade = RegistryFacade::new(ScriptedProbe::live(&[8080]), store.clone());

        let snapshot = facade.add("presto-1", 8080).await.unwrap();

        assert_eq!(snapshot.len(), 1);
        assert!(snapshot[0].active);
        assert!(store.contains("presto-1", 8080));
        assert!(facade.registry().contains("presto-1", 8080));
        assert_eq!(facade.select().unwrap(), "http://presto-1:8080");
    }

    #[tokio::test]
    async fn test_add_persistence_noop_is_surfaced() {
        let facade = RegistryFacade::new(ScriptedProbe::live(&[1]), Arc::new(NoopStore));

        let result = facade.add("a", 1).await;

        assert!(matches!(result, Err(GatewayError::PersistenceNoop { port: 1, .. })));
        assert!(facade.coordinators().is_empty());
    }

    #[tokio::test]
    async fn test_add_existing_key_is_persistence_noop() {
        let store = Arc::new(InMemoryCoordinatorStore::new());
        let facade = RegistryFacade::new(ScriptedProbe::live(&[1]), store);

        facade.add("a", 1).await.unwrap();
        let result = facade.add("a", 1).await;

        assert!(matches!(result, Err(GatewayError::PersistenceNoop { .. })));
        assert_eq!(facade.coordinators().len(), 1);
    }

    #[tokio::test]
    async fn test_add_invalid_address_skips_probe() {
        let probe = ScriptedProbe::live(&[1]);
        let facade = RegistryFacade::new(probe.clone(), Arc::new(InMemoryCoordinatorStore::new()));

        assert!(matches!(
            facade.add("", 1).await,
            Err(GatewayError::InvalidCoordinator(_))
        ));
        assert!(matches!(
            facade.add("a", 0).await,
            Err(GatewayError::InvalidCoordinator(_))
        ));
        assert_eq!(probe.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_remove_deletes_from_both() {
        let store = abc_store();
        let facade = RegistryFacade::new(ScriptedProbe::live(&[]), store.clone());
        facade.reload().await.unwrap();

        facade.remove("b", 2).await.unwrap();

        assert!(!store.contains("b", 2));
        assert!(!facade.registry().contains("b", 2));
        assert_eq!(facade.coordinators().len(), 2);
    }

    #[tokio::test]
    async fn test_remove_unknown_to_storage_keeps_registry() {
        let facade = RegistryFacade::new(ScriptedProbe::live(&[]), Arc::new(NoopStore));
        facade
            .registry()
            .replace_all(vec![record("a", 1), record("b", 2), record("c", 3)]);

        let result = facade.remove("b", 2).await;

        assert!(matches!(result, Err(GatewayError::RemovalFailed { port: 2, .. })));
        assert!(facade.registry().contains("b", 2));
    }

    #[tokio::test]
    async fn test_remove_stored_inactive_coordinator() {
        let store = Arc::new(InMemoryCoordinatorStore::with_records(vec![
            record("a", 1),
            CoordinatorRecord::new("b", 2, false).unwrap(),
        ]));
        let facade = RegistryFacade::new(ScriptedProbe::live(&[]), store.clone());
        facade.reload().await.unwrap();

        facade.remove_record(&record("b", 2)).await.unwrap();

        assert!(!store.contains("b", 2));
        assert_eq!(facade.coordinators().len(), 1);
    }

    #[tokio::test]
    async fn test_remove_with_key_left_in_memory_is_inconsistency() {
        let store = abc_store();
        let facade = RegistryFacade::new(ScriptedProbe::live(&[]), store.clone());
        facade
            .registry()
            .install_unchecked(vec![record("b", 2), record("a", 1), record("b", 2)]);

        let result = facade.remove("b", 2).await;

        assert!(matches!(result, Err(GatewayError::InternalInconsistency(_))));
        assert!(!store.contains("b", 2));
        assert!(facade.registry().contains("b", 2));
    }

    #[tokio::test]
    async fn test_add_stored_inactive_coordinator_is_persistence_noop() {
        let store = Arc::new(InMemoryCoordinatorStore::with_records(vec![
            CoordinatorRecord::new("b", 2, false).unwrap(),
        ]));
        let facade = RegistryFacade::new(ScriptedProbe::live(&[2]), store);
        facade.reload().await.unwrap();

        let result = facade.add("b", 2).await;

        assert!(matches!(result, Err(GatewayError::PersistenceNoop { port: 2, .. })));
        assert!(facade.coordinators().is_empty());
    }

    #[tokio::test]
    async fn test_store_error_propagates_from_add() {
        let facade = RegistryFacade::new(ScriptedProbe::live(&[1]), Arc::new(BrokenStore));

        assert!(matches!(facade.add("a", 1).await, Err(GatewayError::Storage(_))));
        assert!(facade.coordinators().is_empty());
    }

    #[tokio::test]
    async fn test_is_active_delegates_to_probe() {
        let facade = RegistryFacade::new(ScriptedProbe::live(&[7]), Arc::new(NoopStore));

        assert!(facade.is_active("a", 7).await);
        assert!(!facade.is_active("a", 8).await);
    }
}
