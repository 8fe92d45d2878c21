//! Owned table of currently running scenario runtimes.
//!
//! Ownership of a runtime passes create → scheduler loop → removal on stop;
//! the registry only holds the control handle (name + stop signal).

use std::collections::HashMap;

use parking_lot::Mutex;
use relief_core::ScenarioId;
use tokio::sync::watch;

pub struct ScenarioHandle {
    pub id: ScenarioId,
    pub name: String,
    stop_tx: watch::Sender<bool>,
}

impl ScenarioHandle {
    pub fn signal_stop(&self) {
        // Receiver may already be gone if the loop terminated on its own.
        let _ = self.stop_tx.send(true);
    }
}

#[derive(Default)]
pub struct ScenarioRegistry {
    inner: Mutex<HashMap<ScenarioId, ScenarioHandle>>,
}

impl ScenarioRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new running scenario, rejecting duplicate names under the
    /// same lock that publishes the handle.
    ///
    /// Returns the stop receiver for the scenario's tick loop, or `None`
    /// when a scenario with this name is already running.
    pub fn register(&self, id: ScenarioId, name: &str) -> Option<watch::Receiver<bool>> {
        let mut inner = self.inner.lock();
        if inner.values().any(|h| h.name == name) {
            return None;
        }
        let (stop_tx, stop_rx) = watch::channel(false);
        inner.insert(
            id.clone(),
            ScenarioHandle {
                id,
                name: name.to_string(),
                stop_tx,
            },
        );
        Some(stop_rx)
    }

    /// Detach a scenario, returning its handle so the caller can signal the
    /// loop. Used both by explicit stop and by loops deregistering
    /// themselves on natural termination.
    pub fn remove(&self, id: &ScenarioId) -> Option<ScenarioHandle> {
        self.inner.lock().remove(id)
    }

    pub fn is_running(&self, id: &ScenarioId) -> bool {
        self.inner.lock().contains_key(id)
    }

    /// Drain every handle, signalling each loop to stop. Used at daemon
    /// shutdown.
    pub fn drain(&self) -> Vec<ScenarioHandle> {
        let handles: Vec<ScenarioHandle> =
            self.inner.lock().drain().map(|(_, h)| h).collect();
        for handle in &handles {
            handle.signal_stop();
        }
        handles
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> ScenarioId {
        ScenarioId(s.to_string())
    }

    #[test]
    fn duplicate_running_name_is_rejected() {
        let registry = ScenarioRegistry::new();
        assert!(registry.register(id("scn_1"), "nightly").is_some());
        assert!(registry.register(id("scn_2"), "nightly").is_none());
        assert!(registry.is_running(&id("scn_1")));
        assert!(!registry.is_running(&id("scn_2")));
    }

    #[test]
    fn name_is_reusable_after_removal() {
        let registry = ScenarioRegistry::new();
        registry.register(id("scn_1"), "nightly").unwrap();
        registry.remove(&id("scn_1")).unwrap();
        assert!(registry.register(id("scn_2"), "nightly").is_some());
    }

    #[test]
    fn stop_signal_reaches_the_receiver() {
        let registry = ScenarioRegistry::new();
        let rx = registry.register(id("scn_1"), "nightly").unwrap();
        let handle = registry.remove(&id("scn_1")).unwrap();
        handle.signal_stop();
        assert!(*rx.borrow());
        assert!(!registry.is_running(&id("scn_1")));
    }
}
