//! Append-only audit store.
//!
//! The production document store is an external collaborator; this
//! in-memory implementation keeps the engine self-contained while matching
//! its contract: unordered bulk inserts where a duplicate key drops only
//! the colliding record, plus one Scenario record per run.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use relief_core::{GeneratedEvent, Scenario, ScenarioId, ScenarioStatus};

/// Unique key of one audit record.
type EventKey = (String, u64, String);

#[derive(Default)]
struct StoreInner {
    scenarios: HashMap<ScenarioId, Scenario>,
    /// Insertion-ordered per scenario; newest records at the back.
    events: HashMap<ScenarioId, Vec<GeneratedEvent>>,
    keys: HashSet<EventKey>,
}

#[derive(Default)]
pub struct AuditStore {
    inner: Mutex<StoreInner>,
}

impl AuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_scenario(&self, scenario: Scenario) {
        self.inner
            .lock()
            .scenarios
            .insert(scenario.id.clone(), scenario);
    }

    pub fn scenario(&self, id: &ScenarioId) -> Option<Scenario> {
        self.inner.lock().scenarios.get(id).cloned()
    }

    pub fn list_scenarios(&self) -> Vec<Scenario> {
        let mut all: Vec<Scenario> = self.inner.lock().scenarios.values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    /// Mark a scenario stopped. Idempotent; unknown ids are ignored.
    pub fn set_stopped(&self, id: &ScenarioId, at: DateTime<Utc>) {
        if let Some(scenario) = self.inner.lock().scenarios.get_mut(id) {
            if scenario.status != ScenarioStatus::Stopped {
                scenario.status = ScenarioStatus::Stopped;
                scenario.stopped_at = Some(at);
            }
        }
    }

    /// Record one completed tick: counter moves by exactly the number of
    /// records actually persisted.
    pub fn record_tick(&self, id: &ScenarioId, persisted: usize, tick_index: u64) {
        if let Some(scenario) = self.inner.lock().scenarios.get_mut(id) {
            scenario.stats.events_sent += persisted as u64;
            scenario.stats.ticks = tick_index + 1;
        }
    }

    /// Unordered bulk insert. Records whose (scenario, tick, identity) key
    /// already exists are dropped; siblings persist. Returns the number
    /// actually inserted.
    pub fn insert_events(&self, events: &[GeneratedEvent]) -> usize {
        let mut inner = self.inner.lock();
        let mut inserted = 0;
        for event in events {
            let key = (
                event.scenario_id.0.clone(),
                event.tick_index,
                event.identity.0.clone(),
            );
            if !inner.keys.insert(key) {
                tracing::warn!(
                    scenario = %event.scenario_id,
                    identity = %event.identity,
                    "dropping duplicate audit record"
                );
                continue;
            }
            inner
                .events
                .entry(event.scenario_id.clone())
                .or_default()
                .push(event.clone());
            inserted += 1;
        }
        inserted
    }

    /// Most recent records first, at most `limit`.
    pub fn recent_events(&self, id: &ScenarioId, limit: usize) -> Vec<GeneratedEvent> {
        let inner = self.inner.lock();
        let Some(events) = inner.events.get(id) else {
            return Vec::new();
        };
        events.iter().rev().take(limit).cloned().collect()
    }

    pub fn event_count(&self, id: &ScenarioId) -> usize {
        self.inner.lock().events.get(id).map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relief_core::{EventId, EventKind};

    fn scn() -> ScenarioId {
        ScenarioId("scn_store".to_string())
    }

    fn event(tick: u64, identity: &str) -> GeneratedEvent {
        GeneratedEvent {
            scenario_id: scn(),
            identity: EventId(identity.to_string()),
            kind: EventKind::Request,
            payload: serde_json::json!({"n": identity}),
            tick_index: tick,
            sim_time: Utc::now(),
        }
    }

    #[test]
    fn duplicate_key_drops_only_the_colliding_record() {
        let store = AuditStore::new();
        assert_eq!(store.insert_events(&[event(0, "a"), event(0, "b")]), 2);
        // "a" collides; "c" still persists.
        assert_eq!(store.insert_events(&[event(0, "a"), event(0, "c")]), 1);
        assert_eq!(store.event_count(&scn()), 3);
    }

    #[test]
    fn same_identity_at_different_tick_is_distinct() {
        let store = AuditStore::new();
        assert_eq!(store.insert_events(&[event(0, "a"), event(1, "a")]), 2);
    }

    #[test]
    fn recent_events_is_newest_first_and_bounded() {
        let store = AuditStore::new();
        let events: Vec<GeneratedEvent> =
            (0..10).map(|i| event(i, &format!("evt_{i}"))).collect();
        store.insert_events(&events);
        let recent = store.recent_events(&scn(), 3);
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].tick_index, 9);
        assert_eq!(recent[2].tick_index, 7);
    }
}
