//! Per-scenario tick loop.
//!
//! One tokio task per running scenario. Each tick runs strictly in order:
//! simulated timestamp → ledger maturation → fresh generation → bulk
//! persist → counter update → dispatch → advance/reschedule. Dispatch is on
//! the critical path, so downstream latency throttles the simulation rate.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use relief_core::{EventFactory, GeneratedEvent, LifecycleLedger, Scenario, ScenarioId};
use tokio::sync::watch;
use tokio::time::Instant;

use crate::dispatch::Dispatcher;
use crate::registry::ScenarioRegistry;
use crate::store::AuditStore;

pub struct ScenarioRuntime {
    pub scenario: Scenario,
    pub factory: EventFactory,
    pub ledger: LifecycleLedger,
    pub store: Arc<AuditStore>,
    pub dispatcher: Arc<Dispatcher>,
    pub registry: Arc<ScenarioRegistry>,
    pub stop_rx: watch::Receiver<bool>,
}

/// Launch the loop under a small supervisor so that even a panic inside a
/// tick leaves the scenario stopped and deregistered instead of dangling.
pub fn spawn(runtime: ScenarioRuntime) -> tokio::task::JoinHandle<()> {
    let id = runtime.scenario.id.clone();
    let store = runtime.store.clone();
    let registry = runtime.registry.clone();
    tokio::spawn(async move {
        if let Err(err) = tokio::spawn(run_loop(runtime)).await {
            tracing::error!(scenario = %id, "scenario loop aborted: {err}");
            store.set_stopped(&id, Utc::now());
            registry.remove(&id);
        }
    })
}

async fn run_loop(mut rt: ScenarioRuntime) {
    let id = rt.scenario.id.clone();
    let interval = Duration::from_millis(rt.scenario.config.interval_ms);
    let duration_bound = rt
        .scenario
        .config
        .duration_minutes
        .map(|m| Duration::from_secs(m * 60));
    let started = Instant::now();
    let mut tick_index: u64 = 0;

    tracing::info!(scenario = %id, name = rt.scenario.name, "scenario started");

    loop {
        if *rt.stop_rx.borrow() {
            finish(&rt, &id, "stop requested");
            return;
        }

        match run_tick(&mut rt, tick_index).await {
            Ok(persisted) => {
                tracing::debug!(scenario = %id, tick = tick_index, persisted, "tick complete");
            }
            Err(err) => {
                // Fatal to this scenario only; the process and sibling
                // scenarios keep running.
                tracing::error!(scenario = %id, tick = tick_index, "tick failed: {err:#}");
                finish(&rt, &id, "tick failure");
                return;
            }
        }
        tick_index += 1;

        if let Some(bound) = duration_bound {
            if started.elapsed() >= bound {
                finish(&rt, &id, "duration bound reached");
                return;
            }
        }

        tokio::select! {
            () = tokio::time::sleep(interval) => {}
            _ = rt.stop_rx.changed() => {}
        }
    }
}

/// Persist terminal status and deregister. Safe to race with an explicit
/// stop: both paths are idempotent.
fn finish(rt: &ScenarioRuntime, id: &ScenarioId, reason: &str) {
    rt.store.set_stopped(id, Utc::now());
    rt.registry.remove(id);
    tracing::info!(
        scenario = %id,
        reason,
        pending_discarded = rt.ledger.pending_len(),
        "scenario stopped"
    );
}

/// One tick. Returns the number of audit records actually persisted.
async fn run_tick(rt: &mut ScenarioRuntime, tick_index: u64) -> Result<usize> {
    let interval_ms = i64::try_from(rt.scenario.config.interval_ms)
        .context("interval does not fit a simulated offset")?;
    let offset = i64::try_from(tick_index)
        .ok()
        .and_then(|t| t.checked_mul(interval_ms))
        .context("simulated offset overflow")?;
    // Simulated time is pure arithmetic; wall-clock jitter never leaks in.
    let sim_time = rt.scenario.start_at + chrono::Duration::milliseconds(offset);

    let mut events: Vec<GeneratedEvent> =
        rt.ledger.due_at(&rt.scenario.id, tick_index, sim_time);

    let batch = rt.factory.generate_batch(tick_index, sim_time);
    for entry in batch.ledger_entries {
        rt.ledger.admit(entry);
    }
    events.extend(batch.events);

    let persisted = rt.store.insert_events(&events);
    rt.store.record_tick(&rt.scenario.id, persisted, tick_index);

    // Await settlement before rescheduling; failures are already logged and
    // never affect the persisted records or the counter.
    rt.dispatcher.dispatch(&events).await;

    Ok(persisted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use relief_core::{
        default_weights, normalize, EventKind, GenerationMode, GeoPoint, Region,
        ScenarioConfig, ScenarioStats, ScenarioStatus,
    };
    use std::collections::BTreeMap;

    fn scenario(id: &str, interval_ms: u64, duration_minutes: Option<u64>) -> Scenario {
        let weights = BTreeMap::from([(EventKind::Production, 0.0), (EventKind::Request, 1.0)]);
        Scenario {
            id: ScenarioId(id.to_string()),
            name: id.to_string(),
            seed: "test-seed-123".to_string(),
            start_at: Utc.with_ymd_and_hms(2025, 3, 15, 6, 0, 0).unwrap(),
            config: ScenarioConfig {
                batch_size: 1,
                interval_ms,
                duration_minutes,
                ..ScenarioConfig::default()
            },
            probabilities: normalize(&weights, &default_weights()),
            status: ScenarioStatus::Running,
            stats: ScenarioStats::default(),
            stopped_at: None,
        }
    }

    fn mode() -> GenerationMode {
        GenerationMode::RegionDriven {
            regions: vec![Region {
                name: "Punjab".to_string(),
                centroid: GeoPoint { lon: 75.3, lat: 30.8 },
            }],
            crops: vec![],
        }
    }

    fn runtime(
        scenario: Scenario,
        store: Arc<AuditStore>,
        registry: Arc<ScenarioRegistry>,
    ) -> ScenarioRuntime {
        let stop_rx = registry
            .register(scenario.id.clone(), &scenario.name)
            .expect("name free");
        store.insert_scenario(scenario.clone());
        ScenarioRuntime {
            factory: EventFactory::new(&scenario, mode()),
            ledger: LifecycleLedger::new(),
            store,
            dispatcher: Arc::new(Dispatcher::new(None, Duration::from_secs(1))),
            registry,
            stop_rx,
            scenario,
        }
    }

    #[tokio::test]
    async fn counter_tracks_persisted_records_exactly() {
        let store = Arc::new(AuditStore::new());
        let registry = Arc::new(ScenarioRegistry::new());
        let scn = scenario("scn_counter", 10, None);
        let id = scn.id.clone();
        let mut rt = runtime(scn, store.clone(), registry);

        for tick in 0..5 {
            run_tick(&mut rt, tick).await.unwrap();
        }
        let record = store.scenario(&id).unwrap();
        assert_eq!(record.stats.ticks, 5);
        assert_eq!(record.stats.events_sent as usize, store.event_count(&id));
        // batch_size 1 and request-only weights: at least one event per
        // tick, plus any matured acceptances.
        assert!(record.stats.events_sent >= 5);
    }

    #[tokio::test]
    async fn stop_signal_prevents_further_ticks() {
        let store = Arc::new(AuditStore::new());
        let registry = Arc::new(ScenarioRegistry::new());
        let scn = scenario("scn_stop", 10, None);
        let id = scn.id.clone();
        let rt = runtime(scn, store.clone(), registry.clone());

        let handle = spawn(rt);
        tokio::time::sleep(Duration::from_millis(60)).await;
        if let Some(h) = registry.remove(&id) {
            h.signal_stop();
        }
        handle.await.unwrap();

        let counted = store.scenario(&id).unwrap().stats.events_sent;
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(store.scenario(&id).unwrap().stats.events_sent, counted);
        assert_eq!(
            store.scenario(&id).unwrap().status,
            ScenarioStatus::Stopped
        );
        assert!(!registry.is_running(&id));
    }

    #[tokio::test]
    async fn duration_bound_auto_stops_without_explicit_stop() {
        let store = Arc::new(AuditStore::new());
        let registry = Arc::new(ScenarioRegistry::new());
        // 0 minutes: the bound trips right after the first tick.
        let scn = scenario("scn_auto", 10, Some(0));
        let id = scn.id.clone();
        let rt = runtime(scn, store.clone(), registry.clone());

        spawn(rt).await.unwrap();

        let record = store.scenario(&id).unwrap();
        assert_eq!(record.status, ScenarioStatus::Stopped);
        assert_eq!(record.stats.ticks, 1);
        assert!(!registry.is_running(&id));
    }

    #[tokio::test]
    async fn dispatch_failures_do_not_stop_the_scenario_or_shrink_counts() {
        let store = Arc::new(AuditStore::new());
        let registry = Arc::new(ScenarioRegistry::new());
        let scn = scenario("scn_faulty", 10, None);
        let id = scn.id.clone();
        let mut rt = runtime(scn, store.clone(), registry.clone());
        // Nothing listens here: every dispatch call fails fast.
        rt.dispatcher = Arc::new(Dispatcher::new(
            Some("http://127.0.0.1:9".to_string()),
            Duration::from_millis(200),
        ));

        for tick in 0..3 {
            run_tick(&mut rt, tick).await.unwrap();
        }
        let record = store.scenario(&id).unwrap();
        assert_eq!(record.stats.events_sent as usize, store.event_count(&id));
        assert!(record.stats.events_sent >= 3);
        assert!(registry.is_running(&id));
    }

    #[tokio::test]
    async fn simulated_time_advances_by_interval_regardless_of_wall_clock() {
        let store = Arc::new(AuditStore::new());
        let registry = Arc::new(ScenarioRegistry::new());
        let scn = scenario("scn_time", 2000, None);
        let id = scn.id.clone();
        let start = scn.start_at;
        let mut rt = runtime(scn, store.clone(), registry);

        // Run ticks back-to-back with no sleeping at all.
        for tick in 0..4 {
            run_tick(&mut rt, tick).await.unwrap();
        }
        let events = store.recent_events(&id, 500);
        for event in events {
            let expected =
                start + chrono::Duration::milliseconds(event.tick_index as i64 * 2000);
            assert_eq!(event.sim_time, expected);
        }
    }
}
