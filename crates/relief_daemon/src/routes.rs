//! HTTP control surface: start/stop/status/events over the scenario engine.

use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::http::Method;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use chrono::{DateTime, Utc};
use relief_core::{
    default_weights, normalize, EventFactory, EventKind, GenerationMode, LifecycleLedger,
    NodeKind, NodeRecord, Scenario, ScenarioConfig, ScenarioId, ScenarioStats, ScenarioStatus,
};
use serde::Deserialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::error::ApiError;
use crate::scheduler::{self, ScenarioRuntime};
use crate::state::AppState;

const MAX_EVENT_LIMIT: usize = 500;
const DEFAULT_EVENT_LIMIT: usize = 100;

#[cfg(test)]
pub fn make_router(state: AppState) -> Router {
    make_router_with_cors(state, "http://localhost:5173")
}

pub fn make_router_with_cors(state: AppState, cors_origin: &str) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(cors_origin.parse::<axum::http::HeaderValue>().unwrap())
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/scenarios", post(start_handler).get(list_handler))
        .route("/api/v1/scenarios/:id", get(status_handler))
        .route("/api/v1/scenarios/:id/stop", post(stop_handler))
        .route("/api/v1/scenarios/:id/events", get(events_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct StartRequest {
    name: Option<String>,
    seed: Option<String>,
    /// RFC3339 simulated start instant. Defaults to now.
    start_at: Option<String>,
    batch_size: Option<u32>,
    interval_ms: Option<u64>,
    duration_minutes: Option<u64>,
    /// Partial weight map over "production" / "request".
    probabilities: Option<HashMap<String, f64>>,
    /// Region-driven mode: restrict to these region names.
    regions: Option<Vec<String>>,
    /// Node-driven mode: explicit node list. Presence selects the mode.
    nodes: Option<Vec<NodeRecord>>,
    accept_probability: Option<f64>,
    /// Simulated-day offsets; unset halves fall back to the config default.
    accept_delay_days_min: Option<i64>,
    accept_delay_days_max: Option<i64>,
    required_by_days_min: Option<i64>,
    required_by_days_max: Option<i64>,
}

/// Resolve one min/max day-offset pair against its defaults, rejecting
/// zero, negative, and inverted ranges before any generator can draw from
/// them.
fn day_range(
    field: &str,
    min: Option<i64>,
    max: Option<i64>,
    defaults: (i64, i64),
) -> Result<(i64, i64), ApiError> {
    let min = min.unwrap_or(defaults.0);
    let max = max.unwrap_or(defaults.1);
    if min < 1 {
        return Err(ApiError::Validation(format!("'{field}_min' must be ≥ 1")));
    }
    if min > max {
        return Err(ApiError::Validation(format!(
            "'{field}_min' must not exceed '{field}_max'"
        )));
    }
    Ok((min, max))
}

async fn start_handler(
    State(state): State<AppState>,
    Json(req): Json<StartRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let name = req
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ApiError::Validation("'name' is required".to_string()))?;
    let seed = req
        .seed
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::Validation("'seed' is required".to_string()))?;

    let start_at: DateTime<Utc> = match &req.start_at {
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map_err(|err| {
                ApiError::Validation(format!("'start_at' is not a valid RFC3339 instant: {err}"))
            })?
            .with_timezone(&Utc),
        None => Utc::now(),
    };

    let mut weights = std::collections::BTreeMap::new();
    if let Some(supplied) = &req.probabilities {
        for (key, weight) in supplied {
            let kind = match key.as_str() {
                "production" => EventKind::Production,
                "request" => EventKind::Request,
                other => {
                    return Err(ApiError::Validation(format!(
                        "unknown event kind '{other}' in probabilities"
                    )))
                }
            };
            weights.insert(kind, *weight);
        }
    }
    let probabilities = normalize(&weights, &default_weights());

    let mut config = ScenarioConfig {
        duration_minutes: req.duration_minutes,
        regions: req.regions.clone(),
        ..ScenarioConfig::default()
    };
    if let Some(batch_size) = req.batch_size {
        if batch_size == 0 {
            return Err(ApiError::Validation("'batch_size' must be ≥ 1".to_string()));
        }
        config.batch_size = batch_size;
    }
    if let Some(interval_ms) = req.interval_ms {
        if interval_ms == 0 {
            return Err(ApiError::Validation("'interval_ms' must be ≥ 1".to_string()));
        }
        config.interval_ms = interval_ms;
    }
    if let Some(p) = req.accept_probability {
        if !(0.0..=1.0).contains(&p) {
            return Err(ApiError::Validation(
                "'accept_probability' must be within 0..=1".to_string(),
            ));
        }
        config.accept_probability = p;
    }
    let (min, max) = day_range(
        "accept_delay_days",
        req.accept_delay_days_min,
        req.accept_delay_days_max,
        (config.accept_delay_days_min, config.accept_delay_days_max),
    )?;
    config.accept_delay_days_min = min;
    config.accept_delay_days_max = max;
    let (min, max) = day_range(
        "required_by_days",
        req.required_by_days_min,
        req.required_by_days_max,
        (config.required_by_days_min, config.required_by_days_max),
    )?;
    config.required_by_days_min = min;
    config.required_by_days_max = max;

    // Mode is decided once, here, by whether an explicit node list came in.
    let mode = match &req.nodes {
        Some(nodes) if !nodes.is_empty() => {
            let usable = nodes
                .iter()
                .any(|n| matches!(n.kind, NodeKind::Farm | NodeKind::Ngo));
            if !usable {
                return Err(ApiError::Validation(
                    "node list must include at least one farm or NGO node".to_string(),
                ));
            }
            GenerationMode::NodeDriven {
                nodes: nodes.clone(),
            }
        }
        _ => {
            let (regions, crops) = state
                .reference
                .select_regions(config.regions.as_deref())
                .ok_or_else(|| {
                    ApiError::Validation("no reference regions match the filter".to_string())
                })?;
            GenerationMode::RegionDriven { regions, crops }
        }
    };

    let id = ScenarioId(format!("scn_{}", uuid::Uuid::new_v4()));
    let Some(stop_rx) = state.registry.register(id.clone(), name) else {
        return Err(ApiError::DuplicateScenario(name.to_string()));
    };

    let scenario = Scenario {
        id: id.clone(),
        name: name.to_string(),
        seed: seed.to_string(),
        start_at,
        config,
        probabilities,
        status: ScenarioStatus::Running,
        stats: ScenarioStats::default(),
        stopped_at: None,
    };
    state.store.insert_scenario(scenario.clone());

    let factory = EventFactory::new(&scenario, mode);
    scheduler::spawn(ScenarioRuntime {
        scenario,
        factory,
        ledger: LifecycleLedger::new(),
        store: state.store.clone(),
        dispatcher: state.dispatcher.clone(),
        registry: state.registry.clone(),
        stop_rx,
    });

    Ok(Json(serde_json::json!({
        "scenario_id": id,
        "status": "running",
    })))
}

async fn stop_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = ScenarioId(id);
    if let Some(handle) = state.registry.remove(&id) {
        handle.signal_stop();
        state.store.set_stopped(&id, Utc::now());
    }
    let scenario = state
        .store
        .scenario(&id)
        .ok_or_else(|| ApiError::NotFound(id.0.clone()))?;
    Ok(Json(serde_json::json!({
        "scenario_id": scenario.id,
        "status": scenario.status,
        "stats": scenario.stats,
    })))
}

async fn status_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Scenario>, ApiError> {
    let id = ScenarioId(id);
    state
        .store
        .scenario(&id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(id.0))
}

async fn list_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let scenarios: Vec<serde_json::Value> = state
        .store
        .list_scenarios()
        .into_iter()
        .map(|s| {
            serde_json::json!({
                "scenario_id": s.id,
                "name": s.name,
                "status": s.status,
                "stats": s.stats,
            })
        })
        .collect();
    Json(serde_json::json!({ "scenarios": scenarios }))
}

#[derive(Debug, Deserialize)]
struct EventsQuery {
    limit: Option<usize>,
}

async fn events_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<EventsQuery>,
) -> Result<Json<Vec<relief_core::GeneratedEvent>>, ApiError> {
    let id = ScenarioId(id);
    if state.store.scenario(&id).is_none() {
        return Err(ApiError::NotFound(id.0));
    }
    let limit = query
        .limit
        .unwrap_or(DEFAULT_EVENT_LIMIT)
        .clamp(1, MAX_EVENT_LIMIT);
    Ok(Json(state.store.recent_events(&id, limit)))
}
