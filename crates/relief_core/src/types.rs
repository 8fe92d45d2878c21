//! Type definitions for `relief_core`.
//!
//! All public types, structs, enums, and ID newtypes used by the engine.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ID newtypes
// ---------------------------------------------------------------------------

macro_rules! string_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(ScenarioId);
string_id!(RequestId);
string_id!(NodeId);
string_id!(BatchId);
string_id!(EventId);

// ---------------------------------------------------------------------------
// Core enums
// ---------------------------------------------------------------------------

/// The kind of a generated audit event. `Production` and `Request` are the
/// two generator-driven kinds; `Acceptance` is the lifecycle pseudo-kind
/// emitted when a ledger entry matures.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Production,
    Request,
    Acceptance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioStatus {
    Running,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Accepted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Farm,
    Warehouse,
    Ngo,
}

// ---------------------------------------------------------------------------
// Reference data
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lon: f64,
    pub lat: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: NodeId,
    pub name: String,
    pub kind: NodeKind,
    pub location: GeoPoint,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Region {
    pub name: String,
    pub centroid: GeoPoint,
}

/// One crop's harvest window and typical per-event quantity range within a
/// region. Months are 1..=12; a window may wrap the year end (e.g. Dec–Feb).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CropCalendar {
    pub crop: String,
    pub region: String,
    pub harvest_start: u32,
    pub harvest_end: u32,
    pub quantity_min_kg: f64,
    pub quantity_max_kg: f64,
}

impl CropCalendar {
    /// Whether `month` (1..=12) falls inside the harvest window, handling
    /// windows that wrap the year boundary.
    pub fn in_season(&self, month: u32) -> bool {
        if self.harvest_start <= self.harvest_end {
            (self.harvest_start..=self.harvest_end).contains(&month)
        } else {
            month >= self.harvest_start || month <= self.harvest_end
        }
    }
}

// ---------------------------------------------------------------------------
// Scenario state
// ---------------------------------------------------------------------------

/// Tunable parameters for one scenario run. Everything that used to be a
/// constant buried in generator code lives here with a serde default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Wall-clock run bound. `None` runs until an explicit stop.
    #[serde(default)]
    pub duration_minutes: Option<u64>,
    /// Chance that a generated aid request is later auto-accepted.
    #[serde(default = "default_accept_probability")]
    pub accept_probability: f64,
    /// Simulated days between request creation and scheduled acceptance.
    #[serde(default = "default_accept_delay_min")]
    pub accept_delay_days_min: i64,
    #[serde(default = "default_accept_delay_max")]
    pub accept_delay_days_max: i64,
    /// Simulated days between request creation and its required-by instant.
    #[serde(default = "default_required_by_min")]
    pub required_by_days_min: i64,
    #[serde(default = "default_required_by_max")]
    pub required_by_days_max: i64,
    /// Restrict region-driven generation to these region names.
    #[serde(default)]
    pub regions: Option<Vec<String>>,
}

fn default_batch_size() -> u32 {
    5
}
fn default_interval_ms() -> u64 {
    2000
}
fn default_accept_probability() -> f64 {
    0.65
}
fn default_accept_delay_min() -> i64 {
    1
}
fn default_accept_delay_max() -> i64 {
    6
}
fn default_required_by_min() -> i64 {
    2
}
fn default_required_by_max() -> i64 {
    6
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            interval_ms: default_interval_ms(),
            duration_minutes: None,
            accept_probability: default_accept_probability(),
            accept_delay_days_min: default_accept_delay_min(),
            accept_delay_days_max: default_accept_delay_max(),
            required_by_days_min: default_required_by_min(),
            required_by_days_max: default_required_by_max(),
            regions: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ScenarioStats {
    /// Exactly the number of audit records persisted so far, lifecycle
    /// acceptances included. Dispatch failures do not reduce it.
    pub events_sent: u64,
    pub ticks: u64,
}

/// One configured, named simulation run. Created on start, mutated only by
/// its own tick loop (counters, status) and an explicit stop; the record
/// persists after stopping for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub id: ScenarioId,
    pub name: String,
    /// Seed string: together with the scenario id it determines every draw.
    pub seed: String,
    /// Simulated clock origin. Tick N happens at `start_at + N * interval`.
    pub start_at: DateTime<Utc>,
    pub config: ScenarioConfig,
    /// Normalized distribution over the generator-driven event kinds.
    pub probabilities: BTreeMap<EventKind, f64>,
    pub status: ScenarioStatus,
    pub stats: ScenarioStats,
    pub stopped_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Generated events (audit records)
// ---------------------------------------------------------------------------

/// Immutable audit record of one synthesized domain event. Append-only;
/// identity is a pure function of (seed, scenario, tick, index, suffix).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedEvent {
    pub scenario_id: ScenarioId,
    pub identity: EventId,
    pub kind: EventKind,
    pub payload: serde_json::Value,
    pub tick_index: u64,
    pub sim_time: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Outbound payload shapes (bit-relevant for the downstream record service)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoJsonPoint {
    #[serde(rename = "type")]
    pub kind: String,
    /// `[lon, lat]` per GeoJSON.
    pub coordinates: [f64; 2],
}

impl From<GeoPoint> for GeoJsonPoint {
    fn from(p: GeoPoint) -> Self {
        Self {
            kind: "Point".to_string(),
            coordinates: [p.lon, p.lat],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryNote {
    pub note: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRecord {
    #[serde(rename = "batchId")]
    pub batch_id: BatchId,
    pub origin: String,
    pub quantity_kg: f64,
    #[serde(rename = "manufacturedOn")]
    pub manufactured_on: DateTime<Utc>,
    /// Always 100 at synthesis time.
    pub freshness_pct: u32,
    pub history: Vec<HistoryNote>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionPayload {
    pub time: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: String,
    pub location: GeoJsonPoint,
    pub payload: ProductionDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionDetail {
    /// Farm node id or `region:<name>` reference.
    pub origin: String,
    pub crop: String,
    pub quantity_kg: f64,
    pub batch: BatchRecord,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    #[serde(rename = "foodType")]
    pub food_type: String,
    pub required_kg: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestPayload {
    #[serde(rename = "requestId")]
    pub request_id: RequestId,
    #[serde(rename = "requesterNode")]
    pub requester_node: String,
    pub items: Vec<LineItem>,
    #[serde(rename = "createdOn")]
    pub created_on: DateTime<Utc>,
    #[serde(rename = "requiredBefore")]
    pub required_before: DateTime<Utc>,
    pub status: RequestStatus,
    pub history: Vec<HistoryNote>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcceptancePayload {
    #[serde(rename = "requestId")]
    pub request_id: RequestId,
    /// The downstream service expects the literal "approved" here.
    pub status: String,
    #[serde(rename = "approvedOn")]
    pub approved_on: DateTime<Utc>,
    #[serde(rename = "fulfilledBy")]
    pub fulfilled_by: String,
    pub history: Vec<HistoryNote>,
}

// ---------------------------------------------------------------------------
// Lifecycle ledger entries
// ---------------------------------------------------------------------------

/// The engine's own tracking record for one aid request's simulated
/// approval progress. Forward-only: pending → accepted, at most once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub request_id: RequestId,
    pub requester: String,
    pub items: Vec<LineItem>,
    pub created_on: DateTime<Utc>,
    pub required_before: DateTime<Utc>,
    pub status: RequestStatus,
    pub history: Vec<HistoryNote>,
    /// Simulated instant at which the request auto-accepts. `None` means
    /// the entry stays pending for this engine's whole view of it.
    pub accept_at: Option<DateTime<Utc>>,
    pub fulfiller: Option<String>,
}
