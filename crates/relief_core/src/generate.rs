//! Event generators: synthesize production and aid-request events from a
//! per-event draw plus the scenario's reference data.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Duration, Utc};
use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::draw::{draw, uuid_from_rng};
use crate::{
    BatchId, BatchRecord, CropCalendar, EventId, EventKind, GeneratedEvent, GeoJsonPoint,
    HistoryNote, LedgerEntry, LineItem, NodeKind, NodeRecord, ProductionDetail,
    ProductionPayload, Region, RequestId, RequestPayload, RequestStatus, Scenario,
    ScenarioConfig, ScenarioId,
};

/// Per-type quantity ranges (kg) for aid-request line items.
const FOOD_CATALOG: &[(&str, f64, f64)] = &[
    ("cereals", 50.0, 500.0),
    ("pulses", 25.0, 250.0),
    ("oil", 10.0, 100.0),
    ("vegetables", 40.0, 400.0),
    ("fertilizer", 100.0, 1000.0),
    ("seeds", 5.0, 50.0),
    ("logistics", 1.0, 10.0),
];

/// Used when no crop calendar covers the chosen target.
const CROP_FALLBACKS: &[(&str, f64, f64)] = &[
    ("Wheat", 100.0, 1000.0),
    ("Rice", 100.0, 1000.0),
    ("Maize", 50.0, 500.0),
];

/// How a scenario sources its targets, decided once at construction and
/// never inferred per call.
#[derive(Debug, Clone)]
pub enum GenerationMode {
    /// An explicit node list was supplied at start.
    NodeDriven { nodes: Vec<NodeRecord> },
    /// Regions plus seasonal-production calendars from the reference store.
    RegionDriven {
        regions: Vec<Region>,
        crops: Vec<CropCalendar>,
    },
}

/// One tick's freshly generated output: audit events plus the ledger
/// entries backing the request events in the batch.
#[derive(Debug, Default)]
pub struct TickBatch {
    pub events: Vec<GeneratedEvent>,
    pub ledger_entries: Vec<LedgerEntry>,
}

/// Synthesizes events for one scenario. Owns the scenario's in-memory
/// inventory ledger (kg produced per target), which region-driven shipment
/// sizing reads from.
pub struct EventFactory {
    scenario_id: ScenarioId,
    seed: String,
    config: ScenarioConfig,
    probabilities: BTreeMap<EventKind, f64>,
    mode: GenerationMode,
    inventory: BTreeMap<String, f64>,
}

impl EventFactory {
    pub fn new(scenario: &Scenario, mode: GenerationMode) -> Self {
        Self {
            scenario_id: scenario.id.clone(),
            seed: scenario.seed.clone(),
            config: scenario.config.clone(),
            probabilities: scenario.probabilities.clone(),
            mode,
            inventory: BTreeMap::new(),
        }
    }

    /// Kilograms produced so far per target, keyed by node id or region name.
    pub fn inventory(&self) -> &BTreeMap<String, f64> {
        &self.inventory
    }

    /// Produce `batch_size` new events for this tick, one per in-batch
    /// index, each from its own independent draw.
    pub fn generate_batch(&mut self, tick_index: u64, sim_time: DateTime<Utc>) -> TickBatch {
        let mut batch = TickBatch::default();
        for event_index in 0..self.config.batch_size {
            let mut rng = draw(&self.seed, &self.scenario_id, tick_index, event_index, None);
            let roll: f64 = rng.gen();
            let Some(kind) = self.resolve_kind(roll) else {
                // No reference data can produce anything; nothing to emit.
                continue;
            };
            match kind {
                EventKind::Production => {
                    batch
                        .events
                        .push(self.production_event(&mut rng, tick_index, sim_time));
                }
                EventKind::Request => {
                    let (event, entry) = self.request_event(&mut rng, tick_index, sim_time);
                    batch.events.push(event);
                    batch.ledger_entries.push(entry);
                }
                // Acceptance is ledger-driven, never generator-selected.
                EventKind::Acceptance => continue,
            }
        }
        batch
    }

    /// Classify one roll against cumulative probability thresholds, then
    /// fall back to the first producible kind if the chosen one has no
    /// reference data behind it.
    fn resolve_kind(&self, roll: f64) -> Option<EventKind> {
        let mut cumulative = 0.0;
        let mut chosen = None;
        for (kind, p) in &self.probabilities {
            cumulative += p;
            if roll < cumulative {
                chosen = Some(*kind);
                break;
            }
        }
        // Float residue: land on the last weighted kind.
        let chosen =
            chosen.or_else(|| self.probabilities.keys().next_back().copied())?;
        if self.available(chosen) {
            return Some(chosen);
        }
        self.probabilities
            .keys()
            .copied()
            .find(|kind| self.available(*kind))
    }

    fn available(&self, kind: EventKind) -> bool {
        match (&self.mode, kind) {
            (GenerationMode::NodeDriven { nodes }, EventKind::Production) => {
                nodes.iter().any(|n| n.kind == NodeKind::Farm)
            }
            (GenerationMode::NodeDriven { nodes }, EventKind::Request) => {
                nodes.iter().any(|n| n.kind == NodeKind::Ngo)
            }
            (GenerationMode::RegionDriven { regions, .. }, EventKind::Production)
            | (GenerationMode::RegionDriven { regions, .. }, EventKind::Request) => {
                !regions.is_empty()
            }
            (_, EventKind::Acceptance) => false,
        }
    }

    fn production_event(
        &mut self,
        rng: &mut ChaCha8Rng,
        tick_index: u64,
        sim_time: DateTime<Utc>,
    ) -> GeneratedEvent {
        let (origin, location, crop, qty_min, qty_max) = match &self.mode {
            GenerationMode::NodeDriven { nodes } => {
                let farms: Vec<&NodeRecord> =
                    nodes.iter().filter(|n| n.kind == NodeKind::Farm).collect();
                let farm = farms[rng.gen_range(0..farms.len())];
                let (crop, lo, hi) = CROP_FALLBACKS[rng.gen_range(0..CROP_FALLBACKS.len())];
                (
                    farm.id.0.clone(),
                    farm.location,
                    crop.to_string(),
                    lo,
                    hi,
                )
            }
            GenerationMode::RegionDriven { regions, crops } => {
                let region = &regions[rng.gen_range(0..regions.len())];
                let month = sim_time.month();
                let regional: Vec<&CropCalendar> =
                    crops.iter().filter(|c| c.region == region.name).collect();
                let in_season: Vec<&&CropCalendar> =
                    regional.iter().filter(|c| c.in_season(month)).collect();
                let (crop, lo, hi) = if let Some(c) = pick(rng, &in_season) {
                    (c.crop.clone(), c.quantity_min_kg, c.quantity_max_kg)
                } else if let Some(c) = pick(rng, &regional) {
                    (c.crop.clone(), c.quantity_min_kg, c.quantity_max_kg)
                } else {
                    let (crop, lo, hi) =
                        CROP_FALLBACKS[rng.gen_range(0..CROP_FALLBACKS.len())];
                    (crop.to_string(), lo, hi)
                };
                (
                    format!("region:{}", region.name),
                    region.centroid,
                    crop,
                    lo,
                    hi,
                )
            }
        };

        let quantity_kg = rng.gen_range(qty_min..=qty_max).round();
        *self.inventory.entry(origin.clone()).or_insert(0.0) += quantity_kg;

        let identity = EventId(format!("evt_{}", uuid_from_rng(rng)));
        let batch_id = BatchId(format!("batch_{}", uuid_from_rng(rng)));
        let payload = ProductionPayload {
            time: sim_time,
            kind: "farm_production".to_string(),
            location: GeoJsonPoint::from(location),
            payload: ProductionDetail {
                origin: origin.clone(),
                crop,
                quantity_kg,
                batch: BatchRecord {
                    batch_id,
                    origin,
                    quantity_kg,
                    manufactured_on: sim_time,
                    freshness_pct: 100,
                    history: vec![HistoryNote {
                        note: "created".to_string(),
                        at: sim_time,
                    }],
                },
            },
        };
        GeneratedEvent {
            scenario_id: self.scenario_id.clone(),
            identity,
            kind: EventKind::Production,
            payload: serde_json::to_value(&payload).unwrap_or(serde_json::Value::Null),
            tick_index,
            sim_time,
        }
    }

    fn request_event(
        &mut self,
        rng: &mut ChaCha8Rng,
        tick_index: u64,
        sim_time: DateTime<Utc>,
    ) -> (GeneratedEvent, LedgerEntry) {
        let cfg = &self.config;
        let (requester, fulfiller_pool) = match &self.mode {
            GenerationMode::NodeDriven { nodes } => {
                let ngos: Vec<&NodeRecord> =
                    nodes.iter().filter(|n| n.kind == NodeKind::Ngo).collect();
                let requester = ngos[rng.gen_range(0..ngos.len())].id.0.clone();
                let pool: Vec<String> = nodes
                    .iter()
                    .filter(|n| matches!(n.kind, NodeKind::Warehouse | NodeKind::Farm))
                    .map(|n| n.id.0.clone())
                    .collect();
                (requester, pool)
            }
            GenerationMode::RegionDriven { regions, .. } => {
                let region = &regions[rng.gen_range(0..regions.len())];
                (
                    format!("region:{}", region.name),
                    vec![format!("hub_{}", region.name)],
                )
            }
        };

        // 1–3 distinct line items from the catalog.
        let item_count = rng.gen_range(1..=3usize);
        let mut pool: Vec<usize> = (0..FOOD_CATALOG.len()).collect();
        let items: Vec<LineItem> = (0..item_count)
            .map(|_| {
                let slot = rng.gen_range(0..pool.len());
                let (food_type, lo, hi) = FOOD_CATALOG[pool.swap_remove(slot)];
                LineItem {
                    food_type: food_type.to_string(),
                    required_kg: rng.gen_range(lo..=hi).round(),
                }
            })
            .collect();

        let required_before = sim_time
            + Duration::days(rng.gen_range(cfg.required_by_days_min..=cfg.required_by_days_max));

        // The same per-event draw decides the downstream lifecycle, so the
        // whole outcome replays from one key.
        let will_accept = rng.gen::<f64>() < cfg.accept_probability;
        let (accept_at, fulfiller) = if will_accept {
            let delay =
                Duration::days(rng.gen_range(cfg.accept_delay_days_min..=cfg.accept_delay_days_max));
            let fulfiller = if fulfiller_pool.is_empty() {
                None
            } else {
                Some(fulfiller_pool[rng.gen_range(0..fulfiller_pool.len())].clone())
            };
            (Some(sim_time + delay), fulfiller)
        } else {
            (None, None)
        };

        let request_id = RequestId(format!("req_{}", uuid_from_rng(rng)));
        let history = vec![HistoryNote {
            note: "created".to_string(),
            at: sim_time,
        }];
        let payload = RequestPayload {
            request_id: request_id.clone(),
            requester_node: requester.clone(),
            items: items.clone(),
            created_on: sim_time,
            required_before,
            status: RequestStatus::Pending,
            history: history.clone(),
        };
        let event = GeneratedEvent {
            scenario_id: self.scenario_id.clone(),
            identity: EventId(format!("evt_{}", request_id.0.trim_start_matches("req_"))),
            kind: EventKind::Request,
            payload: serde_json::to_value(&payload).unwrap_or(serde_json::Value::Null),
            tick_index,
            sim_time,
        };
        let entry = LedgerEntry {
            request_id,
            requester,
            items,
            created_on: sim_time,
            required_before,
            status: RequestStatus::Pending,
            history,
            accept_at,
            fulfiller,
        };
        (event, entry)
    }
}

fn pick<'a, T>(rng: &mut ChaCha8Rng, slice: &'a [T]) -> Option<&'a T> {
    if slice.is_empty() {
        None
    } else {
        Some(&slice[rng.gen_range(0..slice.len())])
    }
}
