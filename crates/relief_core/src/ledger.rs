//! Lifecycle ledger: tracks aid-request entries through the forward-only
//! pending → accepted progression, scheduled at simulated future instants.

use chrono::{DateTime, Utc};

use crate::{
    AcceptancePayload, EventId, EventKind, GeneratedEvent, HistoryNote, LedgerEntry,
    RequestStatus, ScenarioId,
};

/// In-memory pending/dormant queues for one scenario. Dropped wholesale when
/// the scenario stops; still-pending entries leave no separate audit trail.
#[derive(Debug, Default)]
pub struct LifecycleLedger {
    /// Entries with a scheduled acceptance instant, waiting to mature.
    pending: Vec<LedgerEntry>,
    /// Tracked entries that will never automatically progress.
    dormant: Vec<LedgerEntry>,
}

impl LifecycleLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route a freshly generated entry: scheduled ones join the pending
    /// queue, the rest are tracked but never progressed.
    pub fn admit(&mut self, entry: LedgerEntry) {
        if entry.accept_at.is_some() {
            self.pending.push(entry);
        } else {
            self.dormant.push(entry);
        }
    }

    /// Materialize every pending entry whose acceptance instant has been
    /// reached by `sim_time` into an acceptance audit event, removing it
    /// from the queue. Matured entries never re-enter.
    pub fn due_at(
        &mut self,
        scenario_id: &ScenarioId,
        tick_index: u64,
        sim_time: DateTime<Utc>,
    ) -> Vec<GeneratedEvent> {
        let (due, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending)
            .into_iter()
            .partition(|e| e.accept_at.is_some_and(|at| at <= sim_time));
        self.pending = waiting;

        due.into_iter()
            .map(|mut entry| {
                let accept_at = entry.accept_at.unwrap_or(sim_time);
                let days_open = ((accept_at - entry.created_on).num_milliseconds() as f64
                    / 86_400_000.0)
                    .round() as i64;
                entry.status = RequestStatus::Accepted;
                entry.history.push(HistoryNote {
                    note: format!("approved after {days_open} day(s) open"),
                    at: accept_at,
                });
                let fulfilled_by = entry.fulfiller.clone().unwrap_or_default();
                let payload = AcceptancePayload {
                    request_id: entry.request_id.clone(),
                    status: "approved".to_string(),
                    approved_on: accept_at,
                    fulfilled_by,
                    history: entry.history.clone(),
                };
                GeneratedEvent {
                    scenario_id: scenario_id.clone(),
                    // Pure function of the request id, itself a pure
                    // function of the request's composite draw key.
                    identity: EventId(format!("{}_approval", entry.request_id)),
                    kind: EventKind::Acceptance,
                    payload: serde_json::to_value(&payload)
                        .unwrap_or(serde_json::Value::Null),
                    tick_index,
                    sim_time,
                }
            })
            .collect()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn dormant_len(&self) -> usize {
        self.dormant.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RequestId;
    use chrono::TimeZone;

    fn ts(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, h, 0, 0).unwrap()
    }

    fn entry(id: &str, accept_at: Option<DateTime<Utc>>) -> LedgerEntry {
        LedgerEntry {
            request_id: RequestId(id.to_string()),
            requester: "ngo_01".to_string(),
            items: vec![],
            created_on: ts(0),
            required_before: ts(12),
            status: RequestStatus::Pending,
            history: vec![HistoryNote {
                note: "created".to_string(),
                at: ts(0),
            }],
            accept_at,
            fulfiller: Some("wh_01".to_string()),
        }
    }

    #[test]
    fn matured_entries_leave_the_queue_exactly_once() {
        let mut ledger = LifecycleLedger::new();
        let scn = ScenarioId("scn_a".to_string());
        ledger.admit(entry("req_1", Some(ts(3))));
        ledger.admit(entry("req_2", Some(ts(9))));

        let first = ledger.due_at(&scn, 1, ts(4));
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].identity.0, "req_1_approval");
        assert_eq!(first[0].kind, EventKind::Acceptance);
        assert_eq!(ledger.pending_len(), 1);

        // Same instant again: req_1 must not re-mature.
        assert!(ledger.due_at(&scn, 2, ts(4)).is_empty());

        let second = ledger.due_at(&scn, 3, ts(9));
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].identity.0, "req_2_approval");
        assert_eq!(ledger.pending_len(), 0);
    }

    #[test]
    fn unscheduled_entries_never_mature() {
        let mut ledger = LifecycleLedger::new();
        let scn = ScenarioId("scn_a".to_string());
        ledger.admit(entry("req_1", None));
        assert!(ledger.due_at(&scn, 0, ts(23)).is_empty());
        assert_eq!(ledger.dormant_len(), 1);
        assert_eq!(ledger.pending_len(), 0);
    }

    #[test]
    fn acceptance_payload_carries_days_open_and_fulfiller() {
        let mut ledger = LifecycleLedger::new();
        let scn = ScenarioId("scn_a".to_string());
        let mut e = entry("req_1", None);
        // Created June 1st, accepted June 4th → 3 days open.
        e.accept_at = Some(Utc.with_ymd_and_hms(2025, 6, 4, 0, 0, 0).unwrap());
        ledger.admit(e);

        let events = ledger.due_at(&scn, 5, Utc.with_ymd_and_hms(2025, 6, 5, 0, 0, 0).unwrap());
        assert_eq!(events.len(), 1);
        let payload = &events[0].payload;
        assert_eq!(payload["status"], "approved");
        assert_eq!(payload["fulfilledBy"], "wh_01");
        let notes: Vec<&str> = payload["history"]
            .as_array()
            .unwrap()
            .iter()
            .map(|n| n["note"].as_str().unwrap())
            .collect();
        assert_eq!(notes, vec!["created", "approved after 3 day(s) open"]);
    }
}
