//! Best-effort concurrent fan-out to the downstream record-keeping service.
//!
//! At-most-once: failures are logged and never retried, and persisted audit
//! records are never rolled back because delivery failed.

use std::time::Duration;

use relief_core::{EventKind, GeneratedEvent};

/// Per-kind path on the downstream service.
fn path_for(kind: EventKind) -> &'static str {
    match kind {
        EventKind::Production => "/events/farm-production",
        EventKind::Request => "/events/aid-requests",
        EventKind::Acceptance => "/events/request-approvals",
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failed: usize,
}

pub struct Dispatcher {
    client: reqwest::Client,
    /// `None` disables outbound dispatch entirely (dry-run daemons, tests).
    base_url: Option<String>,
}

impl Dispatcher {
    pub fn new(base_url: Option<String>, timeout: Duration) -> Self {
        // Built once at startup from static config; the timeout must hold
        // for every later call.
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("building the dispatch http client");
        let base_url = base_url.map(|u| u.trim_end_matches('/').to_string());
        Self { client, base_url }
    }

    /// Post every event concurrently and wait for all calls to settle. A
    /// failure on one call never cancels or blocks the others.
    pub async fn dispatch(&self, events: &[GeneratedEvent]) -> DispatchReport {
        let mut report = DispatchReport::default();
        let Some(base) = &self.base_url else {
            return report;
        };

        let mut handles = Vec::with_capacity(events.len());
        for event in events {
            let url = format!("{base}{}", path_for(event.kind));
            let client = self.client.clone();
            let body = event.payload.clone();
            let identity = event.identity.clone();
            handles.push(tokio::spawn(async move {
                let result = client.post(&url).json(&body).send().await;
                (identity, url, result)
            }));
        }

        for handle in handles {
            match handle.await {
                Ok((_, _, Ok(response))) if response.status().is_success() => {
                    report.delivered += 1;
                }
                Ok((identity, url, Ok(response))) => {
                    report.failed += 1;
                    tracing::warn!(
                        %identity,
                        url,
                        status = %response.status(),
                        "dispatch rejected by downstream"
                    );
                }
                Ok((identity, url, Err(err))) => {
                    report.failed += 1;
                    tracing::warn!(%identity, url, "dispatch failed: {err}");
                }
                Err(err) => {
                    report.failed += 1;
                    tracing::warn!("dispatch task panicked: {err}");
                }
            }
        }
        report
    }
}
