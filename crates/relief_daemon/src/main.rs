//! Scenario-simulation daemon: HTTP control surface over per-scenario tick
//! loops, with best-effort dispatch to a downstream record service.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod dispatch;
mod error;
mod registry;
mod routes;
mod scheduler;
mod state;
mod store;

use dispatch::Dispatcher;
use registry::ScenarioRegistry;
use state::AppState;
use store::AuditStore;

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "relief_daemon", about = "Relief-logistics scenario simulation daemon")]
struct Args {
    #[arg(long, default_value = "127.0.0.1:8080")]
    listen: String,
    /// Directory holding regions.json, crop_calendar.json and nodes.json.
    #[arg(long, default_value = "./content")]
    content_dir: String,
    /// Base URL of the downstream record service. Omit to disable dispatch.
    #[arg(long)]
    downstream_url: Option<String>,
    /// Per-call dispatch timeout.
    #[arg(long, default_value_t = 5000)]
    dispatch_timeout_ms: u64,
    #[arg(long, default_value = "http://localhost:5173")]
    cors_origin: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let reference = relief_world::load_reference(&args.content_dir)
        .with_context(|| format!("loading reference data from {}", args.content_dir))?;
    tracing::info!(
        regions = reference.regions.len(),
        crops = reference.crops.len(),
        nodes = reference.nodes.len(),
        "reference data loaded"
    );

    let state = AppState {
        registry: Arc::new(ScenarioRegistry::new()),
        store: Arc::new(AuditStore::new()),
        dispatcher: Arc::new(Dispatcher::new(
            args.downstream_url.clone(),
            Duration::from_millis(args.dispatch_timeout_ms),
        )),
        reference: Arc::new(reference),
    };
    if args.downstream_url.is_none() {
        tracing::warn!("no --downstream-url given; events persist locally only");
    }

    let router = routes::make_router_with_cors(state.clone(), &args.cors_origin);
    let listener = tokio::net::TcpListener::bind(&args.listen)
        .await
        .with_context(|| format!("binding {}", args.listen))?;
    tracing::info!(addr = %listener.local_addr()?, "relief daemon listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown(state))
        .await
        .context("serving")?;
    Ok(())
}

/// Ctrl-c stops every running scenario (terminal status persisted) before
/// the listener winds down.
async fn shutdown(state: AppState) {
    if tokio::signal::ctrl_c().await.is_err() {
        return;
    }
    let handles = state.registry.drain();
    let now = Utc::now();
    for handle in &handles {
        state.store.set_stopped(&handle.id, now);
    }
    tracing::info!(stopped = handles.len(), "shutting down");
}
