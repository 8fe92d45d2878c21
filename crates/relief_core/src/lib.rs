//! `relief_core` — deterministic scenario event synthesis.
//!
//! No IO, no network. All randomness via per-event generators derived from
//! a composite key, so any event replays in isolation.

pub mod draw;
mod generate;
mod ledger;
pub mod probability;
mod types;

pub use draw::{draw, uuid_from_rng};
pub use generate::{EventFactory, GenerationMode, TickBatch};
pub use ledger::LifecycleLedger;
pub use probability::{default_weights, normalize};
pub use types::*;
