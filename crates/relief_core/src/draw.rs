//! Deterministic per-event draw source.
//!
//! Every generated event gets a brand-new generator seeded from a digest of
//! its composite key, not a position in one advancing stream. Batch size or
//! generation order can change between runs without perturbing any other
//! event's outcome, and a single event can be replayed in isolation.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::ScenarioId;

/// Build the independent generator for one event.
///
/// The key is (scenario seed, scenario id, tick index, in-batch index) plus
/// an optional purpose suffix for draws that belong to the same event but
/// must not share a stream with its main draw.
pub fn draw(
    seed: &str,
    scenario_id: &ScenarioId,
    tick_index: u64,
    event_index: u32,
    suffix: Option<&str>,
) -> ChaCha8Rng {
    let mut hasher = Sha256::new();
    hasher.update(seed.as_bytes());
    hasher.update(b"|");
    hasher.update(scenario_id.0.as_bytes());
    hasher.update(b"|");
    hasher.update(tick_index.to_le_bytes());
    hasher.update(b"|");
    hasher.update(event_index.to_le_bytes());
    if let Some(suffix) = suffix {
        hasher.update(b"|");
        hasher.update(suffix.as_bytes());
    }
    let digest = hasher.finalize();
    let mut key = [0u8; 32];
    key.copy_from_slice(&digest);
    ChaCha8Rng::from_seed(key)
}

/// Generate a deterministic v4-format UUID from a seeded RNG.
pub fn uuid_from_rng(rng: &mut impl Rng) -> Uuid {
    let bytes: [u8; 16] = rng.gen();
    uuid::Builder::from_random_bytes(bytes).into_uuid()
}
