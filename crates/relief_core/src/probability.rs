//! Weight-map normalization for event-kind selection.

use std::collections::BTreeMap;

use crate::EventKind;

/// Default distribution over the generator-driven kinds. Assumed
/// pre-normalized; it is returned unchanged when inputs sum to zero.
pub fn default_weights() -> BTreeMap<EventKind, f64> {
    BTreeMap::from([(EventKind::Production, 0.5), (EventKind::Request, 0.5)])
}

/// Merge `weights` over `defaults` and scale to a distribution summing to 1.
///
/// Missing keys take the default value; NaN and negative weights are treated
/// as 0. If everything sums to ≤ 0 the defaults are returned unchanged.
pub fn normalize(
    weights: &BTreeMap<EventKind, f64>,
    defaults: &BTreeMap<EventKind, f64>,
) -> BTreeMap<EventKind, f64> {
    let mut merged: BTreeMap<EventKind, f64> = BTreeMap::new();
    for (kind, default) in defaults {
        let raw = weights.get(kind).copied().unwrap_or(*default);
        merged.insert(*kind, sanitize(raw));
    }
    // Keys supplied beyond the defaults participate too.
    for (kind, raw) in weights {
        merged.entry(*kind).or_insert_with(|| sanitize(*raw));
    }

    let total: f64 = merged.values().sum();
    if total <= 0.0 {
        return defaults.clone();
    }
    merged.values_mut().for_each(|w| *w /= total);
    merged
}

fn sanitize(w: f64) -> f64 {
    if w.is_nan() || w < 0.0 {
        0.0
    } else {
        w
    }
}
