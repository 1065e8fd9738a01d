//! Population-stability-index drift detection over action distributions.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tether_core::config::DEFAULT_DRIFT_THRESHOLD;
use tether_core::Trace;

/// Substituted for absent or zero buckets so the log term stays finite.
pub const PSI_EPSILON: f64 = 1e-6;
/// Number of contributors kept in a [`DriftReport`].
pub const MAX_CONTRIBUTORS: usize = 5;

/// Normalized histogram keyed by token.
pub type Distribution = BTreeMap<String, f64>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contributor {
    pub token: String,
    /// Absolute PSI term contributed by this token.
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftReport {
    pub psi: f64,
    pub is_drift: bool,
    pub top_contributors: Vec<Contributor>,
}

fn psi_terms<'a>(expected: &'a Distribution, observed: &'a Distribution) -> impl Iterator<Item = (&'a str, f64)> + 'a {
    let keys: BTreeSet<&'a String> = expected.keys().chain(observed.keys()).collect();
    keys.into_iter().map(move |key| {
        let e = bucket(expected, key);
        let o = bucket(observed, key);
        (key.as_str(), (o - e) * (o / e).ln())
    })
}

fn bucket(dist: &Distribution, key: &str) -> f64 {
    match dist.get(key) {
        Some(&v) if v > 0.0 => v,
        _ => PSI_EPSILON,
    }
}

/// Sum over the union of keys of `(o - e) * ln(o / e)`.
pub fn population_stability_index(expected: &Distribution, observed: &Distribution) -> f64 {
    psi_terms(expected, observed).map(|(_, term)| term).sum()
}

/// PSI plus the tokens contributing most to it.
///
/// A non-positive `threshold` means 0.25. Drift is flagged when the PSI
/// strictly exceeds the threshold.
pub fn detect_drift(expected: &Distribution, observed: &Distribution, threshold: f64) -> DriftReport {
    let threshold = if threshold > 0.0 { threshold } else { DEFAULT_DRIFT_THRESHOLD };

    let mut psi = 0.0;
    let mut contributors: Vec<Contributor> = psi_terms(expected, observed)
        .map(|(token, term)| {
            psi += term;
            Contributor {
                token: token.to_string(),
                value: term.abs(),
            }
        })
        .collect();
    contributors.sort_by(|a, b| {
        b.value
            .partial_cmp(&a.value)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.token.cmp(&b.token))
    });
    contributors.truncate(MAX_CONTRIBUTORS);

    DriftReport {
        psi,
        is_drift: psi > threshold,
        top_contributors: contributors,
    }
}

/// Share of each canonical action across all events of `traces`.
pub fn event_distribution<'a>(traces: impl IntoIterator<Item = &'a Trace>) -> Distribution {
    let mut counts = Distribution::new();
    let mut total = 0usize;
    for trace in traces {
        for event in &trace.events {
            *counts.entry(event.canonical_action()).or_insert(0.0) += 1.0;
            total += 1;
        }
    }
    if total > 0 {
        for v in counts.values_mut() {
            *v /= total as f64;
        }
    }
    counts
}
