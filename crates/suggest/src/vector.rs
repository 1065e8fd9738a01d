use std::collections::btree_map;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Sparse feature vector keyed by feature token.
///
/// Absent keys read as zero. Keys iterate in sorted order, so every sum over
/// a vector is accumulated in the same order from run to run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureVector(BTreeMap<String, f64>);

impl FeatureVector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Weight for `key`, zero when absent.
    pub fn get(&self, key: &str) -> f64 {
        self.0.get(key).copied().unwrap_or(0.0)
    }

    /// Add `weight` to the entry for `key`.
    pub fn add(&mut self, key: impl Into<String>, weight: f64) {
        debug_assert!(weight.is_finite() && weight >= 0.0, "invalid weight {weight}");
        *self.0.entry(key.into()).or_insert(0.0) += weight;
    }

    pub fn insert(&mut self, key: impl Into<String>, weight: f64) {
        debug_assert!(weight.is_finite() && weight >= 0.0, "invalid weight {weight}");
        self.0.insert(key.into(), weight);
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, f64> {
        self.0.iter()
    }

    pub fn keys(&self) -> btree_map::Keys<'_, String, f64> {
        self.0.keys()
    }

    /// Sum of all weights.
    pub fn total(&self) -> f64 {
        self.0.values().sum()
    }

    /// Euclidean norm.
    pub fn norm(&self) -> f64 {
        self.0.values().map(|v| v * v).sum::<f64>().sqrt()
    }

    /// Divide every weight by `divisor`. No-op for non-positive divisors.
    pub fn scale_down(&mut self, divisor: f64) {
        if divisor > 0.0 {
            for v in self.0.values_mut() {
                *v /= divisor;
            }
        }
    }
}

impl FromIterator<(String, f64)> for FeatureVector {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        let mut vector = FeatureVector::new();
        for (key, weight) in iter {
            vector.add(key, weight);
        }
        vector
    }
}

impl<'a> IntoIterator for &'a FeatureVector {
    type Item = (&'a String, &'a f64);
    type IntoIter = btree_map::Iter<'a, String, f64>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
