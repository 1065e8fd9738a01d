//! Trace → feature vector encoders.

use tether_core::config::DEFAULT_NGRAM_SIZE;
use tether_core::Trace;

use crate::vector::FeatureVector;

/// Joins the tokens of an n-gram window.
pub const NGRAM_SEPARATOR: &str = "→";
/// Joins the two sides of a precedence pair.
pub const PRECEDENCE_SEPARATOR: &str = "≺";

/// Maps a trace to a sparse feature vector.
///
/// Encoders are pure and total: every trace, including an empty one, encodes
/// to a vector with non-negative finite weights.
pub trait TraceEncoder: Send + Sync {
    /// Short identifier used in logs and bake-off reports.
    fn name(&self) -> &str;

    fn encode(&self, trace: &Trace) -> FeatureVector;
}

/// Normalized histogram of sliding windows of `n` canonical actions.
#[derive(Debug, Clone)]
pub struct BagOfNGrams {
    n: usize,
    name: String,
}

impl BagOfNGrams {
    /// Window size `n`; zero falls back to the default of 2.
    pub fn new(n: usize) -> Self {
        let n = if n == 0 { DEFAULT_NGRAM_SIZE } else { n };
        Self {
            n,
            name: format!("bag-of-{n}-grams"),
        }
    }

    /// Like [`BagOfNGrams::new`] but also maps negative sizes to the default.
    pub fn from_signed(n: i64) -> Self {
        Self::new(usize::try_from(n).unwrap_or(0))
    }

    pub fn n(&self) -> usize {
        self.n
    }
}

impl Default for BagOfNGrams {
    fn default() -> Self {
        Self::new(DEFAULT_NGRAM_SIZE)
    }
}

impl TraceEncoder for BagOfNGrams {
    fn name(&self) -> &str {
        &self.name
    }

    fn encode(&self, trace: &Trace) -> FeatureVector {
        let tokens = trace.canonical_actions();
        let mut vector = FeatureVector::new();
        if tokens.len() < self.n {
            return vector;
        }

        let windows = tokens.windows(self.n);
        let total = windows.len();
        for window in windows {
            vector.add(window.join(NGRAM_SEPARATOR), 1.0);
        }
        vector.scale_down(total as f64);
        vector
    }
}

/// Pairwise ordering constraints weighted by inverse distance.
///
/// Every ordered pair `(i, j)` with `i < j` adds `1 / (j - i)` to the key
/// `action_i ≺ action_j`. Weights are not normalized.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrecedenceEncoder;

impl TraceEncoder for PrecedenceEncoder {
    fn name(&self) -> &str {
        "precedence"
    }

    fn encode(&self, trace: &Trace) -> FeatureVector {
        let tokens = trace.canonical_actions();
        let mut vector = FeatureVector::new();
        for (i, lhs) in tokens.iter().enumerate() {
            for (gap, rhs) in tokens[i + 1..].iter().enumerate() {
                let key = format!("{lhs}{PRECEDENCE_SEPARATOR}{rhs}");
                vector.add(key, 1.0 / (gap + 1) as f64);
            }
        }
        vector
    }
}
