//! Side-by-side comparison of encoder/threshold combinations.

use std::sync::Arc;

use rayon::prelude::*;
use serde::Serialize;
use tether_core::Trace;
use tracing::info;

use crate::cluster::{AffinityClusterer, ClusterConfig};
use crate::encoding::TraceEncoder;
use crate::similarity::cosine;

/// One clustering setup to evaluate.
#[derive(Clone)]
pub struct BakeoffCandidate {
    pub encoder: Arc<dyn TraceEncoder>,
    pub threshold: f64,
}

impl BakeoffCandidate {
    pub fn new(encoder: Arc<dyn TraceEncoder>, threshold: f64) -> Self {
        Self { encoder, threshold }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BakeoffResult {
    pub encoder: String,
    /// Threshold actually applied, after defaulting.
    pub threshold: f64,
    pub cluster_count: usize,
    /// Cluster sizes in creation order.
    pub cluster_sizes: Vec<usize>,
    /// Mean cosine similarity of each trace to its cluster's centroid.
    pub cohesion: f64,
}

/// Cluster `traces` once per candidate.
///
/// Runs are independent and execute on the rayon pool; results come back in
/// candidate order.
pub fn run_bakeoff(traces: &[Trace], candidates: &[BakeoffCandidate]) -> Vec<BakeoffResult> {
    let results: Vec<BakeoffResult> = candidates
        .par_iter()
        .map(|candidate| evaluate(traces, candidate))
        .collect();

    for r in &results {
        info!(
            encoder = %r.encoder,
            threshold = r.threshold,
            clusters = r.cluster_count,
            cohesion = r.cohesion,
            "Bake-off run complete"
        );
    }
    results
}

fn evaluate(traces: &[Trace], candidate: &BakeoffCandidate) -> BakeoffResult {
    let encoder = candidate.encoder.as_ref();
    let config = ClusterConfig::new(candidate.threshold);
    let run = AffinityClusterer::new(encoder, config).run(traces);

    let cohesion = if traces.is_empty() {
        0.0
    } else {
        let total: f64 = traces
            .iter()
            .zip(&run.assignments)
            .map(|(trace, &idx)| cosine(&encoder.encode(trace), &run.clusters[idx].centroid))
            .sum();
        total / traces.len() as f64
    };

    BakeoffResult {
        encoder: encoder.name().to_string(),
        threshold: config.effective_threshold(),
        cluster_count: run.clusters.len(),
        cluster_sizes: run.clusters.iter().map(|c| c.size()).collect(),
        cohesion,
    }
}

#[cfg(test)]
mod tests {
    use tether_core::Event;

    use super::*;
    use crate::encoding::{BagOfNGrams, PrecedenceEncoder};

    fn traces() -> Vec<Trace> {
        let build = ["filesystem:open:unix.file", "filesystem:read:unix.file", "process:exec:unix.binary"];
        let fetch = ["network:connect:net.host", "network:send:net.host"];
        let mk = |id: &str, actions: &[&str]| {
            Trace::new(
                id,
                actions
                    .iter()
                    .map(|a| {
                        let p: Vec<&str> = a.split(':').collect();
                        Event::new("alice", p[0], p[1], p[2])
                    })
                    .collect(),
            )
        };
        vec![mk("s1", &build), mk("s2", &fetch), mk("s3", &build), mk("s4", &fetch)]
    }

    #[test]
    fn results_follow_candidate_order() {
        let candidates = vec![
            BakeoffCandidate::new(Arc::new(PrecedenceEncoder), 0.5),
            BakeoffCandidate::new(Arc::new(BagOfNGrams::new(2)), 0.65),
            BakeoffCandidate::new(Arc::new(BagOfNGrams::new(1)), 0.0),
        ];
        let results = run_bakeoff(&traces(), &candidates);

        let names: Vec<_> = results.iter().map(|r| r.encoder.as_str()).collect();
        assert_eq!(names, vec!["precedence", "bag-of-2-grams", "bag-of-1-grams"]);
        assert_eq!(results[2].threshold, 0.65);
    }

    #[test]
    fn separable_workflows_are_fully_cohesive() {
        let candidates = vec![BakeoffCandidate::new(Arc::new(BagOfNGrams::default()), 0.65)];
        let results = run_bakeoff(&traces(), &candidates);
        assert_eq!(results[0].cluster_count, 2);
        assert_eq!(results[0].cluster_sizes, vec![2, 2]);
        assert!((results[0].cohesion - 1.0).abs() < 1e-9);
    }

    #[test]
    fn empty_input_has_zero_cohesion() {
        let candidates = vec![BakeoffCandidate::new(Arc::new(PrecedenceEncoder), 0.65)];
        let results = run_bakeoff(&[], &candidates);
        assert_eq!(results[0].cluster_count, 0);
        assert_eq!(results[0].cohesion, 0.0);
    }
}
