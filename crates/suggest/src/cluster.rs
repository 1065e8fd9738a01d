//! Single-pass affinity clustering of traces by cosine similarity.

use serde::{Deserialize, Serialize};
use tether_core::config::{AnalysisConfig, DEFAULT_CLUSTER_THRESHOLD};
use tether_core::Trace;
use tracing::debug;

use crate::encoding::TraceEncoder;
use crate::similarity::{cosine, running_mean};
use crate::vector::FeatureVector;

/// A group of behaviorally similar sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cluster {
    /// `cluster-1`, `cluster-2`, ... in creation order.
    pub id: String,
    /// Session ids, sorted.
    pub members: Vec<String>,
    /// Arithmetic mean of the member vectors.
    pub centroid: FeatureVector,
    pub explanation: String,
    /// The trace that opened the cluster.
    pub representative: Trace,
}

impl Cluster {
    pub fn size(&self) -> usize {
        self.members.len()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Minimum cosine similarity needed to join an existing cluster.
    pub threshold: f64,
}

impl ClusterConfig {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn from_analysis(analysis: &AnalysisConfig) -> Self {
        Self::new(analysis.cluster_threshold)
    }

    /// The configured threshold, or the default when it is not a positive
    /// finite number.
    pub fn effective_threshold(&self) -> f64 {
        if self.threshold.is_finite() && self.threshold > 0.0 {
            self.threshold
        } else {
            DEFAULT_CLUSTER_THRESHOLD
        }
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self::new(DEFAULT_CLUSTER_THRESHOLD)
    }
}

/// Clusters plus, for each input trace, the index of the cluster it joined.
#[derive(Debug, Clone)]
pub struct ClusterRun {
    pub clusters: Vec<Cluster>,
    pub assignments: Vec<usize>,
}

/// Greedy clusterer: each trace joins the most similar existing cluster, or
/// opens a new one when nothing is similar enough.
///
/// Results depend on input order. Ties go to the earliest-created cluster.
pub struct AffinityClusterer<'a> {
    encoder: &'a dyn TraceEncoder,
    config: ClusterConfig,
}

impl<'a> AffinityClusterer<'a> {
    pub fn new(encoder: &'a dyn TraceEncoder, config: ClusterConfig) -> Self {
        Self { encoder, config }
    }

    pub fn cluster(&self, traces: &[Trace]) -> Vec<Cluster> {
        self.run(traces).clusters
    }

    pub fn run(&self, traces: &[Trace]) -> ClusterRun {
        let threshold = self.config.effective_threshold();
        let mut clusters: Vec<Cluster> = Vec::new();
        let mut assignments = Vec::with_capacity(traces.len());

        for trace in traces {
            let vector = self.encoder.encode(trace);

            let mut best: Option<(usize, f64)> = None;
            for (idx, cluster) in clusters.iter().enumerate() {
                let score = cosine(&vector, &cluster.centroid);
                if best.map_or(true, |(_, top)| score > top) {
                    best = Some((idx, score));
                }
            }

            match best {
                Some((idx, score)) if score >= threshold => {
                    let cluster = &mut clusters[idx];
                    cluster.members.push(trace.session_id.clone());
                    cluster.centroid = running_mean(&cluster.centroid, &vector, cluster.members.len());
                    assignments.push(idx);
                }
                _ => {
                    assignments.push(clusters.len());
                    clusters.push(Cluster {
                        id: format!("cluster-{}", clusters.len() + 1),
                        members: vec![trace.session_id.clone()],
                        centroid: vector,
                        explanation: explain(trace),
                        representative: trace.clone(),
                    });
                }
            }
        }

        for cluster in &mut clusters {
            cluster.members.sort();
        }

        debug!(
            encoder = self.encoder.name(),
            threshold,
            traces = traces.len(),
            clusters = clusters.len(),
            "Affinity clustering complete"
        );
        ClusterRun { clusters, assignments }
    }
}

/// Cluster `traces` with `encoder` at `threshold` (non-positive or non-finite
/// means 0.65).
pub fn affinity_cluster(traces: &[Trace], encoder: &dyn TraceEncoder, threshold: f64) -> Vec<Cluster> {
    AffinityClusterer::new(encoder, ClusterConfig::new(threshold)).cluster(traces)
}

/// One-line description of a trace: first and last action plus principal.
pub fn explain(trace: &Trace) -> String {
    match (trace.events.first(), trace.events.last()) {
        (Some(first), Some(last)) => format!(
            "workflow from {} to {}; principal {}",
            first.canonical_action(),
            last.canonical_action(),
            first.principal_id
        ),
        _ => "empty trace".to_string(),
    }
}
