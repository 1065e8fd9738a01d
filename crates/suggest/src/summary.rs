//! Builds [`ClusterSummary`] values from clustering output and mined patterns.

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use tether_core::config::{AnalysisConfig, DEFAULT_DRIFT_THRESHOLD};
use tether_core::{Pattern, Trace};

use crate::brief::ClusterSummary;
use crate::cluster::Cluster;
use crate::drift::{detect_drift, event_distribution};

pub const TAG_NETWORK_EGRESS: &str = "network-egress";
pub const TAG_PROCESS_EXECUTION: &str = "process-execution";
pub const TAG_WRITE_ACCESS: &str = "write-access";

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SummaryConfig {
    /// PSI above which a cluster is tagged as drifting from the population.
    pub drift_threshold: f64,
}

impl SummaryConfig {
    pub fn from_analysis(analysis: &AnalysisConfig) -> Self {
        Self {
            drift_threshold: analysis.drift_threshold,
        }
    }
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            drift_threshold: DEFAULT_DRIFT_THRESHOLD,
        }
    }
}

/// Traces from `traces` whose session belongs to `cluster`, in input order.
pub fn member_traces<'a>(cluster: &Cluster, traces: &'a [Trace]) -> Vec<&'a Trace> {
    let members: HashSet<&str> = cluster.members.iter().map(String::as_str).collect();
    traces
        .iter()
        .filter(|t| members.contains(t.session_id.as_str()))
        .collect()
}

/// Assemble the summary a brief is rendered from.
///
/// `population` is every trace that was clustered; the cluster's action
/// distribution is compared against it for the drift tag.
pub fn summarize_cluster(
    cluster: &Cluster,
    members: &[&Trace],
    population: &[Trace],
    patterns: &[Pattern],
    config: &SummaryConfig,
) -> ClusterSummary {
    let mut tags = BTreeSet::new();
    for event in members.iter().flat_map(|t| t.events.iter()) {
        let family = event.action_family.to_lowercase();
        let name = event.action_name.to_lowercase();
        if family == "network" {
            tags.insert(TAG_NETWORK_EGRESS.to_string());
        }
        if name == "exec" {
            tags.insert(TAG_PROCESS_EXECUTION.to_string());
        }
        if name.contains("write") {
            tags.insert(TAG_WRITE_ACCESS.to_string());
        }
    }

    if !members.is_empty() && !population.is_empty() {
        let report = detect_drift(
            &event_distribution(population),
            &event_distribution(members.iter().copied()),
            config.drift_threshold,
        );
        if report.is_drift {
            tags.insert(format!("behavior-drift (psi={:.3})", report.psi));
        }
    }

    ClusterSummary {
        cluster: cluster.clone(),
        patterns: patterns.to_vec(),
        support: cluster.members.len(),
        risk_tags: tags.into_iter().collect(),
    }
}
