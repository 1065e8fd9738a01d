//! Ranked workflow suggestions.
//!
//! Clusters the sessions, keeps the largest ones, and attaches the evidence an
//! operator needs to judge each: coverage of principals, recency of activity,
//! drift from the overall population, the top mined sequence, and a few
//! sample actions.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::Duration;
use serde::{Deserialize, Serialize};
use tether_core::config::{
    AnalysisConfig, DEFAULT_CLUSTER_THRESHOLD, DEFAULT_DRIFT_THRESHOLD, DEFAULT_MAX_CLUSTERS,
    DEFAULT_MIN_CLUSTER_SIZE, DEFAULT_SESSION_WINDOW_SECS,
};
use tether_core::{Pattern, Trace};
use tracing::{debug, info};

use crate::cluster::{AffinityClusterer, ClusterConfig};
use crate::drift::{detect_drift, event_distribution};
use crate::encoding::TraceEncoder;
use crate::scoring::{build_time_series, confidence, IntensityScorer};

/// Sample actions attached to each suggestion.
pub const MAX_SAMPLE_REFS: usize = 4;

#[derive(Debug, Clone)]
pub struct WorkflowOptions {
    pub cluster_threshold: f64,
    /// Bucket width for recency scoring, and the scorer's half-life. Zero
    /// means ten minutes.
    pub session_window: Duration,
    pub drift_threshold: f64,
    /// Upper bound on returned suggestions.
    pub max_clusters: usize,
    /// Clusters with fewer member sessions are skipped.
    pub min_cluster_size: usize,
}

impl WorkflowOptions {
    pub fn from_analysis(analysis: &AnalysisConfig) -> Self {
        Self {
            cluster_threshold: analysis.cluster_threshold,
            session_window: i64::try_from(analysis.session_window_secs)
                .ok()
                .and_then(Duration::try_seconds)
                .unwrap_or_else(Duration::zero),
            drift_threshold: analysis.drift_threshold,
            max_clusters: analysis.max_clusters,
            min_cluster_size: analysis.min_cluster_size,
        }
    }

    fn window(&self) -> Duration {
        if self.session_window > Duration::zero() {
            self.session_window
        } else {
            Duration::seconds(DEFAULT_SESSION_WINDOW_SECS as i64)
        }
    }

    fn max_clusters(&self) -> usize {
        if self.max_clusters == 0 { DEFAULT_MAX_CLUSTERS } else { self.max_clusters }
    }

    fn min_cluster_size(&self) -> usize {
        if self.min_cluster_size == 0 { DEFAULT_MIN_CLUSTER_SIZE } else { self.min_cluster_size }
    }
}

impl Default for WorkflowOptions {
    fn default() -> Self {
        Self {
            cluster_threshold: DEFAULT_CLUSTER_THRESHOLD,
            session_window: Duration::seconds(DEFAULT_SESSION_WINDOW_SECS as i64),
            drift_threshold: DEFAULT_DRIFT_THRESHOLD,
            max_clusters: DEFAULT_MAX_CLUSTERS,
            min_cluster_size: DEFAULT_MIN_CLUSTER_SIZE,
        }
    }
}

/// The last action of one member session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleRef {
    /// Observed outcome, `permit` when the event carried none.
    pub effect: String,
    pub operation: String,
    pub target: Option<String>,
    pub resource_class: String,
    pub session: String,
    pub principal: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowSuggestion {
    pub cluster_id: String,
    pub summary: String,
    pub session_count: usize,
    pub principal_count: usize,
    pub coverage_score: f64,
    pub recency_score: f64,
    pub confidence: f64,
    /// Most supported mined sequence, joined with ` -> `.
    pub top_pattern: Option<String>,
    pub top_support: Option<usize>,
    pub psi: f64,
    pub drift: bool,
    pub members: Vec<String>,
    pub sample_refs: Vec<SampleRef>,
}

fn principal_of(trace: &Trace) -> Option<&str> {
    trace
        .principal
        .as_deref()
        .filter(|p| !p.is_empty())
        .or_else(|| trace.events.first().map(|e| e.principal_id.as_str()).filter(|p| !p.is_empty()))
}

fn principal_set<'a>(traces: impl IntoIterator<Item = &'a Trace>) -> BTreeSet<&'a str> {
    traces.into_iter().filter_map(principal_of).collect()
}

fn sample_refs(members: &[&Trace]) -> Vec<SampleRef> {
    members
        .iter()
        .filter_map(|trace| {
            let last = trace.events.last()?;
            let effect = last
                .outcome
                .as_deref()
                .map(str::to_lowercase)
                .filter(|o| !o.is_empty())
                .unwrap_or_else(|| "permit".to_string());
            Some(SampleRef {
                effect,
                operation: last.action_name.clone(),
                target: last.resource_facet.clone(),
                resource_class: last.resource_class.clone(),
                session: trace.session_id.clone(),
                principal: principal_of(trace).map(str::to_string),
            })
        })
        .take(MAX_SAMPLE_REFS)
        .collect()
}

/// Cluster `traces` and turn the largest clusters into scored suggestions.
///
/// Empty traces are ignored and each trace's events are put in timestamp
/// order before encoding. Clusters are ranked by member count (stable, so
/// creation order breaks ties); those smaller than `min_cluster_size` are
/// skipped and at most `max_clusters` are returned. `patterns` is keyed by
/// cluster id; a cluster without mined patterns is still suggested, with no
/// top pattern.
pub fn workflow_suggestions(
    traces: &[Trace],
    patterns: &BTreeMap<String, Vec<Pattern>>,
    encoder: &dyn TraceEncoder,
    options: &WorkflowOptions,
) -> Vec<WorkflowSuggestion> {
    let prepared: Vec<Trace> = traces
        .iter()
        .filter(|t| !t.is_empty())
        .cloned()
        .map(|mut t| {
            t.events.sort_by_key(|e| e.timestamp);
            t
        })
        .collect();
    if prepared.is_empty() {
        return Vec::new();
    }

    let mut clusters = AffinityClusterer::new(encoder, ClusterConfig::new(options.cluster_threshold)).cluster(&prepared);
    clusters.sort_by(|a, b| b.size().cmp(&a.size()));

    let index: HashMap<&str, &Trace> = prepared.iter().map(|t| (t.session_id.as_str(), t)).collect();
    let all_principals = principal_set(&prepared);
    let overall = event_distribution(&prepared);
    let window = options.window();
    let scorer = IntensityScorer::for_window(window);

    let mut out = Vec::new();
    for cluster in &clusters {
        let members: Vec<&Trace> = cluster
            .members
            .iter()
            .filter_map(|id| index.get(id.as_str()).copied())
            .collect();
        if members.len() < options.min_cluster_size() {
            debug!(cluster = %cluster.id, size = members.len(), "Skipping small cluster");
            continue;
        }

        let principals = principal_set(members.iter().copied());
        let series = build_time_series(members.iter().copied(), window);
        let (coverage_score, recency_score) = scorer.score(&series, principals.len(), all_principals.len());
        let drift = detect_drift(&overall, &event_distribution(members.iter().copied()), options.drift_threshold);
        let top = patterns.get(&cluster.id).and_then(|p| p.first());

        out.push(WorkflowSuggestion {
            cluster_id: cluster.id.clone(),
            summary: format!("Workflow {} ({} sessions)", cluster.id, cluster.size()),
            session_count: cluster.size(),
            principal_count: principals.len(),
            coverage_score,
            recency_score,
            confidence: confidence(coverage_score, recency_score),
            top_pattern: top.map(|p| p.tokens.join(" -> ")),
            top_support: top.map(|p| p.support),
            psi: drift.psi,
            drift: drift.is_drift,
            members: cluster.members.clone(),
            sample_refs: sample_refs(&members),
        });
        if out.len() >= options.max_clusters() {
            break;
        }
    }

    info!(
        encoder = encoder.name(),
        traces = prepared.len(),
        clusters = clusters.len(),
        suggestions = out.len(),
        "Workflow suggestions ranked"
    );
    out
}
