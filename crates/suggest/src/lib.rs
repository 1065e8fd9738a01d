//! Trace analytics behind policy suggestions.
//!
//! Traces are encoded into sparse [`FeatureVector`]s, grouped by the
//! [`AffinityClusterer`], summarized with risk and drift signals, and finally
//! rendered into a fixed-structure brief by [`build_brief`].
//!
//! Raw event streams are split into sessions by [`sessionize`], and
//! [`workflow_suggestions`] ranks clusters with coverage and recency scores
//! from the [`IntensityScorer`].

pub mod bakeoff;
pub mod brief;
pub mod cluster;
pub mod drift;
pub mod encoding;
pub mod scoring;
pub mod sessionize;
pub mod similarity;
pub mod summary;
pub mod vector;
pub mod workflow;

pub use bakeoff::{run_bakeoff, BakeoffCandidate, BakeoffResult};
pub use brief::{build_brief, BriefOptions, ClusterSummary};
pub use cluster::{affinity_cluster, explain, AffinityClusterer, Cluster, ClusterConfig, ClusterRun};
pub use drift::{detect_drift, event_distribution, population_stability_index, Contributor, Distribution, DriftReport};
pub use encoding::{BagOfNGrams, PrecedenceEncoder, TraceEncoder};
pub use scoring::{build_time_series, confidence, IntensityScorer, TimeSeriesPoint};
pub use sessionize::sessionize;
pub use similarity::{cosine, running_mean};
pub use summary::{member_traces, summarize_cluster, SummaryConfig};
pub use vector::FeatureVector;
pub use workflow::{workflow_suggestions, SampleRef, WorkflowOptions, WorkflowSuggestion};
