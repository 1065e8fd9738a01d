//! Plain-text briefs asking a policy author to label a workflow cluster.

use serde::{Deserialize, Serialize};
use tether_core::config::{AnalysisConfig, DEFAULT_BRIEF_MAX_PATTERNS, DEFAULT_BRIEF_VOICE};
use tether_core::Pattern;

use crate::cluster::Cluster;

pub const CLUSTER_HEADER: &str = "## Observed Workflow Cluster";
pub const SEQUENCES_HEADER: &str = "## Frequent Sequences";
pub const TASKS_HEADER: &str = "## Tasks";

const NO_SEQUENCES: &str = "No frequent sequences were mined for this cluster.";

const TASKS: [&str; 4] = [
    "Summarize the workflow in plain language, explaining the goal and involved resources.",
    "Highlight safety considerations and residual risks.",
    "Draft up to two Cedar policy statements that allow the workflow while minimizing over-broad access.",
    "Provide a short validation checklist for the operator (e.g., logs, environment constraints).",
];

/// Everything a brief says about one cluster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterSummary {
    pub cluster: Cluster,
    /// Mined sequences, most supported first.
    pub patterns: Vec<Pattern>,
    pub support: usize,
    pub risk_tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BriefOptions {
    /// Audience named in the preamble.
    pub target_voice: String,
    /// Upper bound on listed sequences.
    pub max_patterns: usize,
}

impl BriefOptions {
    pub fn from_analysis(analysis: &AnalysisConfig) -> Self {
        Self {
            target_voice: analysis.brief_voice.clone(),
            max_patterns: analysis.brief_max_patterns,
        }
    }

    fn voice(&self) -> &str {
        let voice = self.target_voice.trim();
        if voice.is_empty() {
            DEFAULT_BRIEF_VOICE
        } else {
            voice
        }
    }

    fn pattern_limit(&self) -> usize {
        if self.max_patterns == 0 {
            DEFAULT_BRIEF_MAX_PATTERNS
        } else {
            self.max_patterns
        }
    }
}

impl Default for BriefOptions {
    fn default() -> Self {
        Self {
            target_voice: DEFAULT_BRIEF_VOICE.to_string(),
            max_patterns: DEFAULT_BRIEF_MAX_PATTERNS,
        }
    }
}

/// Render the brief for `summary`.
///
/// The output always has the same three sections in the same order, so
/// downstream tooling can split on the headers.
pub fn build_brief(summary: &ClusterSummary, options: &BriefOptions) -> String {
    let cluster = &summary.cluster;
    let mut out = String::new();

    out.push_str(&format!(
        "You are an expert Cedar policy author assisting a {}.\n\n",
        options.voice()
    ));

    out.push_str(CLUSTER_HEADER);
    out.push('\n');
    out.push_str(&format!("- Cluster ID: {}\n", cluster.id));
    out.push_str(&format!("- Sessions: {}\n", cluster.members.join(", ")));
    out.push_str(&format!("- Representative workflow: {}\n", cluster.explanation));
    out.push_str(&format!("- Aggregate support: {}\n", summary.support));
    if !summary.risk_tags.is_empty() {
        out.push_str(&format!("- Risk signals: {}\n", summary.risk_tags.join(", ")));
    }

    out.push('\n');
    out.push_str(SEQUENCES_HEADER);
    out.push('\n');
    if summary.patterns.is_empty() {
        out.push_str(NO_SEQUENCES);
        out.push('\n');
    }
    for (i, pattern) in summary.patterns.iter().take(options.pattern_limit()).enumerate() {
        out.push_str(&format!(
            "{}. {} (support: {} sessions)\n",
            i + 1,
            pattern.tokens.join(" -> "),
            pattern.support
        ));
    }

    out.push('\n');
    out.push_str(TASKS_HEADER);
    out.push('\n');
    for (i, task) in TASKS.iter().enumerate() {
        out.push_str(&format!("{}. {}\n", i + 1, task));
    }

    out
}
