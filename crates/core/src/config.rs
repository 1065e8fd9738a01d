use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default policy file polled by the watcher.
pub const DEFAULT_POLICY_PATH: &str = "policy.cedar";
/// Default watcher poll interval in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
/// Default window size for the bag-of-n-grams encoder.
pub const DEFAULT_NGRAM_SIZE: usize = 2;
/// Default cosine similarity needed to join an existing cluster.
pub const DEFAULT_CLUSTER_THRESHOLD: f64 = 0.65;
/// Default population stability index above which a cluster is flagged.
pub const DEFAULT_DRIFT_THRESHOLD: f64 = 0.25;
/// Default audience named in the suggestion brief.
pub const DEFAULT_BRIEF_VOICE: &str = "security engineer";
/// Default number of mined sequences listed in a brief.
pub const DEFAULT_BRIEF_MAX_PATTERNS: usize = 3;
/// Default idle gap, in seconds, that ends a principal's session.
pub const DEFAULT_SESSION_WINDOW_SECS: u64 = 600;
/// Default cap on workflow suggestions per analysis run.
pub const DEFAULT_MAX_CLUSTERS: usize = 8;
/// Default minimum member sessions for a cluster to be suggested.
pub const DEFAULT_MIN_CLUSTER_SIZE: usize = 2;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_parse<T: std::str::FromStr>(profile: &str, key: &str, default: T) -> T {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub policy: PolicyConfig,
    pub analysis: AnalysisConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `TETHER_PROFILE` env var. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("TETHER_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            policy: PolicyConfig::from_env_profiled(p),
            analysis: AnalysisConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  policy:    path={}, poll_interval_ms={}",
            self.policy.path.display(),
            self.policy.poll_interval_ms
        );
        tracing::info!(
            "  analysis:  ngram_size={}, cluster_threshold={}, drift_threshold={}",
            self.analysis.ngram_size,
            self.analysis.cluster_threshold,
            self.analysis.drift_threshold
        );
        tracing::info!(
            "  workflow:  session_window_secs={}, max_clusters={}, min_cluster_size={}",
            self.analysis.session_window_secs,
            self.analysis.max_clusters,
            self.analysis.min_cluster_size
        );
        tracing::info!(
            "  brief:     voice={:?}, max_patterns={}",
            self.analysis.brief_voice,
            self.analysis.brief_max_patterns
        );
    }
}

// ── Policy hot-reload ─────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    pub path: PathBuf,
    pub poll_interval_ms: u64,
}

impl PolicyConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            path: PathBuf::from(profiled_env_or(p, "POLICY_PATH", DEFAULT_POLICY_PATH)),
            poll_interval_ms: profiled_env_parse(p, "POLICY_POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL_MS),
        }
    }

    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_POLICY_PATH),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

// ── Trace analysis ────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub ngram_size: usize,
    pub cluster_threshold: f64,
    pub drift_threshold: f64,
    pub brief_voice: String,
    pub brief_max_patterns: usize,
    pub session_window_secs: u64,
    pub max_clusters: usize,
    pub min_cluster_size: usize,
}

impl AnalysisConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            ngram_size: profiled_env_parse(p, "NGRAM_SIZE", DEFAULT_NGRAM_SIZE),
            cluster_threshold: profiled_env_parse(p, "CLUSTER_THRESHOLD", DEFAULT_CLUSTER_THRESHOLD),
            drift_threshold: profiled_env_parse(p, "DRIFT_THRESHOLD", DEFAULT_DRIFT_THRESHOLD),
            brief_voice: profiled_env_or(p, "BRIEF_VOICE", DEFAULT_BRIEF_VOICE),
            brief_max_patterns: profiled_env_parse(p, "BRIEF_MAX_PATTERNS", DEFAULT_BRIEF_MAX_PATTERNS),
            session_window_secs: profiled_env_parse(p, "SESSION_WINDOW_SECS", DEFAULT_SESSION_WINDOW_SECS),
            max_clusters: profiled_env_parse(p, "MAX_CLUSTERS", DEFAULT_MAX_CLUSTERS),
            min_cluster_size: profiled_env_parse(p, "MIN_CLUSTER_SIZE", DEFAULT_MIN_CLUSTER_SIZE),
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            ngram_size: DEFAULT_NGRAM_SIZE,
            cluster_threshold: DEFAULT_CLUSTER_THRESHOLD,
            drift_threshold: DEFAULT_DRIFT_THRESHOLD,
            brief_voice: DEFAULT_BRIEF_VOICE.to_string(),
            brief_max_patterns: DEFAULT_BRIEF_MAX_PATTERNS,
            session_window_secs: DEFAULT_SESSION_WINDOW_SECS,
            max_clusters: DEFAULT_MAX_CLUSTERS,
            min_cluster_size: DEFAULT_MIN_CLUSTER_SIZE,
        }
    }
}
