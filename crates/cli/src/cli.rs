use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Adaptive policy engine: hot-reloaded policies and trace-driven suggestions.
#[derive(Parser, Debug)]
#[command(name = "tether", version, about)]
pub struct CliArgs {
    /// Config profile; `{PROFILE}_{KEY}` env vars take precedence over `{KEY}`.
    #[arg(long, env = "TETHER_PROFILE", default_value = "", global = true)]
    pub profile: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Watch a policy file and report every reload until Ctrl-C.
    Watch {
        /// Policy file (default: POLICY_PATH or policy.cedar)
        #[arg(long)]
        policy: Option<PathBuf>,

        /// Poll interval in milliseconds (default: POLICY_POLL_INTERVAL_MS)
        #[arg(long)]
        interval_ms: Option<u64>,

        /// Use filesystem notifications to skip reads of an unchanged file
        #[arg(long)]
        notify: bool,

        /// Write the default policy first if the file does not exist
        #[arg(long)]
        init: bool,
    },

    /// Compile a policy file once and print its rules.
    Check {
        #[arg(long)]
        policy: Option<PathBuf>,

        /// Print the compiled configuration (or the error detail) as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write the default policy if the file does not exist yet.
    Init {
        #[arg(long)]
        policy: Option<PathBuf>,
    },

    /// Cluster traces and print one suggestion brief per cluster.
    Brief {
        #[command(flatten)]
        input: TraceInput,

        /// JSON object of mined patterns keyed by cluster id
        #[arg(long)]
        patterns: Option<PathBuf>,

        /// Only print the brief for this cluster
        #[arg(long)]
        cluster: Option<String>,

        #[arg(long, value_enum, default_value_t = EncoderKind::Ngrams)]
        encoder: EncoderKind,

        /// N-gram window (default: NGRAM_SIZE)
        #[arg(long)]
        ngram: Option<usize>,

        /// Similarity needed to join a cluster (default: CLUSTER_THRESHOLD)
        #[arg(long)]
        threshold: Option<f64>,

        /// Audience named in the brief (default: BRIEF_VOICE)
        #[arg(long)]
        voice: Option<String>,

        /// Maximum sequences per brief (default: BRIEF_MAX_PATTERNS)
        #[arg(long)]
        max_patterns: Option<usize>,
    },

    /// Rank clusters into workflow suggestions with coverage and recency scores.
    Suggest {
        #[command(flatten)]
        input: TraceInput,

        /// JSON object of mined patterns keyed by cluster id
        #[arg(long)]
        patterns: Option<PathBuf>,

        #[arg(long, value_enum, default_value_t = EncoderKind::Ngrams)]
        encoder: EncoderKind,

        /// Similarity needed to join a cluster (default: CLUSTER_THRESHOLD)
        #[arg(long)]
        threshold: Option<f64>,

        /// Most suggestions to print (default: MAX_CLUSTERS)
        #[arg(long)]
        max_clusters: Option<usize>,

        /// Skip clusters with fewer sessions (default: MIN_CLUSTER_SIZE)
        #[arg(long)]
        min_cluster_size: Option<usize>,

        /// Print suggestions as JSON
        #[arg(long)]
        json: bool,
    },

    /// Compare encoders and thresholds on the same traces.
    Bakeoff {
        #[arg(long)]
        traces: PathBuf,

        /// Thresholds to try; repeat the flag for several (default: CLUSTER_THRESHOLD)
        #[arg(long = "threshold")]
        thresholds: Vec<f64>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Where sessions come from: ready-made traces or a flat event log.
#[derive(Args, Debug, Clone)]
pub struct TraceInput {
    /// JSON array of traces
    #[arg(long, required_unless_present = "events", conflicts_with = "events")]
    pub traces: Option<PathBuf>,

    /// JSON array of events, split into sessions per principal
    #[arg(long)]
    pub events: Option<PathBuf>,

    /// Idle gap that ends a session, and the recency bucket width (default: SESSION_WINDOW_SECS)
    #[arg(long)]
    pub session_window_secs: Option<u64>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum EncoderKind {
    /// Bag of n-grams over canonical actions
    Ngrams,
    /// Pairwise precedence constraints
    Precedence,
}
