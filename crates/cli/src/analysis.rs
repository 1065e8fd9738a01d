//! `brief`, `suggest` and `bakeoff` subcommands.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::info;

use tether_core::config::AnalysisConfig;
use tether_core::pattern::load_patterns;
use tether_core::trace::{load_events, load_traces};
use tether_core::{Pattern, Trace};
use tether_suggest::{
    build_brief, member_traces, run_bakeoff, sessionize, summarize_cluster, workflow_suggestions,
    AffinityClusterer, BagOfNGrams, BakeoffCandidate, BriefOptions, ClusterConfig, PrecedenceEncoder,
    SummaryConfig, TraceEncoder, WorkflowOptions, WorkflowSuggestion,
};

use crate::cli::{EncoderKind, TraceInput};

pub struct BriefRequest<'a> {
    pub input: &'a TraceInput,
    pub patterns: Option<&'a Path>,
    pub cluster: Option<&'a str>,
    pub encoder: EncoderKind,
}

pub struct SuggestRequest<'a> {
    pub input: &'a TraceInput,
    pub patterns: Option<&'a Path>,
    pub encoder: EncoderKind,
    pub json: bool,
}

fn read_traces(path: &Path) -> Result<Vec<Trace>> {
    let traces = load_traces(path).with_context(|| format!("failed to load traces from {}", path.display()))?;
    info!(path = %path.display(), traces = traces.len(), "Loaded traces");
    Ok(traces)
}

/// Traces from `--traces`, or sessions cut from the `--events` log.
fn read_input(input: &TraceInput, analysis: &AnalysisConfig) -> Result<Vec<Trace>> {
    if let Some(path) = &input.traces {
        return read_traces(path);
    }
    let Some(path) = &input.events else {
        bail!("either --traces or --events is required");
    };
    let events = load_events(path).with_context(|| format!("failed to load events from {}", path.display()))?;
    let window = WorkflowOptions::from_analysis(analysis).session_window;
    let traces = sessionize(&events, window);
    info!(
        path = %path.display(),
        events = events.len(),
        sessions = traces.len(),
        "Sessionized events"
    );
    Ok(traces)
}

fn read_patterns(path: Option<&Path>) -> Result<BTreeMap<String, Vec<Pattern>>> {
    match path {
        Some(path) => load_patterns(path).with_context(|| format!("failed to load patterns from {}", path.display())),
        None => Ok(BTreeMap::new()),
    }
}

fn encoder_for(kind: EncoderKind, analysis: &AnalysisConfig) -> Arc<dyn TraceEncoder> {
    match kind {
        EncoderKind::Ngrams => Arc::new(BagOfNGrams::new(analysis.ngram_size)),
        EncoderKind::Precedence => Arc::new(PrecedenceEncoder),
    }
}

pub fn brief(analysis: &AnalysisConfig, request: BriefRequest<'_>) -> Result<()> {
    let traces = read_input(request.input, analysis)?;
    let patterns = read_patterns(request.patterns)?;

    let encoder = encoder_for(request.encoder, analysis);
    let clusters = AffinityClusterer::new(encoder.as_ref(), ClusterConfig::from_analysis(analysis)).cluster(&traces);
    info!(encoder = encoder.name(), clusters = clusters.len(), "Clustered traces");

    let selected: Vec<_> = clusters
        .iter()
        .filter(|c| request.cluster.map_or(true, |id| c.id == id))
        .collect();
    if let (Some(id), true) = (request.cluster, selected.is_empty()) {
        bail!("no cluster named {id:?} (found {} clusters)", clusters.len());
    }

    let summary_config = SummaryConfig::from_analysis(analysis);
    let options = BriefOptions::from_analysis(analysis);
    for (i, cluster) in selected.into_iter().enumerate() {
        let members = member_traces(cluster, &traces);
        let cluster_patterns = patterns.get(&cluster.id).map(Vec::as_slice).unwrap_or_default();
        let summary = summarize_cluster(cluster, &members, &traces, cluster_patterns, &summary_config);
        if i > 0 {
            println!("\n---\n");
        }
        print!("{}", build_brief(&summary, &options));
    }
    Ok(())
}

pub fn suggest(analysis: &AnalysisConfig, request: SuggestRequest<'_>) -> Result<()> {
    let traces = read_input(request.input, analysis)?;
    let patterns = read_patterns(request.patterns)?;
    let encoder = encoder_for(request.encoder, analysis);
    let suggestions = workflow_suggestions(
        &traces,
        &patterns,
        encoder.as_ref(),
        &WorkflowOptions::from_analysis(analysis),
    );

    if request.json {
        println!("{}", serde_json::to_string_pretty(&suggestions)?);
    } else {
        print!("{}", render_suggestions(&suggestions));
    }
    Ok(())
}

fn render_suggestions(suggestions: &[WorkflowSuggestion]) -> String {
    let mut out = format!(
        "{:<12} {:>8} {:>10} {:>8} {:>8} {:>10} {:>7}  top pattern\n",
        "cluster", "sessions", "principals", "coverage", "recency", "confidence", "psi"
    );
    for s in suggestions {
        let drift = if s.drift { " (drift)" } else { "" };
        out.push_str(&format!(
            "{:<12} {:>8} {:>10} {:>8.3} {:>8.3} {:>10.3} {:>7.3}{drift}  {}\n",
            s.cluster_id,
            s.session_count,
            s.principal_count,
            s.coverage_score,
            s.recency_score,
            s.confidence,
            s.psi,
            s.top_pattern.as_deref().unwrap_or("-"),
        ));
        for sample in &s.sample_refs {
            out.push_str(&format!(
                "    {} {} {} ({})\n",
                sample.effect,
                sample.operation,
                sample.target.as_deref().unwrap_or(&sample.resource_class),
                sample.session
            ));
        }
    }
    out
}

pub fn bakeoff(analysis: &AnalysisConfig, traces_path: &Path, thresholds: &[f64], json: bool) -> Result<()> {
    let traces = read_traces(traces_path)?;
    let thresholds = if thresholds.is_empty() {
        vec![analysis.cluster_threshold]
    } else {
        thresholds.to_vec()
    };

    let encoders = [encoder_for(EncoderKind::Ngrams, analysis), encoder_for(EncoderKind::Precedence, analysis)];
    let candidates: Vec<BakeoffCandidate> = thresholds
        .iter()
        .flat_map(|&t| encoders.iter().map(move |e| BakeoffCandidate::new(Arc::clone(e), t)))
        .collect();

    let results = run_bakeoff(&traces, &candidates);
    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    println!("{:<18} {:>9} {:>8} {:>9}  sizes", "encoder", "threshold", "clusters", "cohesion");
    for r in &results {
        println!(
            "{:<18} {:>9.3} {:>8} {:>9.3}  {:?}",
            r.encoder, r.threshold, r.cluster_count, r.cohesion, r.cluster_sizes
        );
    }
    Ok(())
}

/// Apply command-line overrides on top of the env-derived analysis settings.
pub fn resolve(
    mut analysis: AnalysisConfig,
    ngram: Option<usize>,
    threshold: Option<f64>,
    voice: Option<String>,
    max_patterns: Option<usize>,
) -> AnalysisConfig {
    if let Some(n) = ngram {
        analysis.ngram_size = n;
    }
    if let Some(t) = threshold {
        analysis.cluster_threshold = t;
    }
    if let Some(v) = voice {
        analysis.brief_voice = v;
    }
    if let Some(m) = max_patterns {
        analysis.brief_max_patterns = m;
    }
    analysis
}

/// Overrides for session splitting and suggestion ranking.
pub fn resolve_workflow(
    mut analysis: AnalysisConfig,
    session_window_secs: Option<u64>,
    max_clusters: Option<usize>,
    min_cluster_size: Option<usize>,
) -> AnalysisConfig {
    if let Some(w) = session_window_secs {
        analysis.session_window_secs = w;
    }
    if let Some(m) = max_clusters {
        analysis.max_clusters = m;
    }
    if let Some(m) = min_cluster_size {
        analysis.min_cluster_size = m;
    }
    analysis
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_given_flags_override() {
        let resolved = resolve(AnalysisConfig::default(), Some(3), None, Some("auditor".into()), None);
        assert_eq!(resolved.ngram_size, 3);
        assert_eq!(resolved.cluster_threshold, AnalysisConfig::default().cluster_threshold);
        assert_eq!(resolved.brief_voice, "auditor");
        assert_eq!(resolved.brief_max_patterns, AnalysisConfig::default().brief_max_patterns);
    }

    #[test]
    fn encoder_kind_selects_encoder() {
        let analysis = resolve(AnalysisConfig::default(), Some(3), None, None, None);
        assert_eq!(encoder_for(EncoderKind::Ngrams, &analysis).name(), "bag-of-3-grams");
        assert_eq!(encoder_for(EncoderKind::Precedence, &analysis).name(), "precedence");
    }

    fn write_events(dir: &tempfile::TempDir) -> std::path::PathBuf {
        let path = dir.path().join("events.json");
        let events = serde_json::json!([
            {"principal_id": "ci", "action_family": "filesystem", "action_name": "open",
             "resource_class": "unix.file", "timestamp": "2025-01-01T12:00:00Z"},
            {"principal_id": "ci", "action_family": "process", "action_name": "exec",
             "resource_class": "unix.binary", "outcome": "DENY", "timestamp": "2025-01-01T12:01:00Z"},
            {"principal_id": "ci", "action_family": "filesystem", "action_name": "open",
             "resource_class": "unix.file", "timestamp": "2025-01-01T12:30:00Z"},
            {"principal_id": "ci", "action_family": "process", "action_name": "exec",
             "resource_class": "unix.binary", "timestamp": "2025-01-01T12:31:00Z"}
        ]);
        std::fs::write(&path, events.to_string()).unwrap();
        path
    }

    #[test]
    fn events_are_split_by_session_window() {
        let dir = tempfile::tempdir().unwrap();
        let input = TraceInput {
            traces: None,
            events: Some(write_events(&dir)),
            session_window_secs: None,
        };

        let traces = read_input(&input, &AnalysisConfig::default()).unwrap();
        assert_eq!(traces.len(), 2);
        assert_eq!(traces[0].session_id, "ci@2025-01-01T12:00:00Z");

        let wide = resolve_workflow(AnalysisConfig::default(), Some(3600), None, None);
        assert_eq!(read_input(&input, &wide).unwrap().len(), 1);
    }

    #[test]
    fn event_sessions_become_one_ranked_suggestion() {
        let dir = tempfile::tempdir().unwrap();
        let input = TraceInput {
            traces: None,
            events: Some(write_events(&dir)),
            session_window_secs: None,
        };
        let analysis = AnalysisConfig::default();
        let traces = read_input(&input, &analysis).unwrap();
        let suggestions = workflow_suggestions(
            &traces,
            &BTreeMap::new(),
            encoder_for(EncoderKind::Ngrams, &analysis).as_ref(),
            &WorkflowOptions::from_analysis(&analysis),
        );

        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].session_count, 2);
        let table = render_suggestions(&suggestions);
        assert!(table.contains("cluster-1"));
        assert!(table.contains("deny exec unix.binary (ci@2025-01-01T12:00:00Z)"));
    }

    #[test]
    fn workflow_overrides_apply() {
        let resolved = resolve_workflow(AnalysisConfig::default(), None, Some(2), Some(5));
        assert_eq!(resolved.session_window_secs, AnalysisConfig::default().session_window_secs);
        assert_eq!(resolved.max_clusters, 2);
        assert_eq!(resolved.min_cluster_size, 5);
    }
}
