//! Traces in, brief out: the full suggestion pipeline over decoded JSON input.

use std::collections::BTreeMap;

use tether_core::{Pattern, Trace};
use tether_suggest::{
    build_brief, member_traces, summarize_cluster, AffinityClusterer, BagOfNGrams, BriefOptions,
    ClusterConfig, SummaryConfig,
};

const TRACES: &str = r#"[
  {"session_id": "build-2", "principal": "ci", "events": [
    {"principal_id": "ci", "action_family": "filesystem", "action_name": "open", "resource_class": "unix.file", "resource_facet": "/src/main.rs"},
    {"principal_id": "ci", "action_family": "filesystem", "action_name": "read", "resource_class": "unix.file"},
    {"principal_id": "ci", "action_family": "process", "action_name": "exec", "resource_class": "unix.binary", "outcome": "permit"}
  ]},
  {"session_id": "build-1", "events": [
    {"principal_id": "ci", "action_family": "filesystem", "action_name": "open", "resource_class": "unix.file"},
    {"principal_id": "ci", "action_family": "filesystem", "action_name": "read", "resource_class": "unix.file"},
    {"principal_id": "ci", "action_family": "process", "action_name": "exec", "resource_class": "unix.binary"}
  ]},
  {"session_id": "sync-1", "events": [
    {"principal_id": "agent", "action_family": "network", "action_name": "connect", "resource_class": "net.host", "timestamp": "2024-05-01T12:00:00Z"},
    {"principal_id": "agent", "action_family": "filesystem", "action_name": "write", "resource_class": "unix.file"}
  ]}
]"#;

const PATTERNS: &str = r#"{
  "cluster-1": [
    {"tokens": ["filesystem:open:unix.file", "filesystem:read:unix.file", "process:exec:unix.binary"], "support": 2},
    {"tokens": ["filesystem:open:unix.file", "filesystem:read:unix.file"], "support": 2}
  ]
}"#;

#[test]
fn traces_to_brief() {
    let traces: Vec<Trace> = serde_json::from_str(TRACES).unwrap();
    let patterns: BTreeMap<String, Vec<Pattern>> = serde_json::from_str(PATTERNS).unwrap();

    let encoder = BagOfNGrams::default();
    let clusters = AffinityClusterer::new(&encoder, ClusterConfig::default()).cluster(&traces);
    assert_eq!(clusters.len(), 2);
    assert_eq!(clusters[0].members, vec!["build-1", "build-2"]);
    assert_eq!(
        clusters[0].explanation,
        "workflow from filesystem:open:unix.file to process:exec:unix.binary; principal ci"
    );

    let build = &clusters[0];
    let members = member_traces(build, &traces);
    let summary = summarize_cluster(
        build,
        &members,
        &traces,
        patterns.get(&build.id).map(Vec::as_slice).unwrap_or_default(),
        &SummaryConfig::default(),
    );
    let brief = build_brief(&summary, &BriefOptions::default());

    assert!(brief.contains("- Cluster ID: cluster-1\n"));
    assert!(brief.contains("- Sessions: build-1, build-2\n"));
    assert!(brief.contains("- Aggregate support: 2\n"));
    assert!(brief.contains("process-execution"));
    assert!(brief.contains(
        "1. filesystem:open:unix.file -> filesystem:read:unix.file -> process:exec:unix.binary (support: 2 sessions)\n"
    ));

    let sync = &clusters[1];
    let members = member_traces(sync, &traces);
    let summary = summarize_cluster(sync, &members, &traces, &[], &SummaryConfig::default());
    assert!(summary.risk_tags.contains(&"network-egress".to_string()));
    assert!(summary.risk_tags.contains(&"write-access".to_string()));
    let brief = build_brief(&summary, &BriefOptions::default());
    assert!(brief.contains("## Frequent Sequences\n"));
}

#[test]
fn strict_decoding_rejects_missing_required_fields() {
    let json = r#"[{"session_id": "s", "events": [{"principal_id": "p", "action_family": "f", "action_name": "n"}]}]"#;
    assert!(serde_json::from_str::<Vec<Trace>>(json).is_err());
}
