//! Compiled, enforceable policy snapshots.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Whether a rule grants or denies the operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effect {
    Permit,
    Forbid,
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Effect::Permit => f.write_str("permit"),
            Effect::Forbid => f.write_str("forbid"),
        }
    }
}

/// Rule table an operation is enforced from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionCategory {
    Open,
    Exec,
    Connect,
}

/// Enforceable operation, named by its `Action::"..."` identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    FileOpen,
    FileOpenReadOnly,
    FileOpenReadWrite,
    ProcessExec,
    NetworkConnect,
}

impl Operation {
    pub const ALL: [Operation; 5] = [
        Operation::FileOpen,
        Operation::FileOpenReadOnly,
        Operation::FileOpenReadWrite,
        Operation::ProcessExec,
        Operation::NetworkConnect,
    ];

    pub fn from_action_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.action_id() == id)
    }

    pub const fn action_id(self) -> &'static str {
        match self {
            Operation::FileOpen => "FileOpen",
            Operation::FileOpenReadOnly => "FileOpenReadOnly",
            Operation::FileOpenReadWrite => "FileOpenReadWrite",
            Operation::ProcessExec => "ProcessExec",
            Operation::NetworkConnect => "NetworkConnect",
        }
    }

    pub const fn category(self) -> ActionCategory {
        match self {
            Operation::FileOpen | Operation::FileOpenReadOnly | Operation::FileOpenReadWrite => {
                ActionCategory::Open
            }
            Operation::ProcessExec => ActionCategory::Exec,
            Operation::NetworkConnect => ActionCategory::Connect,
        }
    }

    /// Whether `kind` is a meaningful resource for this operation.
    pub fn accepts(self, kind: ResourceKind) -> bool {
        match self.category() {
            ActionCategory::Open | ActionCategory::Exec => {
                matches!(kind, ResourceKind::Dir | ResourceKind::File)
            }
            ActionCategory::Connect => kind == ResourceKind::Host,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    Dir,
    File,
    Host,
}

impl ResourceKind {
    pub fn from_type_name(name: &str) -> Option<Self> {
        match name {
            "Dir" => Some(ResourceKind::Dir),
            "File" => Some(ResourceKind::File),
            "Host" => Some(ResourceKind::Host),
            _ => None,
        }
    }

    pub const fn type_name(self) -> &'static str {
        match self {
            ResourceKind::Dir => "Dir",
            ResourceKind::File => "File",
            ResourceKind::Host => "Host",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resource {
    pub kind: ResourceKind,
    pub value: String,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{:?}", self.kind.type_name(), self.value)
    }
}

/// One enforceable rule: effect × operation × resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PolicyRule {
    pub effect: Effect,
    pub operation: Operation,
    pub resource: Resource,
}

impl fmt::Display for PolicyRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} Action::{:?} {}",
            self.effect,
            self.operation.action_id(),
            self.resource
        )
    }
}

/// Per-category rule lists consumed by the enforcement layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleTables {
    pub open: Vec<PolicyRule>,
    pub exec: Vec<PolicyRule>,
    pub connect: Vec<PolicyRule>,
}

impl RuleTables {
    /// Append a rule to the table for its operation's category, skipping exact duplicates.
    pub fn push(&mut self, rule: PolicyRule) {
        let table = match rule.operation.category() {
            ActionCategory::Open => &mut self.open,
            ActionCategory::Exec => &mut self.exec,
            ActionCategory::Connect => &mut self.connect,
        };
        if !table.contains(&rule) {
            table.push(rule);
        }
    }

    pub fn category(&self, category: ActionCategory) -> &[PolicyRule] {
        match category {
            ActionCategory::Open => &self.open,
            ActionCategory::Exec => &self.exec,
            ActionCategory::Connect => &self.connect,
        }
    }

    pub fn len(&self) -> usize {
        self.open.len() + self.exec.len() + self.connect.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Immutable, versioned policy snapshot.
///
/// Published behind an `Arc` and never mutated afterwards, so any number of
/// readers may hold it while the watcher prepares its successor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Configuration {
    pub version: u64,
    pub path: PathBuf,
    /// Policy text the rules were compiled from.
    pub source: String,
    /// SHA-256 hex digest of `source`.
    pub digest: String,
    pub loaded_at: DateTime<Utc>,
    pub rules: RuleTables,
}

impl Configuration {
    pub fn new(version: u64, path: PathBuf, source: String, rules: RuleTables) -> Self {
        let digest = content_digest(source.as_bytes());
        Self {
            version,
            path,
            source,
            digest,
            loaded_at: Utc::now(),
            rules,
        }
    }
}

/// SHA-256 hex digest of raw policy bytes.
pub fn content_digest(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    format!("{digest:x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(op: Operation, kind: ResourceKind, value: &str) -> PolicyRule {
        PolicyRule {
            effect: Effect::Permit,
            operation: op,
            resource: Resource {
                kind,
                value: value.to_string(),
            },
        }
    }

    #[test]
    fn push_routes_by_category_and_dedupes() {
        let mut tables = RuleTables::default();
        tables.push(rule(Operation::FileOpenReadOnly, ResourceKind::Dir, "/etc"));
        tables.push(rule(Operation::FileOpenReadOnly, ResourceKind::Dir, "/etc"));
        tables.push(rule(Operation::ProcessExec, ResourceKind::File, "/bin/ls"));
        tables.push(rule(Operation::NetworkConnect, ResourceKind::Host, "*.example.com"));

        assert_eq!(tables.open.len(), 1);
        assert_eq!(tables.exec.len(), 1);
        assert_eq!(tables.connect.len(), 1);
        assert_eq!(tables.category(ActionCategory::Open).len(), 1);
        assert_eq!(tables.len(), 3);
    }

    #[test]
    fn rule_display_reads_like_policy_text() {
        let r = rule(Operation::FileOpen, ResourceKind::Dir, "/tmp");
        assert_eq!(r.to_string(), r#"permit Action::"FileOpen" Dir::"/tmp""#);
    }

    #[test]
    fn action_ids_round_trip() {
        for op in Operation::ALL {
            assert_eq!(Operation::from_action_id(op.action_id()), Some(op));
        }
        assert_eq!(Operation::from_action_id("FileDelete"), None);
    }

    #[test]
    fn digest_is_stable_hex() {
        let a = content_digest(b"permit");
        assert_eq!(a.len(), 64);
        assert_eq!(a, content_digest(b"permit"));
        assert_ne!(a, content_digest(b"forbid"));
    }
}
