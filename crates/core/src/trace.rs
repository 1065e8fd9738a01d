//! Behavioral traces as delivered by the telemetry collector.
//!
//! Records are decoded strictly: unknown fields and missing required fields
//! are rejected at the boundary instead of being defaulted.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TetherError};

/// A single observed action inside an agent session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Event {
    /// Identity of the acting principal.
    pub principal_id: String,
    /// Coarse action family, e.g. `filesystem`, `network`, `process`.
    pub action_family: String,
    /// Action within the family, e.g. `open`, `connect`, `exec`.
    pub action_name: String,
    /// Resource classification, e.g. `unix.file`, `net.host`.
    pub resource_class: String,
    /// Concrete resource (path, host), when the collector supplies one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_facet: Option<String>,
    /// Enforcement outcome (`permit` / `deny`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Event {
    pub fn new(
        principal_id: impl Into<String>,
        action_family: impl Into<String>,
        action_name: impl Into<String>,
        resource_class: impl Into<String>,
    ) -> Self {
        Self {
            principal_id: principal_id.into(),
            action_family: action_family.into(),
            action_name: action_name.into(),
            resource_class: resource_class.into(),
            resource_facet: None,
            outcome: None,
            timestamp: None,
        }
    }

    /// Lowercase `family:name:resource_class` token used by every encoder.
    pub fn canonical_action(&self) -> String {
        format!(
            "{}:{}:{}",
            self.action_family, self.action_name, self.resource_class
        )
        .to_lowercase()
    }
}

/// Ordered, immutable record of one session's events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Trace {
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal: Option<String>,
    pub events: Vec<Event>,
}

impl Trace {
    pub fn new(session_id: impl Into<String>, events: Vec<Event>) -> Self {
        Self {
            session_id: session_id.into(),
            principal: None,
            events,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Canonical action tokens in event order.
    pub fn canonical_actions(&self) -> Vec<String> {
        self.events.iter().map(Event::canonical_action).collect()
    }
}

/// Read a JSON array of traces from disk.
pub fn load_traces(path: &Path) -> Result<Vec<Trace>> {
    let contents = fs::read_to_string(path)?;
    serde_json::from_str(&contents).map_err(|e| TetherError::Decode {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Read a flat JSON array of events (not yet split into sessions).
pub fn load_events(path: &Path) -> Result<Vec<Event>> {
    let contents = fs::read_to_string(path)?;
    serde_json::from_str(&contents).map_err(|e| TetherError::Decode {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}
