use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TetherError};

/// A frequent action sequence produced by the external pattern miner.
///
/// Patterns arrive pre-ranked by descending support; consumers keep that order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Pattern {
    pub tokens: Vec<String>,
    /// Number of sessions exhibiting the sequence.
    pub support: usize,
}

impl Pattern {
    pub fn new<I, S>(tokens: I, support: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tokens: tokens.into_iter().map(Into::into).collect(),
            support,
        }
    }
}

/// Read mined patterns keyed by cluster id (`{"cluster-1": [...]}`).
pub fn load_patterns(path: &Path) -> Result<BTreeMap<String, Vec<Pattern>>> {
    let contents = fs::read_to_string(path)?;
    serde_json::from_str(&contents).map_err(|e| TetherError::Decode {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}
