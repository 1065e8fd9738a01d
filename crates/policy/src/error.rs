//! Error types for policy compilation, storage and hot-reload.

use std::fmt;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Stable, machine-readable classification of a rejected policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    /// The policy text failed to parse or validate.
    #[serde(rename = "CEDAR_PARSE")]
    Parse,
    /// The policy file could not be read or stat'ed.
    #[serde(rename = "CEDAR_IO")]
    Io,
    /// The watcher was misconfigured (e.g. empty path).
    #[serde(rename = "CEDAR_CONFIG")]
    Config,
}

impl ErrorCode {
    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorCode::Parse => "CEDAR_PARSE",
            ErrorCode::Io => "CEDAR_IO",
            ErrorCode::Config => "CEDAR_CONFIG",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured explanation of why a candidate configuration was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{code}: {message}")]
pub struct ErrorDetail {
    pub code: ErrorCode,
    /// One-line headline suitable for a status bar.
    pub summary: String,
    pub message: String,
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<usize>,
    /// The offending source line, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl ErrorDetail {
    pub fn new(code: ErrorCode, summary: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code,
            summary: summary.into(),
            message: message.into(),
            file: String::new(),
            line: None,
            column: None,
            snippet: None,
            suggestion: None,
        }
    }

    /// Failure reading the policy source.
    pub fn io(path: &Path, err: &io::Error) -> Self {
        Self::new(
            ErrorCode::Io,
            "failed to read policy file",
            format!("failed to read policy file {}: {}", path.display(), err),
        )
        .with_file(path)
        .with_suggestion("Ensure the policy file exists and remains readable by the watcher.")
    }

    /// Content rejected by the compiler.
    pub fn parse(summary: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Parse, summary, message)
    }

    pub fn config(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(ErrorCode::Config, message.clone(), message)
    }

    pub fn with_file(mut self, path: &Path) -> Self {
        self.file = path.display().to_string();
        self
    }

    pub fn with_location(mut self, line: usize, column: usize, snippet: impl Into<String>) -> Self {
        self.line = Some(line);
        self.column = Some(column);
        self.snippet = Some(snippet.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

/// Errors surfaced by policy store and bootstrap operations.
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    /// Filesystem I/O error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Invalid caller-supplied settings (e.g. empty policy path).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Filesystem watcher error.
    #[error("Notify watcher error: {0}")]
    Notify(#[from] notify::Error),

    /// Attempt to install a configuration out of version order.
    #[error("Store error: {0}")]
    Store(String),
}

/// Result alias for policy operations.
pub type Result<T> = std::result::Result<T, PolicyError>;
