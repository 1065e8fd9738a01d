//! Policy text to rule-table compilation.
//!
//! [`PolicyCompiler`] is the seam between the watcher and the policy language.
//! [`StatementCompiler`] handles the statement subset the enforcement layer
//! understands:
//!
//! ```text
//! permit (principal, action in [Action::"FileOpen"], resource)
//! when { resource in [ Dir::"/tmp" ] };
//! forbid (principal, action == Action::"NetworkConnect", resource == Host::"10.0.0.1");
//! ```

mod lexer;
mod parser;


use std::path::Path;

use crate::configuration::RuleTables;
use crate::error::ErrorDetail;

/// Compiles policy source into per-category rule tables.
///
/// Implementations must be pure: the same input always produces the same
/// tables or the same rejection.
pub trait PolicyCompiler: Send + Sync {
    fn compile(&self, origin: &Path, source: &str) -> Result<RuleTables, ErrorDetail>;
}

/// Positioned syntax or validation failure inside a policy document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SyntaxError {
    pub line: usize,
    pub column: usize,
    pub message: String,
    pub suggestion: Option<String>,
}

impl SyntaxError {
    pub(crate) fn new(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            column,
            message: message.into(),
            suggestion: None,
        }
    }

    pub(crate) fn suggest(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    fn into_detail(self, origin: &Path, source: &str) -> ErrorDetail {
        let snippet = source
            .lines()
            .nth(self.line.saturating_sub(1))
            .unwrap_or_default()
            .trim_end()
            .to_string();
        let mut detail = ErrorDetail::parse(
            "policy failed to compile",
            format!("{}:{}:{}: {}", origin.display(), self.line, self.column, self.message),
        )
        .with_file(origin)
        .with_location(self.line, self.column, snippet);
        if let Some(suggestion) = self.suggestion {
            detail = detail.with_suggestion(suggestion);
        }
        detail
    }
}

/// Built-in compiler for `permit`/`forbid` statements over file, exec and
/// network actions.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatementCompiler;

impl StatementCompiler {
    pub fn new() -> Self {
        Self
    }
}

impl PolicyCompiler for StatementCompiler {
    fn compile(&self, origin: &Path, source: &str) -> Result<RuleTables, ErrorDetail> {
        let tokens = lexer::tokenize(source).map_err(|e| e.into_detail(origin, source))?;
        parser::Parser::new(tokens, end_position(source))
            .parse_policy()
            .map_err(|e| e.into_detail(origin, source))
    }
}

/// 1-based line/column just past the last character.
fn end_position(source: &str) -> (usize, usize) {
    let line = source.matches('\n').count() + 1;
    let column = source.rsplit('\n').next().map_or(0, |l| l.chars().count()) + 1;
    (line, column)
}
