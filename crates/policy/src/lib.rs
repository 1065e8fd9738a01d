//! Hot-reloaded authorization policy.
//!
//! This crate provides:
//! - An immutable, versioned [`Configuration`] compiled from policy text
//! - The [`PolicyStore`] holding the single active configuration
//! - A polling [`PolicyWatcher`] that recompiles on change and never replaces
//!   a valid configuration with an invalid one
//! - The [`PolicyCompiler`] seam plus a reference statement compiler

pub mod compiler;
pub mod configuration;
pub mod defaults;
pub mod detect;
pub mod error;
pub mod store;
pub mod watcher;

pub use compiler::{PolicyCompiler, StatementCompiler};
pub use configuration::{
    content_digest, ActionCategory, Configuration, Effect, Operation, PolicyRule, Resource,
    ResourceKind, RuleTables,
};
pub use defaults::{ensure_default_policy_file, DEFAULT_POLICY};
pub use detect::{ChangeDetector, DigestDetector, NotifyDetector, PolicySample};
pub use error::{ErrorCode, ErrorDetail, PolicyError, Result};
pub use store::PolicyStore;
pub use watcher::{watch, PolicyWatcher, WatchHandle};
