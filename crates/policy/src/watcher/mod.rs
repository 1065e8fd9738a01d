//! Policy hot-reload watcher.
//!
//! Split into focused submodules:
//! - `core`: PolicyWatcher builder, spawn, WatchHandle and the `watch` shortcut
//! - `reload`: per-tick read / digest / compile state machine

mod core;
mod reload;

pub use self::core::{watch, PolicyWatcher, WatchHandle};
