//! Holds the active policy configuration for concurrent readers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::configuration::Configuration;
use crate::error::{PolicyError, Result};

/// Shared slot for the active [`Configuration`].
///
/// Readers clone the `Arc` out of the slot and keep using that snapshot for
/// as long as they like; installing a successor never mutates it. Versions
/// are strictly increasing across installs.
#[derive(Debug, Default)]
pub struct PolicyStore {
    active: RwLock<Option<Arc<Configuration>>>,
    last_version: AtomicU64,
}

impl PolicyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current configuration, or `None` before the first successful load.
    pub fn active(&self) -> Option<Arc<Configuration>> {
        match self.active.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Version of the active configuration (0 before the first install).
    pub fn version(&self) -> u64 {
        self.last_version.load(Ordering::Acquire)
    }

    /// Version number the next installed configuration should carry.
    pub fn next_version(&self) -> u64 {
        self.version() + 1
    }

    /// Publish `config` as the active configuration.
    ///
    /// Rejects configurations whose version does not exceed the current one.
    pub fn install(&self, config: Arc<Configuration>) -> Result<()> {
        let mut guard = match self.active.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let current = self.last_version.load(Ordering::Acquire);
        if config.version <= current {
            return Err(PolicyError::Store(format!(
                "refusing to install version {} over version {}",
                config.version, current
            )));
        }
        debug!(version = config.version, digest = %config.digest, "Installing policy configuration");
        self.last_version.store(config.version, Ordering::Release);
        *guard = Some(config);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::configuration::RuleTables;

    fn config(version: u64, source: &str) -> Arc<Configuration> {
        Arc::new(Configuration::new(
            version,
            PathBuf::from("policy.cedar"),
            source.to_string(),
            RuleTables::default(),
        ))
    }

    #[test]
    fn empty_store_has_no_active_config() {
        let store = PolicyStore::new();
        assert!(store.active().is_none());
        assert_eq!(store.version(), 0);
        assert_eq!(store.next_version(), 1);
    }

    #[test]
    fn install_replaces_and_old_snapshot_survives() {
        let store = PolicyStore::new();
        store.install(config(1, "a")).unwrap();
        let held = store.active().unwrap();

        store.install(config(2, "b")).unwrap();
        assert_eq!(store.active().unwrap().source, "b");
        assert_eq!(held.source, "a");
        assert_eq!(store.version(), 2);
    }

    #[test]
    fn stale_version_is_rejected() {
        let store = PolicyStore::new();
        store.install(config(3, "a")).unwrap();
        let err = store.install(config(3, "b")).unwrap_err();
        assert!(matches!(err, PolicyError::Store(_)));
        assert!(store.install(config(2, "c")).is_err());
        assert_eq!(store.active().unwrap().source, "a");
    }

    #[test]
    fn concurrent_readers_see_whole_snapshots() {
        let store = Arc::new(PolicyStore::new());
        store.install(config(1, "v1")).unwrap();

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        let cfg = store.active().unwrap();
                        assert_eq!(cfg.source, format!("v{}", cfg.version));
                    }
                })
            })
            .collect();

        for v in 2..=50 {
            store.install(config(v, &format!("v{v}"))).unwrap();
        }
        for r in readers {
            r.join().unwrap();
        }
        assert_eq!(store.version(), 50);
    }
}
