use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::compiler::PolicyCompiler;
use crate::configuration::Configuration;
use crate::detect::{ChangeDetector, PolicySample};
use crate::error::ErrorDetail;
use crate::store::PolicyStore;

/// What a tick produced for the callbacks.
#[derive(Debug)]
pub(super) enum Outcome {
    Updated(Arc<Configuration>),
    Rejected(ErrorDetail),
}

/// Watcher-thread state: what was last evaluated and whether the file is
/// currently unreadable.
pub(super) struct ReloadState {
    path: PathBuf,
    store: Arc<PolicyStore>,
    compiler: Arc<dyn PolicyCompiler>,
    /// Digest of the last content that was compiled, successfully or not.
    last_digest: Option<String>,
    /// Kind of the read failure already reported for the current outage.
    outage: Option<io::ErrorKind>,
}

impl ReloadState {
    pub(super) fn new(path: PathBuf, store: Arc<PolicyStore>, compiler: Arc<dyn PolicyCompiler>) -> Self {
        Self {
            path,
            store,
            compiler,
            last_digest: None,
            outage: None,
        }
    }

    pub(super) fn store(&self) -> &Arc<PolicyStore> {
        &self.store
    }

    /// Read, compile and install the starting configuration.
    pub(super) fn initial_load(&mut self) -> Result<Arc<Configuration>, ErrorDetail> {
        let sample = PolicySample::read(&self.path).map_err(|e| ErrorDetail::io(&self.path, &e))?;
        self.last_digest = Some(sample.digest.clone());
        let config = self.compile(sample)?;
        self.store
            .install(Arc::clone(&config))
            .map_err(|e| ErrorDetail::config(e.to_string()).with_file(&self.path))?;
        info!(
            path = %self.path.display(),
            version = config.version,
            rules = config.rules.len(),
            "Loaded policy"
        );
        Ok(config)
    }

    /// One polling step. `None` means there is nothing to report.
    pub(super) fn tick(&mut self, detector: &mut dyn ChangeDetector) -> Option<Outcome> {
        if self.outage.is_none() && !detector.should_read() {
            return None;
        }

        let sample = match PolicySample::read(&self.path) {
            Ok(sample) => sample,
            Err(e) => {
                let kind = e.kind();
                if self.outage == Some(kind) {
                    debug!(path = %self.path.display(), error = %e, "Policy file still unreadable");
                    return None;
                }
                self.outage = Some(kind);
                warn!(path = %self.path.display(), error = %e, "Failed to read policy file");
                return Some(Outcome::Rejected(ErrorDetail::io(&self.path, &e)));
            }
        };
        if self.outage.take().is_some() {
            info!(path = %self.path.display(), "Policy file readable again");
        }

        if self.last_digest.as_deref() == Some(sample.digest.as_str()) {
            return None;
        }
        self.last_digest = Some(sample.digest.clone());

        match self.compile(sample) {
            Ok(config) => {
                info!(
                    path = %self.path.display(),
                    version = config.version,
                    rules = config.rules.len(),
                    "Compiled updated policy"
                );
                Some(Outcome::Updated(config))
            }
            Err(detail) => {
                warn!(
                    path = %self.path.display(),
                    error = %detail,
                    "Policy rejected, keeping previous version"
                );
                Some(Outcome::Rejected(detail))
            }
        }
    }

    /// `config` if it can still be installed, otherwise a copy stamped with
    /// the store's next version.
    ///
    /// The store is shared, so another writer may have installed a version
    /// since the tick compiled `config`.
    pub(super) fn successor(&self, config: Arc<Configuration>) -> Arc<Configuration> {
        let next = self.store.next_version();
        if config.version >= next {
            return config;
        }
        warn!(
            path = %self.path.display(),
            stale = config.version,
            version = next,
            "Policy store advanced during reload, restamping configuration"
        );
        Arc::new(Configuration {
            version: next,
            ..(*config).clone()
        })
    }

    fn compile(&self, sample: PolicySample) -> Result<Arc<Configuration>, ErrorDetail> {
        let source = String::from_utf8(sample.bytes).map_err(|e| {
            ErrorDetail::parse(
                "policy file is not valid UTF-8",
                format!("{}: invalid UTF-8 at byte {}", self.path.display(), e.utf8_error().valid_up_to()),
            )
            .with_file(&self.path)
        })?;
        let rules = self.compiler.compile(&self.path, &source)?;
        Ok(Arc::new(Configuration::new(
            self.store.next_version(),
            self.path.clone(),
            source,
            rules,
        )))
    }
}
