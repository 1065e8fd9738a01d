use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tether_core::config::DEFAULT_POLL_INTERVAL_MS;
use tracing::{debug, info, warn};

use crate::compiler::{PolicyCompiler, StatementCompiler};
use crate::configuration::Configuration;
use crate::detect::{ChangeDetector, DigestDetector};
use crate::error::{ErrorCode, ErrorDetail};
use crate::store::PolicyStore;

use super::reload::{Outcome, ReloadState};

const DEFAULT_INTERVAL: Duration = Duration::from_millis(DEFAULT_POLL_INTERVAL_MS);

/// Builder for a hot-reloading policy watcher.
///
/// ```no_run
/// use std::sync::Arc;
/// use std::time::Duration;
/// use tether_policy::{PolicyStore, PolicyWatcher, StatementCompiler};
///
/// let store = Arc::new(PolicyStore::new());
/// let handle = PolicyWatcher::new("policy.cedar", store, Arc::new(StatementCompiler))
///     .interval(Duration::from_millis(250))
///     .spawn(
///         |cfg| println!("policy v{} active", cfg.version),
///         |err| eprintln!("{err}"),
///     )?;
/// # drop(handle);
/// # Ok::<(), tether_policy::ErrorDetail>(())
/// ```
pub struct PolicyWatcher {
    path: PathBuf,
    store: Arc<PolicyStore>,
    compiler: Arc<dyn PolicyCompiler>,
    interval: Duration,
    detector: Box<dyn ChangeDetector>,
}

impl PolicyWatcher {
    pub fn new(path: impl Into<PathBuf>, store: Arc<PolicyStore>, compiler: Arc<dyn PolicyCompiler>) -> Self {
        Self {
            path: path.into(),
            store,
            compiler,
            interval: DEFAULT_INTERVAL,
            detector: Box::new(DigestDetector),
        }
    }

    /// Poll period. Zero is clamped to one millisecond.
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval.max(Duration::from_millis(1));
        self
    }

    pub fn detector(mut self, detector: impl ChangeDetector + 'static) -> Self {
        self.detector = Box::new(detector);
        self
    }

    /// Load the policy once, then keep watching it on a background thread.
    ///
    /// The initial load does not invoke `on_update`. If it fails, the error is
    /// returned and nothing is left running. Afterwards every changed content
    /// produces exactly one callback, invoked on the watcher thread. A
    /// successful configuration is installed in the store once `on_update`
    /// returns.
    pub fn spawn<U, E>(self, on_update: U, on_error: E) -> Result<WatchHandle, ErrorDetail>
    where
        U: FnMut(Arc<Configuration>) + Send + 'static,
        E: FnMut(ErrorDetail) + Send + 'static,
    {
        let Self {
            path,
            store,
            compiler,
            interval,
            mut detector,
        } = self;

        if path.as_os_str().is_empty() || path.to_string_lossy().trim().is_empty() {
            return Err(ErrorDetail::config("policy file path required")
                .with_suggestion("Set POLICY_PATH or pass --policy."));
        }

        detector.arm(&path).map_err(|e| {
            ErrorDetail::new(ErrorCode::Io, "failed to watch policy file", e.to_string()).with_file(&path)
        })?;

        let mut state = ReloadState::new(path.clone(), Arc::clone(&store), compiler);
        state.initial_load()?;

        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let cancelled = Arc::new(AtomicBool::new(false));
        let worker = Worker {
            state,
            detector,
            interval,
            stop_rx,
            cancelled: Arc::clone(&cancelled),
            on_update: Box::new(on_update),
            on_error: Box::new(on_error),
        };

        let thread = thread::Builder::new()
            .name("policy-watcher".into())
            .spawn(move || worker.run())
            .map_err(|e| {
                ErrorDetail::config(format!("failed to start policy watcher thread: {e}")).with_file(&path)
            })?;

        info!(
            path = %path.display(),
            interval_ms = interval.as_millis() as u64,
            "Watching policy file"
        );

        Ok(WatchHandle {
            path,
            store,
            stop_tx: Some(stop_tx),
            cancelled,
            thread: Some(thread),
        })
    }
}

/// Watch `path` with a fresh store and the built-in statement compiler.
pub fn watch<U, E>(
    path: impl AsRef<Path>,
    interval: Duration,
    on_update: U,
    on_error: E,
) -> Result<WatchHandle, ErrorDetail>
where
    U: FnMut(Arc<Configuration>) + Send + 'static,
    E: FnMut(ErrorDetail) + Send + 'static,
{
    PolicyWatcher::new(
        path.as_ref(),
        Arc::new(PolicyStore::new()),
        Arc::new(StatementCompiler::new()),
    )
    .interval(interval)
    .spawn(on_update, on_error)
}

type UpdateFn = Box<dyn FnMut(Arc<Configuration>) + Send>;
type ErrorFn = Box<dyn FnMut(ErrorDetail) + Send>;

/// Everything the watcher thread owns.
struct Worker {
    state: ReloadState,
    detector: Box<dyn ChangeDetector>,
    interval: Duration,
    stop_rx: mpsc::Receiver<()>,
    cancelled: Arc<AtomicBool>,
    on_update: UpdateFn,
    on_error: ErrorFn,
}

impl Worker {
    fn run(mut self) {
        debug!(detector = self.detector.name(), "Policy watcher thread started");
        loop {
            match self.stop_rx.recv_timeout(self.interval) {
                Err(RecvTimeoutError::Timeout) => {}
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
            if self.cancelled.load(Ordering::Acquire) {
                break;
            }

            // A computed outcome is always delivered, even if cancel arrived
            // while the file was being read or compiled.
            let Some(outcome) = self.state.tick(self.detector.as_mut()) else {
                continue;
            };
            match outcome {
                Outcome::Updated(config) => {
                    let config = self.state.successor(config);
                    (self.on_update)(Arc::clone(&config));
                    if let Err(e) = self.state.store().install(config) {
                        warn!(error = %e, "Failed to install policy configuration");
                    }
                }
                Outcome::Rejected(detail) => (self.on_error)(detail),
            }
        }
        debug!("Policy watcher thread stopped");
    }
}

/// Owner of a running watcher. Dropping it stops the watcher.
pub struct WatchHandle {
    path: PathBuf,
    store: Arc<PolicyStore>,
    stop_tx: Option<mpsc::Sender<()>>,
    cancelled: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl WatchHandle {
    /// Stop the watcher and wait for its thread to exit.
    ///
    /// No callback runs after this returns. When called from inside a
    /// callback the thread is only signalled; it exits once the callback
    /// returns. Repeated calls are no-ops.
    pub fn cancel(&mut self) {
        self.cancelled.store(true, Ordering::Release);
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        let Some(thread) = self.thread.take() else {
            return;
        };
        if thread.thread().id() == thread::current().id() {
            return;
        }
        if thread.join().is_err() {
            warn!(path = %self.path.display(), "Policy watcher thread panicked");
        }
        info!(path = %self.path.display(), "Stopped watching policy file");
    }

    /// Store the watcher publishes into.
    pub fn store(&self) -> &Arc<PolicyStore> {
        &self.store
    }

    /// Shortcut for `store().active()`.
    pub fn active(&self) -> Option<Arc<Configuration>> {
        self.store.active()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}
