//! Change detection strategies for the policy watcher.
//!
//! A detector only decides whether a tick should read the file. Whether the
//! content actually changed is settled by comparing content digests, so a
//! detector that answers "maybe" too often costs a read, never a duplicate
//! callback.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, warn};

use crate::configuration::content_digest;
use crate::error::{PolicyError, Result};

/// Raw policy bytes read in one go, plus their digest.
#[derive(Debug, Clone)]
pub struct PolicySample {
    pub bytes: Vec<u8>,
    pub digest: String,
}

impl PolicySample {
    pub fn read(path: &Path) -> io::Result<Self> {
        let bytes = fs::read(path)?;
        let digest = content_digest(&bytes);
        Ok(Self { bytes, digest })
    }
}

/// Decides, tick by tick, whether the policy file needs to be read.
pub trait ChangeDetector: Send {
    /// Begin observing `path`. Called once, before the initial load.
    fn arm(&mut self, _path: &Path) -> Result<()> {
        Ok(())
    }

    /// Whether the file may have changed since the previous call.
    fn should_read(&mut self) -> bool;

    fn name(&self) -> &'static str;
}

/// Reads the file on every tick and relies on the digest comparison.
#[derive(Debug, Default, Clone, Copy)]
pub struct DigestDetector;

impl ChangeDetector for DigestDetector {
    fn should_read(&mut self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "digest"
    }
}

/// Uses filesystem notifications to skip reads while the file is quiet.
///
/// Watches the parent directory so that rename-based saves (editor swap files,
/// temp file + rename) are still seen.
#[derive(Default)]
pub struct NotifyDetector {
    dirty: Arc<AtomicBool>,
    watcher: Option<RecommendedWatcher>,
}

impl NotifyDetector {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ChangeDetector for NotifyDetector {
    fn arm(&mut self, path: &Path) -> Result<()> {
        let target: PathBuf = path.to_path_buf();
        let file_name = target.file_name().map(|n| n.to_os_string());
        let dir = match target.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        if file_name.is_none() {
            return Err(PolicyError::Config(format!(
                "policy path {} has no file name",
                target.display()
            )));
        }

        let dirty = Arc::clone(&self.dirty);
        let mut watcher = notify::recommended_watcher(
            move |res: std::result::Result<notify::Event, notify::Error>| match res {
                Ok(event) => {
                    let touches_target = event
                        .paths
                        .iter()
                        .any(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
                    if touches_target {
                        debug!(kind = ?event.kind, "policy file event");
                        dirty.store(true, Ordering::Release);
                    }
                }
                Err(e) => {
                    warn!(error = %e, "policy file watcher error; forcing re-read");
                    dirty.store(true, Ordering::Release);
                }
            },
        )?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        self.watcher = Some(watcher);
        Ok(())
    }

    fn should_read(&mut self) -> bool {
        // Unarmed detectors cannot observe anything, so fall back to polling.
        self.watcher.is_none() || self.dirty.swap(false, Ordering::AcqRel)
    }

    fn name(&self) -> &'static str {
        "notify"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_digest_matches_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.cedar");
        fs::write(&path, "permit").unwrap();

        let sample = PolicySample::read(&path).unwrap();
        assert_eq!(sample.bytes, b"permit");
        assert_eq!(sample.digest, content_digest(b"permit"));
    }

    #[test]
    fn digest_detector_always_reads() {
        let mut detector = DigestDetector;
        assert!(detector.should_read());
        assert!(detector.should_read());
    }

    #[test]
    fn notify_detector_flags_writes_to_the_target() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.cedar");
        fs::write(&path, "permit").unwrap();

        let mut detector = NotifyDetector::new();
        assert!(detector.should_read(), "unarmed detector polls");
        detector.arm(&path).unwrap();

        fs::write(&path, "forbid").unwrap();
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        while !detector.should_read() {
            assert!(std::time::Instant::now() < deadline, "no event observed");
            std::thread::sleep(std::time::Duration::from_millis(20));
        }
    }
}
