//! `watch`, `check` and `init` subcommands.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tracing::{error, info, warn};

use tether_core::config::PolicyConfig;
use tether_policy::{
    ensure_default_policy_file, Configuration, NotifyDetector, PolicyCompiler, PolicyStore,
    PolicyWatcher, StatementCompiler,
};

pub async fn watch(config: &PolicyConfig, notify: bool, init: bool) -> Result<()> {
    if init {
        init_policy(&config.path)?;
    }

    let interval = config.poll_interval();
    let store = Arc::new(PolicyStore::new());
    let mut watcher = PolicyWatcher::new(&config.path, Arc::clone(&store), Arc::new(StatementCompiler::new()))
        .interval(interval);
    if notify {
        watcher = watcher.detector(NotifyDetector::new());
    }

    let mut handle = watcher
        .spawn(
            |cfg: Arc<Configuration>| {
                info!(
                    version = cfg.version,
                    digest = %cfg.digest,
                    open = cfg.rules.open.len(),
                    exec = cfg.rules.exec.len(),
                    connect = cfg.rules.connect.len(),
                    "Policy reloaded"
                );
            },
            |detail| {
                warn!(
                    code = %detail.code,
                    file = %detail.file,
                    line = ?detail.line,
                    column = ?detail.column,
                    suggestion = ?detail.suggestion,
                    "{}", detail.message
                );
            },
        )
        .map_err(|detail| anyhow!(detail))
        .with_context(|| format!("failed to start watching {}", config.path.display()))?;

    if let Some(active) = store.active() {
        info!(version = active.version, rules = active.rules.len(), "Initial policy active");
    }

    tokio::signal::ctrl_c().await.context("failed to listen for Ctrl-C")?;
    info!("Shutting down policy watcher");
    handle.cancel();
    Ok(())
}

pub fn check(config: &PolicyConfig, json: bool) -> Result<()> {
    let path = &config.path;
    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let source = String::from_utf8(bytes).with_context(|| format!("{} is not valid UTF-8", path.display()))?;

    match StatementCompiler::new().compile(path, &source) {
        Ok(rules) => {
            let snapshot = Configuration::new(1, path.to_path_buf(), source, rules);
            if json {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            } else {
                println!("{}: {} rule(s), sha256 {}", path.display(), snapshot.rules.len(), snapshot.digest);
                for rule in snapshot.rules.open.iter().chain(&snapshot.rules.exec).chain(&snapshot.rules.connect) {
                    println!("  {rule}");
                }
            }
            Ok(())
        }
        Err(detail) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&detail)?);
            } else {
                error!(code = %detail.code, "{}", detail.message);
                if let Some(snippet) = &detail.snippet {
                    eprintln!("  | {snippet}");
                }
                if let Some(suggestion) = &detail.suggestion {
                    eprintln!("  = help: {suggestion}");
                }
            }
            Err(anyhow!(detail))
        }
    }
}

pub fn init_policy(path: &Path) -> Result<()> {
    let written = ensure_default_policy_file(path)
        .with_context(|| format!("failed to initialize {}", path.display()))?;
    if written {
        info!(path = %path.display(), "Created default policy");
    } else {
        info!(path = %path.display(), "Policy file already exists, leaving it untouched");
    }
    Ok(())
}

/// Apply command-line overrides on top of the env-derived policy settings.
pub fn resolve(
    mut config: PolicyConfig,
    policy: Option<PathBuf>,
    interval_ms: Option<u64>,
) -> PolicyConfig {
    if let Some(path) = policy {
        config.path = path;
    }
    if let Some(ms) = interval_ms {
        config.poll_interval_ms = ms;
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_env_settings() {
        let base = PolicyConfig::default();
        let resolved = resolve(base.clone(), Some(PathBuf::from("/etc/agent.cedar")), Some(50));
        assert_eq!(resolved.path, PathBuf::from("/etc/agent.cedar"));
        assert_eq!(resolved.poll_interval_ms, 50);

        let untouched = resolve(base.clone(), None, None);
        assert_eq!(untouched.path, base.path);
        assert_eq!(untouched.poll_interval_ms, base.poll_interval_ms);
    }

    #[test]
    fn check_accepts_initialized_policy_and_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.cedar");
        let config = resolve(PolicyConfig::default(), Some(path.clone()), None);

        assert!(check(&config, true).is_err());
        init_policy(&path).unwrap();
        check(&config, true).unwrap();

        fs::write(&path, "permit(principal, action == Action::\"Teleport\", resource);").unwrap();
        let err = check(&config, true).unwrap_err();
        assert!(err.to_string().contains("CEDAR_PARSE"), "{err}");
    }
}
