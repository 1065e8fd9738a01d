//! Bootstrap policy written when no policy file exists yet.

use std::fs;
use std::io;
use std::path::Path;

use tracing::info;

use crate::error::{PolicyError, Result};

/// Permissive baseline: open and exec anywhere under `/`, connect to any host.
pub const DEFAULT_POLICY: &str = r#"permit (principal, action in [Action::"FileOpen", Action::"FileOpenReadOnly", Action::"FileOpenReadWrite"], resource)
when { resource in [ Dir::"/" ] };
permit (principal, action == Action::"ProcessExec", resource)
when { resource in [ Dir::"/" ] };
permit (principal, action == Action::"NetworkConnect", resource)
when { resource in [ Host::"*" ] };
"#;

/// Create `path` with [`DEFAULT_POLICY`] if it does not exist.
///
/// Parent directories are created as needed. An existing file is never
/// touched. Returns `true` when the file was written.
pub fn ensure_default_policy_file(path: &Path) -> Result<bool> {
    if path.as_os_str().is_empty() || path.to_string_lossy().trim().is_empty() {
        return Err(PolicyError::Config("policy file path required".into()));
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    match fs::metadata(path) {
        Ok(_) => return Ok(false),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "policy".to_string());
    let tmp_path = path.with_file_name(format!(".{file_name}.tmp"));
    fs::write(&tmp_path, format!("{}\n", DEFAULT_POLICY.trim()))?;
    fs::rename(&tmp_path, path)?;

    info!(path = %path.display(), "Wrote default policy");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_default_into_missing_nested_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf/policies/policy.cedar");

        assert!(ensure_default_policy_file(&path).unwrap());
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("permit"));
        assert!(content.ends_with("};\n"));
        assert!(!path.with_file_name(".policy.cedar.tmp").exists());
    }

    #[test]
    fn existing_file_is_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.cedar");
        fs::write(&path, "// custom\n").unwrap();

        assert!(!ensure_default_policy_file(&path).unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), "// custom\n");
    }

    #[test]
    fn blank_path_is_a_config_error() {
        let err = ensure_default_policy_file(Path::new("  ")).unwrap_err();
        assert!(matches!(err, PolicyError::Config(_)));
        let err = ensure_default_policy_file(Path::new("")).unwrap_err();
        assert!(matches!(err, PolicyError::Config(_)));
    }
}
