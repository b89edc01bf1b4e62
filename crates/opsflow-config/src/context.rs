//! Context files and `-c key=value` overrides

use crate::error::{ConfigError, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Flat map of context key to raw value
pub type ContextMap = BTreeMap<String, String>;

const CONTEXT_PATH_ENV: &str = "OPSFLOW_CONTEXT_PATH";
const CONTEXT_DIR: &str = ".opsflow";
const CANDIDATES: [&str; 4] = [
    "opsflow.local.json",
    "opsflow.json",
    "opsflow.local.yaml",
    "opsflow.yaml",
];

/// Find the context file for the current project
///
/// Search order:
/// 1. `OPSFLOW_CONTEXT_PATH` (direct path)
/// 2. current directory: opsflow.local.json, opsflow.json, opsflow.local.yaml, opsflow.yaml
/// 3. `./.opsflow/` with the same order
/// 4. `~/.config/opsflow/` with the same order
///
/// A missing context file is not an error; settings then come from the
/// environment and defaults alone.
pub fn find_context_file() -> Result<Option<PathBuf>> {
    if let Ok(context_path) = std::env::var(CONTEXT_PATH_ENV) {
        let path = PathBuf::from(context_path);
        if path.exists() {
            return Ok(Some(path));
        }
        tracing::warn!(
            "{} points to {}, which does not exist",
            CONTEXT_PATH_ENV,
            path.display()
        );
    }

    let current_dir = std::env::current_dir()?;
    let global_dir = dirs::config_dir().map(|d| d.join("opsflow"));
    Ok(find_context_file_from(&current_dir, global_dir.as_deref()))
}

/// Directory-based part of [`find_context_file`]
pub fn find_context_file_from(current_dir: &Path, global_dir: Option<&Path>) -> Option<PathBuf> {
    let project_dir = current_dir.join(CONTEXT_DIR);
    let search_dirs = [Some(current_dir), Some(project_dir.as_path()), global_dir];

    search_dirs
        .into_iter()
        .flatten()
        .filter(|dir| dir.is_dir())
        .flat_map(|dir| CANDIDATES.iter().map(move |name| dir.join(name)))
        .find(|path| path.exists())
}

/// Load a context file into a flat map
///
/// Accepts either a flat object or a `cdk.json`-style document with the
/// values under a top-level `context` key. Scalars are stringified; nested
/// objects and arrays are rejected.
pub fn load_context_file(path: &Path) -> Result<ContextMap> {
    let content = std::fs::read_to_string(path)?;
    let invalid = |message: String| ConfigError::InvalidContextFile {
        path: path.to_path_buf(),
        message,
    };

    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    );
    let document: serde_json::Value = if is_yaml {
        serde_yaml::from_str(&content).map_err(|e| invalid(e.to_string()))?
    } else {
        serde_json::from_str(&content).map_err(|e| invalid(e.to_string()))?
    };

    let object = match document.get("context") {
        Some(inner) => inner,
        None => &document,
    };
    let object = object
        .as_object()
        .ok_or_else(|| invalid("expected a mapping of context keys".to_string()))?;

    let mut context = ContextMap::new();
    for (key, value) in object {
        let value = match value {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Bool(b) => b.to_string(),
            serde_json::Value::Number(n) => n.to_string(),
            serde_json::Value::Null => continue,
            _ => return Err(invalid(format!("context key '{}' must be a scalar", key))),
        };
        context.insert(key.clone(), value);
    }

    tracing::debug!(
        "Loaded {} context values from {}",
        context.len(),
        path.display()
    );
    Ok(context)
}

/// Parse a `key=value` override flag
pub fn parse_override(raw: &str) -> Result<(String, String)> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(ConfigError::InvalidOverride(raw.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_find_context_file_in_current_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(temp_dir.path().join("opsflow.json"), "{}").unwrap();

        let found = find_context_file_from(temp_dir.path(), None).unwrap();
        assert!(found.ends_with("opsflow.json"));
    }

    #[test]
    fn test_find_context_file_local_priority() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(temp_dir.path().join("opsflow.json"), "{}").unwrap();
        fs::write(temp_dir.path().join("opsflow.local.json"), "{}").unwrap();

        let found = find_context_file_from(temp_dir.path(), None).unwrap();
        assert!(found.ends_with("opsflow.local.json"));
    }

    #[test]
    fn test_find_context_file_in_project_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let project_dir = temp_dir.path().join(".opsflow");
        fs::create_dir(&project_dir).unwrap();
        fs::write(project_dir.join("opsflow.yaml"), "env: prod").unwrap();

        let found = find_context_file_from(temp_dir.path(), None).unwrap();
        assert!(found.ends_with(".opsflow/opsflow.yaml"));
    }

    #[test]
    fn test_find_context_file_global_fallback() {
        let project = tempfile::tempdir().unwrap();
        let global = tempfile::tempdir().unwrap();
        fs::write(global.path().join("opsflow.json"), "{}").unwrap();

        let found = find_context_file_from(project.path(), Some(global.path())).unwrap();
        assert_eq!(found, global.path().join("opsflow.json"));
    }

    #[test]
    fn test_find_context_file_not_found() {
        let temp_dir = tempfile::tempdir().unwrap();
        assert!(find_context_file_from(temp_dir.path(), None).is_none());
    }

    #[test]
    fn test_find_context_file_env_var() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("custom.json");
        fs::write(&path, "{}").unwrap();

        temp_env::with_var(CONTEXT_PATH_ENV, Some(path.to_str().unwrap()), || {
            let found = find_context_file().unwrap();
            assert_eq!(found, Some(path.clone()));
        });
    }

    #[test]
    fn test_load_cdk_style_context() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("opsflow.json");
        fs::write(
            &path,
            r#"{"context": {"env": "stg", "nat_gateways": 1, "restrict_to_project": false}}"#,
        )
        .unwrap();

        let context = load_context_file(&path).unwrap();
        assert_eq!(context.get("env").unwrap(), "stg");
        assert_eq!(context.get("nat_gateways").unwrap(), "1");
        assert_eq!(context.get("restrict_to_project").unwrap(), "false");
    }

    #[test]
    fn test_load_flat_yaml_context() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("opsflow.yaml");
        fs::write(&path, "env: prod\ncircleci_org_id: org-1\nregion: ~\n").unwrap();

        let context = load_context_file(&path).unwrap();
        assert_eq!(context.len(), 2);
        assert_eq!(context.get("circleci_org_id").unwrap(), "org-1");
    }

    #[test]
    fn test_load_context_rejects_nested_values() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("opsflow.json");
        fs::write(&path, r#"{"env": {"name": "dev"}}"#).unwrap();

        let err = load_context_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidContextFile { .. }));
    }

    #[test]
    fn test_parse_override() {
        assert_eq!(
            parse_override("env=prod").unwrap(),
            ("env".to_string(), "prod".to_string())
        );
        assert_eq!(
            parse_override("app_managed_policies=a=b").unwrap(),
            ("app_managed_policies".to_string(), "a=b".to_string())
        );
        assert!(parse_override("=prod").is_err());
        assert!(parse_override("prod").is_err());
    }
}
