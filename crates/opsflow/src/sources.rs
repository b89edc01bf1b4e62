use anyhow::Context;
use opsflow_config::{ContextMap, Sources};
use std::path::Path;

/// Gather context files, `-c` flags and the process environment
///
/// `-c` flags win over the context file; both win over the environment.
pub fn load(overrides: &[String], context_file: Option<&Path>) -> anyhow::Result<Sources> {
    let mut context = ContextMap::new();

    let path = match context_file {
        Some(path) => Some(path.to_path_buf()),
        None => opsflow_config::find_context_file()?,
    };
    if let Some(path) = path {
        let file_context = opsflow_config::load_context_file(&path)
            .with_context(|| format!("failed to load context file {}", path.display()))?;
        tracing::info!("Using context file {}", path.display());
        context.extend(file_context);
    }

    for raw in overrides {
        let (key, value) = opsflow_config::parse_override(raw)?;
        context.insert(key, value);
    }

    Ok(Sources::from_process_env(context))
}
