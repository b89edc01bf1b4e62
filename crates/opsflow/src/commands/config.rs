use colored::Colorize;
use opsflow_config::{Provenance, SettingKey, Sources, keys};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct SettingRow {
    name: &'static str,
    context_key: &'static str,
    env_var: &'static str,
    value: Option<String>,
    provenance: Option<Provenance>,
}

fn describe(sources: &Sources, key: &SettingKey) -> SettingRow {
    let (value, provenance) = match sources.lookup(key) {
        Some(setting) => (Some(setting.value), Some(setting.provenance)),
        None => match key.default {
            Some(default) => (Some(default.to_string()), Some(Provenance::Default)),
            None => (None, None),
        },
    };
    SettingRow {
        name: key.name,
        context_key: key.context_key,
        env_var: key.env_var,
        value,
        provenance,
    }
}

pub fn handle(sources: &Sources, json: bool) -> anyhow::Result<()> {
    let rows: Vec<SettingRow> = keys::ALL.iter().map(|key| describe(sources, key)).collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    for row in &rows {
        let value = match (&row.value, row.name) {
            (Some(value), _) => value.green().to_string(),
            (None, "main_bucket_name" | "log_bucket_name") => "(derived)".dimmed().to_string(),
            (None, "oidc_project_id") => "(not set)".yellow().to_string(),
            (None, _) => "(required)".red().bold().to_string(),
        };
        let provenance = row
            .provenance
            .map(|p| p.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<22} {} {}",
            row.name.cyan(),
            value,
            format!("[{}] -c {} / ${}", provenance, row.context_key, row.env_var).dimmed()
        );
    }
    Ok(())
}
