//! Ranked setting resolution

use crate::context::ContextMap;
use crate::error::{ConfigError, Result};
use serde::Serialize;
use std::collections::HashMap;

/// Where a resolved value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// `-c key=value` flag or context file
    Override,
    /// Process environment variable
    Environment,
    /// Hard-coded or derived default
    Default,
}

impl std::fmt::Display for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Provenance::Override => write!(f, "override"),
            Provenance::Environment => write!(f, "environment"),
            Provenance::Default => write!(f, "default"),
        }
    }
}

/// A setting after resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Setting {
    pub name: String,
    pub value: String,
    pub provenance: Provenance,
}

/// Names under which a setting can be supplied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettingKey {
    /// Canonical setting name, used in error messages
    pub name: &'static str,
    /// Key in the override map
    pub context_key: &'static str,
    /// Environment variable name
    pub env_var: &'static str,
    /// Static default; `None` makes the setting required
    pub default: Option<&'static str>,
}

/// The two ranked input maps
#[derive(Debug, Clone, Default)]
pub struct Sources {
    overrides: ContextMap,
    environment: HashMap<String, String>,
}

impl Sources {
    pub fn new(overrides: ContextMap, environment: HashMap<String, String>) -> Self {
        Self {
            overrides,
            environment,
        }
    }

    /// Capture the current process environment
    ///
    /// Variables whose name or value is not valid UTF-8 are skipped; no
    /// setting can be read from them.
    pub fn from_process_env(overrides: ContextMap) -> Self {
        let environment = std::env::vars_os()
            .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
            .collect();
        Self::new(overrides, environment)
    }

    pub fn with_override(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.overrides.insert(key.into(), value.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }

    /// Look a setting up in the overrides and the environment only
    ///
    /// Empty strings count as absent.
    pub fn lookup(&self, key: &SettingKey) -> Option<Setting> {
        let found = |value: Option<&String>| value.filter(|v| !v.is_empty()).cloned();

        if let Some(value) = found(self.overrides.get(key.context_key)) {
            return Some(Setting {
                name: key.name.to_string(),
                value,
                provenance: Provenance::Override,
            });
        }

        found(self.environment.get(key.env_var)).map(|value| Setting {
            name: key.name.to_string(),
            value,
            provenance: Provenance::Environment,
        })
    }

    /// Resolve a setting, falling back to its static default
    pub fn resolve(&self, key: &SettingKey) -> Result<Setting> {
        self.resolve_with(key, key.default)
    }

    /// Resolve a setting with a caller-computed default
    pub fn resolve_or(&self, key: &SettingKey, default: &str) -> Result<Setting> {
        self.resolve_with(key, Some(default))
    }

    fn resolve_with(&self, key: &SettingKey, default: Option<&str>) -> Result<Setting> {
        if let Some(setting) = self.lookup(key) {
            tracing::debug!("{} = {:?} ({})", key.name, setting.value, setting.provenance);
            return Ok(setting);
        }

        match default {
            Some(value) => {
                tracing::debug!("{} = {:?} (default)", key.name, value);
                Ok(Setting {
                    name: key.name.to_string(),
                    value: value.to_string(),
                    provenance: Provenance::Default,
                })
            }
            None => Err(ConfigError::MissingRequiredSetting(key.name.to_string())),
        }
    }
}

impl Setting {
    /// Parse the value, reporting failures against the setting name
    pub fn parse<T>(&self) -> Result<T>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        self.value
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidSetting {
                name: self.name.clone(),
                value: self.value.clone(),
                reason: e.to_string(),
            })
    }

    /// Parse a boolean flag (`true`/`false`, `1`/`0`, `yes`/`no`)
    pub fn parse_flag(&self) -> Result<bool> {
        match self.value.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            _ => Err(ConfigError::InvalidSetting {
                name: self.name.clone(),
                value: self.value.clone(),
                reason: "expected true or false".to_string(),
            }),
        }
    }

    /// Split a comma separated list, dropping empty entries
    pub fn parse_list(&self) -> Vec<String> {
        self.value
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}
