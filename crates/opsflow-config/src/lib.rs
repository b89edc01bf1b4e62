//! Setting resolution for opsflow
//!
//! Every setting is looked up in a fixed order: explicit overrides
//! (`-c key=value` flags and context files), then the process environment,
//! then a hard-coded default. Settings without a default that no source
//! provides fail with [`ConfigError::MissingRequiredSetting`].

pub mod context;
pub mod error;
pub mod resolver;
pub mod settings;

pub use context::{
    ContextMap, find_context_file, find_context_file_from, load_context_file, parse_override,
};
pub use error::*;
pub use resolver::{Provenance, Setting, SettingKey, Sources};
pub use settings::{BaseSettings, CiRoleSettings, OidcProviderMode, keys};
