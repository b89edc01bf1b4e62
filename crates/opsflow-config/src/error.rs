use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(
        "required setting '{0}' is not set. Pass it with -c <key>=<value>, \
        a context file or the matching environment variable"
    )]
    MissingRequiredSetting(String),

    #[error("invalid value for setting '{name}': {value:?} ({reason})")]
    InvalidSetting {
        name: String,
        value: String,
        reason: String,
    },

    #[error("invalid override {0:?}: expected <key>=<value>")]
    InvalidOverride(String),

    #[error("invalid context file {path}: {message}")]
    InvalidContextFile { path: PathBuf, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
