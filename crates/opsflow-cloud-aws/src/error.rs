//! AWS descriptor error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AwsError {
    #[error(
        "required setting '{0}' is not set. Pass it with -c <key>=<value>, \
        a context file or the matching environment variable"
    )]
    MissingRequiredSetting(String),

    #[error("Invalid network layout: {0}")]
    InvalidNetwork(String),

    #[error("Cloud error: {0}")]
    CloudError(#[from] opsflow_cloud::CloudError),
}

pub type Result<T> = std::result::Result<T, AwsError>;
