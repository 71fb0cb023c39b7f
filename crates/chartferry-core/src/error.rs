//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Chart not found: {path}")]
    ChartNotFound { path: String },

    #[error("Invalid Chart.yaml: {message}")]
    InvalidChart { message: String },

    #[error("Failed to parse Chart.yaml: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid version range '{range}': {message}")]
    InvalidRange { range: String, message: String },

    #[error("Version {version} does not satisfy version range {range}")]
    VersionOutOfRange { version: String, range: String },

    #[error("Version file {path} does not exist and no version was given")]
    VersionFileMissing { path: String },

    #[error("Version file {path} is empty")]
    VersionFileEmpty { path: String },
}

pub type Result<T> = std::result::Result<T, CoreError>;
