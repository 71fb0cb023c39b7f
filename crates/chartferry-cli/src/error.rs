//! CLI error types with exit code handling
//!
//! Components return `CliError`; only `main` turns one into a process exit.

use chartferry_core::CoreError;
use chartferry_registry::RegistryError;
use miette::Diagnostic;
use thiserror::Error;

use crate::exit_codes;

/// CLI-specific error type that includes exit code information
#[derive(Error, Debug, Diagnostic, Clone)]
pub enum CliError {
    /// Input envelope unreadable or invalid
    #[error("Invalid input: {message}")]
    #[diagnostic(code(chartferry::cli::input))]
    MalformedInput {
        message: String,
        #[help]
        help: Option<String>,
    },

    #[error("No usable version: {message}")]
    #[diagnostic(
        code(chartferry::cli::version),
        help("set params.version, or point params.version_file at an existing file")
    )]
    MissingVersion { message: String },

    #[error("Version {version} does not satisfy source.version_range ({range})")]
    #[diagnostic(code(chartferry::cli::version_range))]
    VersionRange { version: String, range: String },

    #[error("Chart error: {message}")]
    #[diagnostic(code(chartferry::cli::chart))]
    Chart { message: String },

    /// repo add / dependency build / package failed
    #[error("Packaging failed: {message}")]
    #[diagnostic(code(chartferry::cli::package))]
    Packaging {
        message: String,
        #[help]
        help: Option<String>,
    },

    #[error("Chart inspection failed: {message}")]
    #[diagnostic(code(chartferry::cli::inspect))]
    Inspection { message: String },

    #[error("Signing misconfigured: {message}")]
    #[diagnostic(
        code(chartferry::cli::signing_config),
        help("with params.sign, set exactly one of params.key_data or params.key_file")
    )]
    SigningConfig { message: String },

    #[error("Importing the signing key failed: {message}")]
    #[diagnostic(code(chartferry::cli::signing_import))]
    SigningImport { message: String, code: Option<i32> },

    #[error("Unable to determine key id after successful import: {message}")]
    #[diagnostic(code(chartferry::cli::signing_key_id))]
    SigningKeyIdNotFound { message: String },

    #[error("Registry unreachable: {message}")]
    #[diagnostic(code(chartferry::cli::registry_unreachable))]
    RegistryUnreachable { message: String },

    #[error("Upload rejected: {status} - {reason}")]
    #[diagnostic(code(chartferry::cli::upload_rejected))]
    UploadRejected { status: u16, reason: String },

    #[error("An error occurred while uploading the chart: {message}")]
    #[diagnostic(code(chartferry::cli::upload_error))]
    UploadFailed { message: String },

    #[error("Chart has not been saved (saved={saved})")]
    #[diagnostic(code(chartferry::cli::upload_not_saved))]
    UploadNotSaved { saved: String },

    #[error("Version mismatch in uploaded chart: got {actual}, expected {expected}")]
    #[diagnostic(code(chartferry::cli::version_mismatch))]
    VersionMismatch { expected: String, actual: String },

    #[error("Chart not indexed: {message}")]
    #[diagnostic(
        code(chartferry::cli::not_indexed),
        help("the registry accepted the upload but did not serve it in time")
    )]
    NotIndexed { message: String },

    #[error("Chart {name} has no published version {version} (HTTP {status})")]
    #[diagnostic(
        code(chartferry::cli::version_not_found),
        help("run check to list the versions the registry serves")
    )]
    VersionNotFound {
        name: String,
        version: String,
        status: u16,
    },

    #[error("Integrity check failed: {message}")]
    #[diagnostic(code(chartferry::cli::integrity))]
    Integrity { message: String },

    /// IO error (file not found, permissions, etc.)
    #[error("IO error: {message}")]
    #[diagnostic(code(chartferry::cli::io))]
    Io { message: String },

    /// Wrapped error for passthrough (stores the formatted message)
    #[error("{message}")]
    #[diagnostic(code(chartferry::cli::error))]
    Other { message: String },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::MalformedInput { .. } => exit_codes::MALFORMED_INPUT,
            CliError::MissingVersion { .. } => exit_codes::MISSING_VERSION,
            CliError::VersionRange { .. } => exit_codes::VERSION_RANGE,
            CliError::Chart { .. } => exit_codes::CHART_NOT_FOUND,
            CliError::Packaging { .. } => exit_codes::PACKAGE_ERROR,
            CliError::Inspection { .. } => exit_codes::INSPECT_ERROR,
            CliError::SigningConfig { .. } => exit_codes::SIGNING_CONFIG,
            CliError::SigningImport { .. } => exit_codes::SIGNING_IMPORT,
            CliError::SigningKeyIdNotFound { .. } => exit_codes::SIGNING_KEY_ID,
            CliError::RegistryUnreachable { .. } => exit_codes::REGISTRY_UNREACHABLE,
            CliError::UploadRejected { .. } => exit_codes::UPLOAD_REJECTED,
            CliError::UploadFailed { .. } => exit_codes::UPLOAD_ERROR,
            CliError::UploadNotSaved { .. } => exit_codes::UPLOAD_NOT_SAVED,
            CliError::VersionMismatch { .. } => exit_codes::VERSION_MISMATCH,
            CliError::NotIndexed { .. } => exit_codes::NOT_INDEXED,
            CliError::Integrity { .. } => exit_codes::INTEGRITY_ERROR,
            CliError::VersionNotFound { .. } => exit_codes::VERSION_NOT_FOUND,
            CliError::Io { .. } => exit_codes::IO_ERROR,
            CliError::Other { .. } => exit_codes::ERROR,
        }
    }

    /// Create an input error (envelope or source settings)
    pub fn input(message: impl Into<String>) -> Self {
        Self::MalformedInput {
            message: message.into(),
            help: None,
        }
    }

    /// Create an input error with help text
    pub fn input_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::MalformedInput {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    /// Create a chart error
    pub fn chart(message: impl Into<String>) -> Self {
        Self::Chart {
            message: message.into(),
        }
    }

    /// Create a packaging error
    pub fn packaging(message: impl Into<String>) -> Self {
        Self::Packaging {
            message: message.into(),
            help: None,
        }
    }

    /// Create an inspection error
    pub fn inspection(message: impl Into<String>) -> Self {
        Self::Inspection {
            message: message.into(),
        }
    }

    /// Create a signing configuration error
    pub fn signing_config(message: impl Into<String>) -> Self {
        Self::SigningConfig {
            message: message.into(),
        }
    }

    /// Create an IO error from std::io::Error
    pub fn io(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::io(err)
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::VersionOutOfRange { version, range } => {
                CliError::VersionRange { version, range }
            }
            CoreError::VersionFileMissing { .. } | CoreError::VersionFileEmpty { .. } => {
                CliError::MissingVersion {
                    message: err.to_string(),
                }
            }
            CoreError::InvalidRange { .. } => {
                CliError::input_with_help(err.to_string(), "check source.version_range")
            }
            CoreError::ChartNotFound { .. }
            | CoreError::InvalidChart { .. }
            | CoreError::YamlParse(_) => CliError::chart(err.to_string()),
            CoreError::Io(e) => CliError::io(e),
        }
    }
}

impl From<RegistryError> for CliError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NetworkError { .. } | RegistryError::Timeout { .. } => {
                CliError::RegistryUnreachable {
                    message: err.to_string(),
                }
            }
            RegistryError::UploadRejected { status, reason } => {
                CliError::UploadRejected { status, reason }
            }
            RegistryError::UploadFailed { message } => CliError::UploadFailed { message },
            RegistryError::NotSaved { saved } => CliError::UploadNotSaved { saved },
            RegistryError::VersionMismatch { expected, actual } => {
                CliError::VersionMismatch { expected, actual }
            }
            RegistryError::NotIndexed { .. } => CliError::NotIndexed {
                message: err.to_string(),
            },
            RegistryError::IntegrityCheckFailed { .. } => CliError::Integrity {
                message: err.to_string(),
            },
            RegistryError::InvalidUrl { .. } | RegistryError::InvalidConfig { .. } => {
                CliError::input_with_help(err.to_string(), "check source.server_url and source.project")
            }
            RegistryError::Io(e) => CliError::io(e),
            RegistryError::HttpError { .. }
            | RegistryError::NoDownloadUrl { .. }
            | RegistryError::Serialization(_) => CliError::other(err.to_string()),
        }
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_errors_map_to_codes() {
        let err: CliError = CoreError::VersionOutOfRange {
            version: "2.0.0".to_string(),
            range: "^1".to_string(),
        }
        .into();
        assert_eq!(err.exit_code(), exit_codes::VERSION_RANGE);

        let err: CliError = CoreError::VersionFileMissing {
            path: "/v".to_string(),
        }
        .into();
        assert_eq!(err.exit_code(), exit_codes::MISSING_VERSION);

        let err: CliError = CoreError::ChartNotFound {
            path: "/c".to_string(),
        }
        .into();
        assert_eq!(err.exit_code(), exit_codes::CHART_NOT_FOUND);
    }

    #[test]
    fn test_upload_errors_map_to_distinct_codes() {
        let not_saved: CliError = RegistryError::NotSaved {
            saved: "false".to_string(),
        }
        .into();
        let failed: CliError = RegistryError::UploadFailed {
            message: "x".to_string(),
        }
        .into();
        let rejected: CliError = RegistryError::UploadRejected {
            status: 500,
            reason: "Internal Server Error".to_string(),
        }
        .into();
        let unreachable: CliError = RegistryError::NetworkError {
            message: "refused".to_string(),
        }
        .into();

        let codes = [
            not_saved.exit_code(),
            failed.exit_code(),
            rejected.exit_code(),
            unreachable.exit_code(),
        ];
        assert_eq!(
            codes,
            [
                exit_codes::UPLOAD_NOT_SAVED,
                exit_codes::UPLOAD_ERROR,
                exit_codes::UPLOAD_REJECTED,
                exit_codes::REGISTRY_UNREACHABLE
            ]
        );
    }

    #[test]
    fn test_poll_errors_map_to_codes() {
        let exhausted: CliError = RegistryError::NotIndexed {
            name: "c".to_string(),
            version: "1.0.0".to_string(),
            attempts: 3,
            last_status: 404,
        }
        .into();
        assert_eq!(exhausted.exit_code(), exit_codes::NOT_INDEXED);

        let mismatch: CliError = RegistryError::VersionMismatch {
            expected: "1.0.0".to_string(),
            actual: "1.0.1".to_string(),
        }
        .into();
        assert_eq!(mismatch.exit_code(), exit_codes::VERSION_MISMATCH);
    }
}
