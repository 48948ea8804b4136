//! Error types for deploy-fs

use std::path::PathBuf;

/// Result type for deploy-fs operations
pub type Result<T> = std::result::Result<T, Error>;

/// Fatal errors from deploy-fs operations.
///
/// Permission problems are not represented here: they are reported as
/// [`crate::PermissionOutcome`] values and never abort a run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Source path does not exist: {path}")]
    SourceNotFound { path: PathBuf },

    #[error("Failed to change environment. Unknown environment '{id}'")]
    UnknownEnvironment { id: String },

    #[error("Environment '{id}' already exists at {path}")]
    EnvironmentExists { id: String, path: PathBuf },

    #[error("Invalid {kind} '{value}': {reason}")]
    InvalidIdentifier {
        kind: &'static str,
        value: String,
        reason: &'static str,
    },

    #[error("Failed to parse {format} config at {path}: {message}")]
    ConfigParse {
        path: PathBuf,
        format: String,
        message: String,
    },

    #[error("Unsupported config format: {extension}")]
    UnsupportedFormat { extension: String },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
