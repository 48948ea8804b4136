//! Error types for deploy-cli

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

/// Errors that can occur in CLI operations
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Error from deploy-fs
    #[error(transparent)]
    Fs(#[from] deploy_fs::Error),

    /// Error from deploy-process
    #[error(transparent)]
    Process(#[from] deploy_process::ProcessError),

    /// Standard I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON output error
    #[error("Failed to render JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// User-facing error with a message
    #[error("{message}")]
    User { message: String },
}

impl CliError {
    /// Create a new user error with the given message
    pub fn user(message: impl Into<String>) -> Self {
        Self::User {
            message: message.into(),
        }
    }

    /// Exit code for the binary: a failed process's own code, otherwise 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Process(e) => e.exit_code().filter(|code| *code > 0).unwrap_or(1),
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_error_displays_message() {
        let error = CliError::user("test error");
        assert_eq!(format!("{}", error), "test error");
        assert_eq!(error.exit_code(), 1);
    }

    #[test]
    fn failed_process_code_is_propagated() {
        let error = CliError::from(deploy_process::ProcessError::Failed {
            command: "mysqldump shop".into(),
            code: 2,
            stderr: "Access denied".into(),
        });
        assert_eq!(error.exit_code(), 2);
    }

    #[test]
    fn signal_exit_maps_to_one() {
        let error = CliError::from(deploy_process::ProcessError::Failed {
            command: "mysqldump shop".into(),
            code: -1,
            stderr: String::new(),
        });
        assert_eq!(error.exit_code(), 1);
    }

    #[test]
    fn unknown_environment_exits_one() {
        let error = CliError::from(deploy_fs::Error::UnknownEnvironment { id: "qa".into() });
        assert_eq!(error.exit_code(), 1);
        assert!(error.to_string().contains("Unknown environment 'qa'"));
    }
}
