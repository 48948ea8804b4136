//! Error types for process execution

use std::path::PathBuf;

use crate::StdStream;

/// Fatal errors from running an external process
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    /// A process is already active on this runner
    #[error("Failed to start process. Process is already running: {command}")]
    AlreadyRunning {
        /// Command line of the active process
        command: String,
    },

    /// A file redirect could not be opened
    #[error("Failed to open {stream} redirect {path}: {source}")]
    Redirect {
        stream: StdStream,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The OS refused to start the process
    #[error("Failed to start process '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// Waiting for the process or draining its pipes failed
    #[error("Failed to wait for process '{command}': {source}")]
    Wait {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// Reading from or writing to a pipe failed
    #[error("I/O error on {stream}: {source}")]
    Stream {
        stream: StdStream,
        #[source]
        source: std::io::Error,
    },

    /// Subprocess exited with non-zero status
    #[error("Process failed with error \"{stderr}\" (exit code {code})")]
    Failed {
        /// Command line that was run
        command: String,
        /// Exit code from the subprocess, -1 if it was killed by a signal
        code: i32,
        /// Captured stderr output
        stderr: String,
    },

    /// Missing or invalid settings for a command
    #[error("{message}")]
    Config { message: String },

    /// Filesystem error while preparing output locations
    #[error(transparent)]
    Fs(#[from] deploy_fs::Error),
}

impl ProcessError {
    /// Exit code of a failed process, if this error came from one.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::Failed { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

/// Result type alias for process operations
pub type Result<T> = std::result::Result<T, ProcessError>;
