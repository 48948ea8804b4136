//! External process execution for the deployment tools
//!
//! This crate provides the `ProcessRunner`, which runs one external command
//! at a time to completion. It handles:
//!
//! - Wiring stdin/stdout/stderr to pipes, files, or the parent's streams
//! - Blocking until the process exits and closing every redirect
//! - Turning a non-zero exit code into an error carrying captured stderr
//!
//! The `mysqldump` module builds on it to dump a database into a file.

pub mod descriptor;
pub mod error;
pub mod mysqldump;
pub mod runner;

pub use descriptor::{DescriptorMap, FileMode, Redirect, StdStream};
pub use error::{ProcessError, Result};
pub use mysqldump::{ConnectionConfig, Dsn, DumpReport, Mysqldump, MysqldumpConfig, parse_dsn};
pub use runner::{CommandLine, ProcessOptions, ProcessRunner, ProcessSpec};
