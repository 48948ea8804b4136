//! Standard stream wiring for a process

use std::fmt;
use std::fs::{File, OpenOptions};
use std::path::PathBuf;
use std::process::Stdio;

use crate::error::{ProcessError, Result};

/// One of the three standard streams of a child process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StdStream {
    Stdin,
    Stdout,
    Stderr,
}

impl fmt::Display for StdStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Stdin => "stdin",
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        };
        f.write_str(s)
    }
}

/// How a file redirect is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileMode {
    Read,
    /// Create or truncate.
    Write,
    /// Create or append.
    Append,
}

/// Where a standard stream goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Redirect {
    /// Shared with the parent process.
    Inherit,
    /// A pipe owned by the runner.
    Pipe,
    /// A file on disk.
    File { path: PathBuf, mode: FileMode },
    /// Discarded.
    Null,
}

impl Redirect {
    pub fn file_read(path: impl Into<PathBuf>) -> Self {
        Self::File {
            path: path.into(),
            mode: FileMode::Read,
        }
    }

    pub fn file_write(path: impl Into<PathBuf>) -> Self {
        Self::File {
            path: path.into(),
            mode: FileMode::Write,
        }
    }

    pub fn file_append(path: impl Into<PathBuf>) -> Self {
        Self::File {
            path: path.into(),
            mode: FileMode::Append,
        }
    }

    pub fn is_pipe(&self) -> bool {
        matches!(self, Self::Pipe)
    }

    pub(crate) fn open(&self, stream: StdStream) -> Result<Stdio> {
        match self {
            Self::Inherit => Ok(Stdio::inherit()),
            Self::Pipe => Ok(Stdio::piped()),
            Self::Null => Ok(Stdio::null()),
            Self::File { path, mode } => {
                let file = match mode {
                    FileMode::Read => File::open(path),
                    FileMode::Write => File::create(path),
                    FileMode::Append => OpenOptions::new().create(true).append(true).open(path),
                };
                file.map(Stdio::from).map_err(|source| ProcessError::Redirect {
                    stream,
                    path: path.clone(),
                    source,
                })
            }
        }
    }
}

/// Assignment of each standard stream to a [`Redirect`].
///
/// Every stream defaults to [`Redirect::Inherit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorMap {
    stdin: Redirect,
    stdout: Redirect,
    stderr: Redirect,
}

impl Default for DescriptorMap {
    fn default() -> Self {
        Self {
            stdin: Redirect::Inherit,
            stdout: Redirect::Inherit,
            stderr: Redirect::Inherit,
        }
    }
}

impl DescriptorMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// All three streams as pipes.
    pub fn piped() -> Self {
        Self {
            stdin: Redirect::Pipe,
            stdout: Redirect::Pipe,
            stderr: Redirect::Pipe,
        }
    }

    pub fn stdin(mut self, redirect: Redirect) -> Self {
        self.stdin = redirect;
        self
    }

    pub fn stdout(mut self, redirect: Redirect) -> Self {
        self.stdout = redirect;
        self
    }

    pub fn stderr(mut self, redirect: Redirect) -> Self {
        self.stderr = redirect;
        self
    }

    pub fn get(&self, stream: StdStream) -> &Redirect {
        match stream {
            StdStream::Stdin => &self.stdin,
            StdStream::Stdout => &self.stdout,
            StdStream::Stderr => &self.stderr,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_inherit() {
        let map = DescriptorMap::new();
        assert_eq!(map.get(StdStream::Stdin), &Redirect::Inherit);
        assert_eq!(map.get(StdStream::Stderr), &Redirect::Inherit);
    }

    #[test]
    fn builder_assigns_each_stream() {
        let map = DescriptorMap::new()
            .stdin(Redirect::Pipe)
            .stdout(Redirect::file_write("/tmp/dump.sql"))
            .stderr(Redirect::Pipe);
        assert!(map.get(StdStream::Stdin).is_pipe());
        assert_eq!(
            map.get(StdStream::Stdout),
            &Redirect::File {
                path: PathBuf::from("/tmp/dump.sql"),
                mode: FileMode::Write,
            }
        );
    }

    #[test]
    fn missing_read_redirect_fails_to_open() {
        let redirect = Redirect::file_read("/nonexistent/input.txt");
        let err = redirect.open(StdStream::Stdin).unwrap_err();
        assert!(matches!(err, ProcessError::Redirect { stream: StdStream::Stdin, .. }));
    }
}
