//! Synchronous process execution
//!
//! A [`ProcessRunner`] drives at most one child process at a time. `run` is
//! `start` followed by `finish`; the split exists so callers can feed stdin
//! or read a pipe while the process is alive.

use std::collections::HashMap;
use std::fmt;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Child, Command};

use tracing::{debug, info, warn};

use crate::descriptor::{DescriptorMap, StdStream};
use crate::error::{ProcessError, Result};

/// Program plus arguments, passed to the OS without a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    program: String,
    args: Vec<String>,
    sensitive: Vec<usize>,
}

impl CommandLine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            sensitive: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Add an argument whose value is masked when the command is displayed.
    pub fn secret_arg(mut self, arg: impl Into<String>) -> Self {
        self.sensitive.push(self.args.len());
        self.args.push(arg.into());
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&quote(&self.program))?;
        for (idx, arg) in self.args.iter().enumerate() {
            if self.sensitive.contains(&idx) {
                match arg.split_once('=') {
                    Some((name, _)) => write!(f, " {name}=\"***\"")?,
                    None => f.write_str(" ***")?,
                }
            } else {
                write!(f, " {}", quote(arg))?;
            }
        }
        Ok(())
    }
}

/// Quote an argument for display; `--name=value` keeps the name bare.
fn quote(arg: &str) -> String {
    let needs_quotes = |s: &str| {
        s.is_empty()
            || s.chars()
                .any(|c| c.is_whitespace() || matches!(c, '"' | '\'' | '\\' | '$' | '`' | ';' | '&' | '|'))
    };
    let escape = |s: &str| {
        let mut out = String::with_capacity(s.len() + 2);
        out.push('"');
        for c in s.chars() {
            if matches!(c, '"' | '\\' | '$' | '`') {
                out.push('\\');
            }
            out.push(c);
        }
        out.push('"');
        out
    };

    if let Some((name, value)) = arg.split_once('=') {
        if name.starts_with("--") && !needs_quotes(name) && needs_quotes(value) {
            return format!("{name}={}", escape(value));
        }
    }
    if needs_quotes(arg) { escape(arg) } else { arg.to_string() }
}

/// Extra spawn options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOptions {
    /// Start from an empty environment instead of inheriting the parent's.
    pub clear_env: bool,
}

/// Everything needed to start one process.
#[derive(Debug, Clone)]
pub struct ProcessSpec {
    pub command: CommandLine,
    pub descriptors: DescriptorMap,
    pub working_dir: Option<PathBuf>,
    /// Variables added to (or, with `clear_env`, replacing) the environment.
    pub env: Vec<(String, String)>,
    pub options: ProcessOptions,
}

impl ProcessSpec {
    pub fn new(command: CommandLine, descriptors: DescriptorMap) -> Self {
        Self {
            command,
            descriptors,
            working_dir: None,
            env: Vec::new(),
            options: ProcessOptions::default(),
        }
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn options(mut self, options: ProcessOptions) -> Self {
        self.options = options;
        self
    }
}

struct ActiveProcess {
    child: Child,
    command: String,
}

/// Runs one external process at a time, synchronously.
#[derive(Default)]
pub struct ProcessRunner {
    active: Option<ActiveProcess>,
    /// Pipe content drained by `finish`, readable until closed.
    captured: HashMap<StdStream, Vec<u8>>,
}

impl fmt::Debug for ProcessRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessRunner")
            .field("running", &self.active.as_ref().map(|a| &a.command))
            .field("captured", &self.captured.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }

    /// Run `spec` to completion and return its exit code (always 0 on `Ok`).
    ///
    /// # Errors
    ///
    /// - [`ProcessError::AlreadyRunning`] if this runner has an active process
    /// - [`ProcessError::Redirect`] / [`ProcessError::Spawn`] if it cannot start
    /// - [`ProcessError::Failed`] if it exits non-zero
    pub fn run(&mut self, spec: ProcessSpec) -> Result<i32> {
        self.start(spec)?;
        self.finish()
    }

    /// Spawn the process described by `spec` without waiting for it.
    ///
    /// # Errors
    ///
    /// Fails without spawning anything if a process is already active, if a
    /// file redirect cannot be opened, or if the OS rejects the command.
    pub fn start(&mut self, spec: ProcessSpec) -> Result<()> {
        if let Some(active) = &self.active {
            return Err(ProcessError::AlreadyRunning {
                command: active.command.clone(),
            });
        }
        self.captured.clear();

        let command_line = spec.command.to_string();
        let mut cmd = Command::new(spec.command.program());
        cmd.args(spec.command.get_args())
            .stdin(spec.descriptors.get(StdStream::Stdin).open(StdStream::Stdin)?)
            .stdout(spec.descriptors.get(StdStream::Stdout).open(StdStream::Stdout)?)
            .stderr(spec.descriptors.get(StdStream::Stderr).open(StdStream::Stderr)?);
        if let Some(dir) = &spec.working_dir {
            cmd.current_dir(dir);
        }
        if spec.options.clear_env {
            cmd.env_clear();
        }
        cmd.envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())));

        info!("Running command: {command_line}");
        let child = cmd.spawn().map_err(|source| ProcessError::Spawn {
            command: command_line.clone(),
            source,
        })?;
        debug!(pid = child.id(), "Process started");

        self.active = Some(ActiveProcess {
            child,
            command: command_line,
        });
        Ok(())
    }

    /// Close stdin, wait for the active process and collect its exit code.
    ///
    /// Pipes still open are drained; their content stays readable through
    /// [`ProcessRunner::read_stream`]. Returns `Ok(0)` when nothing is running.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::Failed`] with the captured stderr when the exit
    /// code is non-zero (or the process was killed by a signal).
    pub fn finish(&mut self) -> Result<i32> {
        let Some(ActiveProcess { mut child, command }) = self.active.take() else {
            return Ok(0);
        };

        drop(child.stdin.take());
        let stdout_open = child.stdout.is_some();
        let stderr_open = child.stderr.is_some();

        let output = child.wait_with_output().map_err(|source| ProcessError::Wait {
            command: command.clone(),
            source,
        })?;

        if stdout_open {
            self.captured.insert(StdStream::Stdout, output.stdout);
        }
        if stderr_open {
            self.captured.insert(StdStream::Stderr, output.stderr.clone());
        }

        let code = output.status.code().unwrap_or(-1);
        if code != 0 {
            let stderr = String::from_utf8_lossy(&output.stderr).trim_end().to_string();
            warn!(%command, code, "Process failed");
            return Err(ProcessError::Failed {
                command,
                code,
                stderr,
            });
        }

        info!(%command, "Process finished");
        Ok(code)
    }

    /// Read everything from a piped output stream.
    ///
    /// While the process runs this blocks until the stream reaches
    /// end-of-file. After `finish`, it returns what was drained. With `close`
    /// the stream is released and later reads return `None`; `None` is also
    /// returned for streams that are not pipes, and for stdin.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::Stream`] if reading the pipe fails.
    pub fn read_stream(&mut self, stream: StdStream, close: bool) -> Result<Option<Vec<u8>>> {
        if let Some(active) = self.active.as_mut() {
            let mut buf = Vec::new();
            let read = match stream {
                StdStream::Stdin => return Ok(None),
                StdStream::Stdout => match active.child.stdout.take() {
                    Some(mut pipe) => {
                        let res = pipe.read_to_end(&mut buf);
                        if !close {
                            active.child.stdout = Some(pipe);
                        }
                        Some(res)
                    }
                    None => None,
                },
                StdStream::Stderr => match active.child.stderr.take() {
                    Some(mut pipe) => {
                        let res = pipe.read_to_end(&mut buf);
                        if !close {
                            active.child.stderr = Some(pipe);
                        }
                        Some(res)
                    }
                    None => None,
                },
            };
            return match read {
                Some(Ok(_)) => Ok(Some(buf)),
                Some(Err(source)) => Err(ProcessError::Stream { stream, source }),
                None => Ok(None),
            };
        }

        if close {
            Ok(self.captured.remove(&stream))
        } else {
            Ok(self.captured.get(&stream).cloned())
        }
    }

    /// Write `data` to the child's stdin pipe.
    ///
    /// Returns `None` if stdin is not an open pipe of a running process.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::Stream`] if the write fails (e.g. the child
    /// closed its end).
    pub fn write_stream(&mut self, stream: StdStream, data: &[u8]) -> Result<Option<usize>> {
        if stream != StdStream::Stdin {
            return Ok(None);
        }
        let Some(pipe) = self.active.as_mut().and_then(|a| a.child.stdin.as_mut()) else {
            return Ok(None);
        };
        pipe.write_all(data)
            .and_then(|()| pipe.flush())
            .map_err(|source| ProcessError::Stream { stream, source })?;
        Ok(Some(data.len()))
    }

    /// Release a stream; returns whether anything was open.
    pub fn close_stream(&mut self, stream: StdStream) -> bool {
        if let Some(active) = self.active.as_mut() {
            return match stream {
                StdStream::Stdin => active.child.stdin.take().is_some(),
                StdStream::Stdout => active.child.stdout.take().is_some(),
                StdStream::Stderr => active.child.stderr.take().is_some(),
            };
        }
        self.captured.remove(&stream).is_some()
    }
}

impl Drop for ProcessRunner {
    fn drop(&mut self) {
        if let Some(mut active) = self.active.take() {
            warn!(command = %active.command, "Killing process left running");
            let _ = active.child.kill();
            let _ = active.child.wait();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_quotes_only_when_needed() {
        let cmd = CommandLine::new("mysqldump")
            .arg("--host=localhost")
            .arg("--comments=a b")
            .arg("app db");
        assert_eq!(
            cmd.to_string(),
            r#"mysqldump --host=localhost --comments="a b" "app db""#
        );
    }

    #[test]
    fn display_masks_secret_arguments() {
        let cmd = CommandLine::new("mysqldump")
            .secret_arg("--password=hunter2")
            .arg("app");
        assert_eq!(cmd.to_string(), r#"mysqldump --password="***" app"#);
        assert_eq!(cmd.get_args()[0], "--password=hunter2");
    }

    #[test]
    fn finish_without_process_is_zero() {
        let mut runner = ProcessRunner::new();
        assert_eq!(runner.finish().unwrap(), 0);
        assert!(!runner.is_running());
    }

    #[test]
    fn streams_unavailable_when_idle() {
        let mut runner = ProcessRunner::new();
        assert_eq!(runner.read_stream(StdStream::Stdout, true).unwrap(), None);
        assert_eq!(runner.write_stream(StdStream::Stdin, b"x").unwrap(), None);
        assert!(!runner.close_stream(StdStream::Stderr));
    }
}
