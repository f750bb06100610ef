// src/errors.rs

//! Crate-wide error types.
//!
//! Two families live here:
//!
//! - [`CmdpipeError`]: things that abort an operation outright (bad config,
//!   a failed batch, IO while loading a step file).
//! - [`InvocationError`] and friends: failures of a single process launch.
//!   These are *values* stored in the result tree and are only surfaced as a
//!   raised error once they are bundled into an [`AggregateError`].

use std::fmt;
use std::io;
use std::ops::Index;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::result::{CmdLine, Output};

#[derive(Error, Debug)]
pub enum CmdpipeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Aggregate(#[from] AggregateError),

    #[error("Async runtime error: {0}")]
    Runtime(String),

    #[error("Step not found: {0}")]
    StepNotFound(String),
}

pub type Result<T> = std::result::Result<T, CmdpipeError>;

/// The OS refused to start the process (missing binary, permissions, or an
/// argument string that could not be split into an argv).
#[derive(Error, Debug, Clone)]
#[error("failed to spawn '{cmd}': {source}")]
pub struct SpawnError {
    pub cmd: String,
    #[source]
    pub source: Arc<io::Error>,
}

impl SpawnError {
    pub fn new(cmd: impl Into<String>, source: io::Error) -> Self {
        Self {
            cmd: cmd.into(),
            source: Arc::new(source),
        }
    }

    pub fn kind(&self) -> io::ErrorKind {
        self.source.kind()
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == io::ErrorKind::NotFound
    }
}

/// A process that ran to completion with a non-zero exit code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitError {
    pub exit_code: i32,
    pub cmd: CmdLine,
    pub stdout: Option<Output>,
    pub stderr: Option<Output>,
}

impl fmt::Display for ExitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.exit_code < 0 {
            let signal = -self.exit_code;
            return match signal_name(signal) {
                Some(name) => write!(f, "Command '{}' died with {name}.", self.cmd),
                None => write!(
                    f,
                    "Command '{}' died with unknown signal {signal}.",
                    self.cmd
                ),
            };
        }

        write!(
            f,
            "Command '{}' returned non-zero exit status {}.",
            self.cmd, self.exit_code
        )?;
        match &self.stderr {
            Some(stderr) if !stderr.is_empty() => write!(f, " stderr: {stderr}"),
            _ => Ok(()),
        }
    }
}

impl std::error::Error for ExitError {}

fn signal_name(signal: i32) -> Option<&'static str> {
    let name = match signal {
        1 => "SIGHUP",
        2 => "SIGINT",
        3 => "SIGQUIT",
        4 => "SIGILL",
        6 => "SIGABRT",
        8 => "SIGFPE",
        9 => "SIGKILL",
        11 => "SIGSEGV",
        13 => "SIGPIPE",
        14 => "SIGALRM",
        15 => "SIGTERM",
        _ => return None,
    };
    Some(name)
}

/// Captured output could not be decoded with the configured encoding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("could not decode {stream} of '{cmd}' (exit status {exit_code}) as {encoding}: {reason}")]
pub struct DecodeError {
    pub cmd: String,
    pub stream: &'static str,
    /// Exit code of the process whose output could not be decoded.
    pub exit_code: i32,
    pub encoding: &'static str,
    pub reason: String,
}

/// The process started but waiting on it failed, so its outcome is unknown.
#[derive(Error, Debug, Clone)]
#[error("failed to wait on '{cmd}': {source}")]
pub struct WaitError {
    pub cmd: String,
    #[source]
    pub source: Arc<io::Error>,
}

impl WaitError {
    pub fn new(cmd: impl Into<String>, source: io::Error) -> Self {
        Self {
            cmd: cmd.into(),
            source: Arc::new(source),
        }
    }
}

/// An output file could not be prepared before any process was started.
#[derive(Error, Debug, Clone)]
#[error("failed to open output file {path:?}: {source}")]
pub struct OutputError {
    pub path: PathBuf,
    #[source]
    pub source: Arc<io::Error>,
}

impl OutputError {
    pub fn new(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self {
            path: path.into(),
            source: Arc::new(source),
        }
    }
}

/// Any failure that can sit in a result tree.
#[derive(Error, Debug, Clone)]
pub enum InvocationError {
    #[error(transparent)]
    Spawn(#[from] SpawnError),

    #[error(transparent)]
    Wait(#[from] WaitError),

    #[error(transparent)]
    Exit(#[from] ExitError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Output(#[from] OutputError),
}

impl InvocationError {
    /// Short label used when listing errors in an aggregate.
    pub fn kind_name(&self) -> &'static str {
        match self {
            InvocationError::Spawn(_) => "SpawnError",
            InvocationError::Wait(_) => "WaitError",
            InvocationError::Exit(_) => "ExitError",
            InvocationError::Decode(_) => "DecodeError",
            InvocationError::Output(_) => "OutputError",
        }
    }

    pub fn as_spawn(&self) -> Option<&SpawnError> {
        match self {
            InvocationError::Spawn(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_exit(&self) -> Option<&ExitError> {
        match self {
            InvocationError::Exit(e) => Some(e),
            _ => None,
        }
    }
}

/// Every failure observed during one orchestration run, in flattened
/// left-to-right order.
#[derive(Debug, Clone, Default)]
pub struct AggregateError {
    message: Option<String>,
    errors: Vec<InvocationError>,
}

impl AggregateError {
    pub fn new(message: Option<String>, errors: Vec<InvocationError>) -> Self {
        Self { message, errors }
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn errors(&self) -> &[InvocationError] {
        &self.errors
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&InvocationError> {
        self.errors.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, InvocationError> {
        self.errors.iter()
    }

    pub fn into_errors(self) -> Vec<InvocationError> {
        self.errors
    }
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(msg) => write!(f, "{msg}")?,
            None if self.errors.len() > 1 => write!(f, "Multiple error(s) occurred:")?,
            None => write!(f, "An error occurred:")?,
        }
        for err in &self.errors {
            write!(f, "\n{}: {err}", err.kind_name())?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregateError {}

impl Index<usize> for AggregateError {
    type Output = InvocationError;

    fn index(&self, index: usize) -> &Self::Output {
        &self.errors[index]
    }
}

impl IntoIterator for AggregateError {
    type Item = InvocationError;
    type IntoIter = std::vec::IntoIter<InvocationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

impl<'a> IntoIterator for &'a AggregateError {
    type Item = &'a InvocationError;
    type IntoIter = std::slice::Iter<'a, InvocationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exit_error(code: i32, stderr: Option<&str>) -> ExitError {
        ExitError {
            exit_code: code,
            cmd: CmdLine::Argv(vec!["false".to_string()]),
            stdout: None,
            stderr: stderr.map(|s| Output::Text(s.to_string())),
        }
    }

    #[test]
    fn exit_error_mentions_code_and_stderr() {
        let msg = exit_error(2, Some("boom")).to_string();
        assert_eq!(
            msg,
            "Command 'false' returned non-zero exit status 2. stderr: boom"
        );
    }

    #[test]
    fn exit_error_skips_empty_stderr() {
        let msg = exit_error(1, Some("")).to_string();
        assert_eq!(msg, "Command 'false' returned non-zero exit status 1.");
    }

    #[test]
    fn negative_exit_code_is_reported_as_signal() {
        assert_eq!(
            exit_error(-9, None).to_string(),
            "Command 'false' died with SIGKILL."
        );
        assert_eq!(
            exit_error(-42, None).to_string(),
            "Command 'false' died with unknown signal 42."
        );
    }

    #[test]
    fn aggregate_display_lists_every_error() {
        let spawn = SpawnError::new(
            "/no/such/binary",
            io::Error::new(io::ErrorKind::NotFound, "No such file or directory"),
        );
        let agg = AggregateError::new(
            None,
            vec![exit_error(1, None).into(), spawn.into()],
        );

        let text = agg.to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Multiple error(s) occurred:");
        assert!(lines[1].starts_with("ExitError: Command 'false'"));
        assert!(lines[2].starts_with("SpawnError: failed to spawn '/no/such/binary'"));
        assert_eq!(agg.len(), 2);
        assert!(agg[1].as_spawn().is_some_and(|e| e.is_not_found()));
    }

    #[test]
    fn wait_failure_is_not_a_spawn_failure() {
        let err: InvocationError =
            WaitError::new("sleep 10", io::Error::new(io::ErrorKind::Interrupted, "interrupted")).into();
        assert_eq!(err.kind_name(), "WaitError");
        assert!(err.as_spawn().is_none());
        assert_eq!(err.to_string(), "failed to wait on 'sleep 10': interrupted");
    }

    #[test]
    fn decode_error_keeps_exit_code() {
        let err = DecodeError {
            cmd: "cat blob".into(),
            stream: "stdout",
            exit_code: 3,
            encoding: "ascii",
            reason: "byte 0xc3 in position 0: ordinal not in range(128)".into(),
        };
        assert_eq!(
            err.to_string(),
            "could not decode stdout of 'cat blob' (exit status 3) as ascii: \
             byte 0xc3 in position 0: ordinal not in range(128)"
        );
    }

    #[test]
    fn aggregate_uses_custom_message() {
        let agg = AggregateError::new(Some("step failed:".into()), vec![exit_error(3, None).into()]);
        assert!(agg.to_string().starts_with("step failed:\nExitError:"));
        assert_eq!(agg.message(), Some("step failed:"));
    }
}
