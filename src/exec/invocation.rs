// src/exec/invocation.rs

//! A single OS process launch.
//!
//! [`Invocation::prepare`] does the synchronous argument assembly (shell
//! string or argv) up front. The process is then started either with
//! [`Invocation::run`] (tokio, suspends while waiting) or
//! [`Invocation::run_blocking`] (std, blocks the calling thread). Both share
//! the same command construction and result decoding.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};

use tracing::{debug, error, info, warn};

use crate::errors::{DecodeError, InvocationError, SpawnError, WaitError};
use crate::exec::encoding::TextEncoding;
use crate::exec::output::OutputHandles;
use crate::exec::split::{ArgSplitter, SplitError};
use crate::result::{CmdLine, Output, SubprocessResult};

/// One entry of a Command spec, before argument assembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvocationSpec {
    /// A command line; split into argv unless run through the shell.
    Line(String),
    /// An argv that is already split and is used verbatim.
    Argv(Vec<String>),
}

impl fmt::Display for InvocationSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvocationSpec::Line(s) => f.write_str(s),
            InvocationSpec::Argv(argv) => write!(f, "{}", argv.join(" ")),
        }
    }
}

impl From<&str> for InvocationSpec {
    fn from(s: &str) -> Self {
        InvocationSpec::Line(s.to_string())
    }
}

impl From<String> for InvocationSpec {
    fn from(s: String) -> Self {
        InvocationSpec::Line(s)
    }
}

impl From<Vec<String>> for InvocationSpec {
    fn from(argv: Vec<String>) -> Self {
        InvocationSpec::Argv(argv)
    }
}

impl From<&[&str]> for InvocationSpec {
    fn from(argv: &[&str]) -> Self {
        InvocationSpec::Argv(argv.iter().map(|s| s.to_string()).collect())
    }
}

/// What to do with piped output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureMode {
    Off,
    Text(TextEncoding),
    Bytes,
}

impl CaptureMode {
    pub fn is_on(&self) -> bool {
        !matches!(self, CaptureMode::Off)
    }
}

#[derive(Debug, Clone)]
pub struct Invocation {
    cmd: CmdLine,
    /// Original command line, kept for the Windows pass-through path.
    #[cfg_attr(not(windows), allow(dead_code))]
    line: Option<String>,
    cwd: Option<PathBuf>,
    capture: CaptureMode,
}

impl Invocation {
    /// Assemble the arguments for `spec`.
    ///
    /// Fails (as a spawn error) when the line can't be tokenized or yields no
    /// program; no process exists at that point.
    pub fn prepare(
        spec: &InvocationSpec,
        use_shell: bool,
        splitter: &dyn ArgSplitter,
        cwd: Option<PathBuf>,
        capture: CaptureMode,
    ) -> Result<Self, SpawnError> {
        match &cwd {
            Some(dir) => debug!(cwd = %dir.display(), cmd = %spec, "processing command string in dir"),
            None => debug!(cmd = %spec, "processing command string"),
        }

        let (cmd, line) = match spec {
            InvocationSpec::Line(line) if use_shell => (CmdLine::Shell(line.clone()), None),
            InvocationSpec::Argv(argv) if use_shell => (CmdLine::Shell(argv.join(" ")), None),
            InvocationSpec::Line(line) => {
                let argv = splitter.split(line).map_err(|e| split_failure(line, e))?;
                debug!(splitter = splitter.name(), ?argv, "arg split");
                (CmdLine::Argv(argv), Some(line.clone()))
            }
            InvocationSpec::Argv(argv) => (CmdLine::Argv(argv.clone()), None),
        };

        if let CmdLine::Argv(argv) = &cmd {
            if argv.is_empty() {
                return Err(SpawnError::new(
                    spec.to_string(),
                    io::Error::new(io::ErrorKind::InvalidInput, "empty command"),
                ));
            }
        }

        Ok(Self {
            cmd,
            line,
            cwd,
            capture,
        })
    }

    pub fn cmd(&self) -> &CmdLine {
        &self.cmd
    }

    /// Spawn and wait without blocking the executor thread.
    pub async fn run(&self, handles: &OutputHandles) -> Result<SubprocessResult, InvocationError> {
        let mut command = tokio::process::Command::from(self.build(handles, false)?);
        command.kill_on_drop(true);

        let child = command.spawn().map_err(|e| self.spawn_failure(e))?;

        if self.capture.is_on() {
            let output = child
                .wait_with_output()
                .await
                .map_err(|e| self.wait_failure(e))?;
            self.finish_captured(output.status, output.stdout, output.stderr)
        } else {
            let mut child = child;
            let status = child.wait().await.map_err(|e| self.wait_failure(e))?;
            Ok(self.finish_uncaptured(status))
        }
    }

    /// Spawn and wait on the calling thread.
    pub fn run_blocking(&self, handles: &OutputHandles) -> Result<SubprocessResult, InvocationError> {
        let mut command = self.build(handles, true)?;

        let mut child = command.spawn().map_err(|e| self.spawn_failure(e))?;

        if self.capture.is_on() {
            let output = child
                .wait_with_output()
                .map_err(|e| self.wait_failure(e))?;
            self.finish_captured(output.status, output.stdout, output.stderr)
        } else {
            let status = child.wait().map_err(|e| self.wait_failure(e))?;
            Ok(self.finish_uncaptured(status))
        }
    }

    fn build(
        &self,
        handles: &OutputHandles,
        pass_through: bool,
    ) -> Result<std::process::Command, SpawnError> {
        let mut command = match &self.cmd {
            CmdLine::Shell(line) => shell_command(line),
            CmdLine::Argv(argv) => self.argv_command(argv, pass_through),
        };

        if let Some(dir) = &self.cwd {
            command.current_dir(dir);
        }

        let (stdout, stderr) = handles.stdio().map_err(|e| self.spawn_failure(e))?;
        // Both engines hand the parent's stdin through, capture or not.
        command.stdin(Stdio::inherit()).stdout(stdout).stderr(stderr);
        Ok(command)
    }

    #[cfg(windows)]
    fn argv_command(&self, argv: &[String], pass_through: bool) -> std::process::Command {
        use std::os::windows::process::CommandExt;

        // Without capture, the sequential engine lets Windows parse the rest
        // of the command line itself instead of re-quoting our tokens.
        if let (true, CaptureMode::Off, Some(line)) = (pass_through, self.capture, &self.line) {
            let (program, rest) = crate::exec::split::WindowsSplitter::split_program(line);
            let mut command = std::process::Command::new(program);
            if !rest.is_empty() {
                command.raw_arg(rest);
            }
            return command;
        }

        let mut command = std::process::Command::new(&argv[0]);
        command.args(&argv[1..]);
        command
    }

    #[cfg(not(windows))]
    fn argv_command(&self, argv: &[String], _pass_through: bool) -> std::process::Command {
        let mut command = std::process::Command::new(&argv[0]);
        command.args(&argv[1..]);
        command
    }

    fn finish_uncaptured(&self, status: ExitStatus) -> SubprocessResult {
        let code = exit_code(status);
        debug!(cmd = %self.cmd, exit_code = code, "process exited");
        SubprocessResult::new(self.cmd.clone(), code, None, None)
    }

    fn finish_captured(
        &self,
        status: ExitStatus,
        stdout: Vec<u8>,
        stderr: Vec<u8>,
    ) -> Result<SubprocessResult, InvocationError> {
        let code = exit_code(status);
        let stdout = self.decode("stdout", code, stdout)?;
        let stderr = self.decode("stderr", code, stderr)?;

        info!(cmd = %self.cmd, exit_code = code, "stdout: {stdout}");
        if !stderr.is_empty() {
            error!(cmd = %self.cmd, exit_code = code, "stderr: {stderr}");
        }

        Ok(SubprocessResult::new(
            self.cmd.clone(),
            code,
            Some(stdout),
            Some(stderr),
        ))
    }

    fn decode(
        &self,
        stream: &'static str,
        exit_code: i32,
        bytes: Vec<u8>,
    ) -> Result<Output, DecodeError> {
        match self.capture {
            CaptureMode::Text(encoding) => encoding
                .decode(&bytes)
                .map(|text| Output::Text(text.trim_end().to_string()))
                .map_err(|reason| DecodeError {
                    cmd: self.cmd.to_string(),
                    stream,
                    exit_code,
                    encoding: encoding.label(),
                    reason,
                }),
            CaptureMode::Bytes | CaptureMode::Off => Ok(Output::Bytes(bytes)),
        }
    }

    fn wait_failure(&self, err: io::Error) -> WaitError {
        warn!(cmd = %self.cmd, error = %err, "lost track of running process");
        WaitError::new(self.cmd.to_string(), err)
    }

    fn spawn_failure(&self, err: io::Error) -> SpawnError {
        warn!(cmd = %self.cmd, error = %err, "could not run process");
        SpawnError::new(self.cmd.to_string(), err)
    }
}

fn split_failure(line: &str, err: SplitError) -> SpawnError {
    SpawnError::new(line, io::Error::new(io::ErrorKind::InvalidInput, err))
}

#[cfg(windows)]
fn shell_command(line: &str) -> std::process::Command {
    use std::os::windows::process::CommandExt;
    let mut c = std::process::Command::new("cmd");
    c.arg("/C").raw_arg(line);
    c
}

#[cfg(not(windows))]
fn shell_command(line: &str) -> std::process::Command {
    let mut c = std::process::Command::new("sh");
    c.arg("-c").arg(line);
    c
}

/// Exit code, or the negated signal number when killed by a signal.
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }
    -1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::split::PosixSplitter;

    #[test]
    fn shell_keeps_the_literal_string() {
        let inv = Invocation::prepare(
            &"echo 'a  b' | tr a x".into(),
            true,
            &PosixSplitter,
            None,
            CaptureMode::Off,
        )
        .unwrap();
        assert_eq!(inv.cmd(), &CmdLine::Shell("echo 'a  b' | tr a x".into()));
    }

    #[test]
    fn line_is_split_but_argv_is_not() {
        let split = Invocation::prepare(
            &"echo 'a b' c".into(),
            false,
            &PosixSplitter,
            None,
            CaptureMode::Off,
        )
        .unwrap();
        assert_eq!(
            split.cmd().as_argv().unwrap(),
            ["echo".to_string(), "a b".into(), "c".into()]
        );

        let verbatim = Invocation::prepare(
            &InvocationSpec::Argv(vec!["echo".into(), "'a b'".into()]),
            false,
            &PosixSplitter,
            None,
            CaptureMode::Off,
        )
        .unwrap();
        assert_eq!(
            verbatim.cmd().as_argv().unwrap(),
            ["echo".to_string(), "'a b'".into()]
        );
    }

    #[test]
    fn bad_quoting_and_empty_lines_are_spawn_errors() {
        let err = Invocation::prepare(&"echo 'oops".into(), false, &PosixSplitter, None, CaptureMode::Off)
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);

        let err = Invocation::prepare(&"   ".into(), false, &PosixSplitter, None, CaptureMode::Off)
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn text_capture_strips_trailing_whitespace_only() {
        let inv = Invocation::prepare(
            &"x".into(),
            false,
            &PosixSplitter,
            None,
            CaptureMode::Text(TextEncoding::Utf8),
        )
        .unwrap();
        let out = inv.decode("stdout", 0, b"  one\ntwo \n\n".to_vec()).unwrap();
        assert_eq!(out, Output::Text("  one\ntwo".into()));
    }

    #[test]
    fn bytes_capture_is_untouched() {
        let inv = Invocation::prepare(&"x".into(), false, &PosixSplitter, None, CaptureMode::Bytes)
            .unwrap();
        let out = inv.decode("stdout", 0, b"raw \n".to_vec()).unwrap();
        assert_eq!(out, Output::Bytes(b"raw \n".to_vec()));
    }

    #[test]
    fn undecodable_output_is_a_decode_error() {
        let inv = Invocation::prepare(
            &"x".into(),
            false,
            &PosixSplitter,
            None,
            CaptureMode::Text(TextEncoding::Ascii),
        )
        .unwrap();
        let err = inv.decode("stderr", 7, vec![0xff]).unwrap_err();
        assert_eq!(err.stream, "stderr");
        assert_eq!(err.encoding, "ascii");
        assert_eq!(err.exit_code, 7);
    }
}
