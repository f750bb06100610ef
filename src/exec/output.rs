// src/exec/output.rs

//! Where a Command's stdout/stderr go.
//!
//! A logical [`OutputTarget`] is resolved into concrete OS handles by
//! [`OutputHandles::open`]. The returned guard owns every file it opened and
//! closes them when dropped, so the handles are released on every exit path
//! of a Command run (including spawn failures and panics).
//!
//! One guard lives for a whole Command run: every invocation of a serial
//! chain gets fresh `Stdio` values that point at the *same* open file
//! description, so their output accumulates in invocation order.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tracing::debug;

use crate::errors::{CmdpipeError, OutputError, Result};

/// Sentinel: discard output.
pub const NULL_DEVICE: &str = "/dev/null";

/// Sentinel: send stderr wherever stdout goes. Only valid for stderr.
pub const STDOUT_REDIRECT: &str = "/dev/stdout";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OutputTarget {
    /// Use the parent's handle.
    #[default]
    Inherit,
    /// Attach a pipe and keep what the process writes.
    Capture,
    /// The null device.
    Null,
    /// Same destination as stdout (stderr only).
    Stdout,
    File(PathBuf),
}

impl OutputTarget {
    /// Interpret a configured stdout value. Empty means inherit.
    pub fn for_stdout(value: &str) -> Result<Self> {
        match value {
            "" => Ok(OutputTarget::Inherit),
            NULL_DEVICE => Ok(OutputTarget::Null),
            STDOUT_REDIRECT => Err(CmdpipeError::Config(format!(
                "`{STDOUT_REDIRECT}` is only valid as a stderr target"
            ))),
            path => Ok(OutputTarget::File(PathBuf::from(path))),
        }
    }

    /// Interpret a configured stderr value. Empty means inherit.
    pub fn for_stderr(value: &str) -> Self {
        match value {
            "" => OutputTarget::Inherit,
            NULL_DEVICE => OutputTarget::Null,
            STDOUT_REDIRECT => OutputTarget::Stdout,
            path => OutputTarget::File(PathBuf::from(path)),
        }
    }

    pub fn is_inherit(&self) -> bool {
        matches!(self, OutputTarget::Inherit)
    }

    pub fn file_path(&self) -> Option<&Path> {
        match self {
            OutputTarget::File(p) => Some(p),
            _ => None,
        }
    }
}

#[derive(Debug)]
enum Slot {
    Inherit,
    Piped,
    Null,
    File { file: File, path: PathBuf },
    /// stderr shares stdout's destination.
    SameAsStdout,
}

/// Open OS handles for one Command run.
#[derive(Debug)]
pub struct OutputHandles {
    stdout: Slot,
    stderr: Slot,
}

impl OutputHandles {
    /// Resolve both targets, creating parent directories and opening files
    /// in append or truncate mode.
    pub fn open(
        stdout: &OutputTarget,
        stderr: &OutputTarget,
        append: bool,
    ) -> std::result::Result<Self, OutputError> {
        if stdout.is_inherit() && stderr.is_inherit() {
            debug!("stdout & stderr inheriting from parent process");
            return Ok(Self {
                stdout: Slot::Inherit,
                stderr: Slot::Inherit,
            });
        }

        let stdout_slot = open_slot("stdout", stdout, append)?;

        // Two targets naming the same file share one handle; opening it twice
        // in truncate mode would have the streams overwrite each other.
        let stderr_slot = match (stderr, &stdout_slot) {
            (OutputTarget::File(p), Slot::File { path, .. }) if p == path => {
                debug!(path = %p.display(), "stderr shares the stdout file handle");
                Slot::SameAsStdout
            }
            _ => open_slot("stderr", stderr, append)?,
        };

        Ok(Self {
            stdout: stdout_slot,
            stderr: stderr_slot,
        })
    }

    /// Fresh `Stdio` values for one invocation.
    pub fn stdio(&self) -> io::Result<(Stdio, Stdio)> {
        let stdout = slot_stdio(&self.stdout)?;
        let stderr = match &self.stderr {
            Slot::SameAsStdout => match &self.stdout {
                Slot::Inherit => parent_stdout()?,
                Slot::Null => Stdio::null(),
                Slot::File { file, .. } => Stdio::from(file.try_clone()?),
                Slot::Piped | Slot::SameAsStdout => {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        "stderr cannot be redirected to a captured stdout",
                    ));
                }
            },
            other => slot_stdio(other)?,
        };
        Ok((stdout, stderr))
    }
}

impl Drop for OutputHandles {
    fn drop(&mut self) {
        for slot in [&self.stdout, &self.stderr] {
            if let Slot::File { path, .. } = slot {
                debug!(path = %path.display(), "closing cmd file output");
            }
        }
    }
}

fn open_slot(
    stream: &'static str,
    target: &OutputTarget,
    append: bool,
) -> std::result::Result<Slot, OutputError> {
    let slot = match target {
        OutputTarget::Inherit => Slot::Inherit,
        OutputTarget::Capture => {
            debug!(stream, "capturing output");
            Slot::Piped
        }
        OutputTarget::Null => {
            debug!(stream, "redirecting to the null device");
            Slot::Null
        }
        OutputTarget::Stdout => {
            debug!(stream, "redirecting to stdout");
            Slot::SameAsStdout
        }
        OutputTarget::File(path) => {
            let mode = if append { "append" } else { "overwrite" };
            debug!(stream, path = %path.display(), mode, "writing output to file");
            let file = open_file(path, append).map_err(|e| OutputError::new(path, e))?;
            Slot::File {
                file,
                path: path.clone(),
            }
        }
    };
    Ok(slot)
}

fn open_file(path: &Path, append: bool) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut options = OpenOptions::new();
    options.create(true);
    if append {
        options.append(true);
    } else {
        options.write(true).truncate(true);
    }
    options.open(path)
}

fn slot_stdio(slot: &Slot) -> io::Result<Stdio> {
    Ok(match slot {
        Slot::Inherit | Slot::SameAsStdout => Stdio::inherit(),
        Slot::Piped => Stdio::piped(),
        Slot::Null => Stdio::null(),
        Slot::File { file, .. } => Stdio::from(file.try_clone()?),
    })
}

#[cfg(unix)]
fn parent_stdout() -> io::Result<Stdio> {
    use std::os::fd::AsFd;
    let fd = io::stdout().as_fd().try_clone_to_owned()?;
    Ok(Stdio::from(fd))
}

#[cfg(windows)]
fn parent_stdout() -> io::Result<Stdio> {
    use std::os::windows::io::AsHandle;
    let handle = io::stdout().as_handle().try_clone_to_owned()?;
    Ok(Stdio::from(handle))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn sentinels_are_not_paths() {
        assert_eq!(OutputTarget::for_stdout(NULL_DEVICE).unwrap(), OutputTarget::Null);
        assert_eq!(OutputTarget::for_stderr(NULL_DEVICE), OutputTarget::Null);
        assert_eq!(OutputTarget::for_stderr(STDOUT_REDIRECT), OutputTarget::Stdout);
        assert_eq!(OutputTarget::for_stdout("").unwrap(), OutputTarget::Inherit);
        assert_eq!(
            OutputTarget::for_stdout("logs/out.txt").unwrap(),
            OutputTarget::File(PathBuf::from("logs/out.txt"))
        );
    }

    #[test]
    fn stdout_redirect_sentinel_rejected_for_stdout() {
        match OutputTarget::for_stdout(STDOUT_REDIRECT) {
            Err(CmdpipeError::Config(msg)) => assert!(msg.contains("only valid as a stderr")),
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn open_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a/b/out.txt");

        let handles = OutputHandles::open(
            &OutputTarget::File(path.clone()),
            &OutputTarget::Inherit,
            false,
        )
        .unwrap();
        assert!(path.exists());
        assert!(handles.stdio().is_ok());
    }

    #[test]
    fn truncate_vs_append() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        fs::write(&path, "old\n").unwrap();

        {
            let handles =
                OutputHandles::open(&OutputTarget::File(path.clone()), &OutputTarget::Inherit, true)
                    .unwrap();
            if let Slot::File { file, .. } = &handles.stdout {
                let mut f = file.try_clone().unwrap();
                f.write_all(b"new\n").unwrap();
            }
        }
        assert_eq!(fs::read_to_string(&path).unwrap(), "old\nnew\n");

        {
            let _handles =
                OutputHandles::open(&OutputTarget::File(path.clone()), &OutputTarget::Inherit, false)
                    .unwrap();
        }
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn same_file_for_both_streams_shares_handle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("both.txt");
        let target = OutputTarget::File(path);

        let handles = OutputHandles::open(&target, &target, false).unwrap();
        assert!(matches!(handles.stderr, Slot::SameAsStdout));
    }

    #[test]
    fn unwritable_location_reports_output_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "x").unwrap();
        // a regular file can't be a parent directory
        let target = OutputTarget::File(blocker.join("child.txt"));

        let err = OutputHandles::open(&target, &OutputTarget::Inherit, false).unwrap_err();
        assert_eq!(err.path, blocker.join("child.txt"));
    }
}
