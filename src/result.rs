// src/result.rs

//! Outcomes of process invocations and the recursive result tree.
//!
//! A run produces, per Command, one [`ResultNode`]:
//!
//! - `Completed` for a process that ran (any exit code),
//! - `Failed` for an invocation that never produced a process,
//! - `Serial` for a serial chain, holding the attempted entries in order.
//!
//! [`flatten`] walks that tree and yields every failure left-to-right.

use std::fmt;
use std::ops::Deref;

use crate::errors::{ExitError, InvocationError};

/// The resolved instruction handed to the OS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CmdLine {
    /// Literal string passed to the platform shell.
    Shell(String),
    /// Program followed by its arguments.
    Argv(Vec<String>),
}

impl CmdLine {
    pub fn as_argv(&self) -> Option<&[String]> {
        match self {
            CmdLine::Argv(argv) => Some(argv),
            CmdLine::Shell(_) => None,
        }
    }
}

impl fmt::Display for CmdLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CmdLine::Shell(s) => write!(f, "{s}"),
            CmdLine::Argv(argv) => write!(f, "{}", argv.join(" ")),
        }
    }
}

/// Captured stream contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    /// Decoded text with trailing whitespace removed.
    Text(String),
    /// Raw bytes, untouched.
    Bytes(Vec<u8>),
}

impl Output {
    pub fn is_empty(&self) -> bool {
        match self {
            Output::Text(s) => s.is_empty(),
            Output::Bytes(b) => b.is_empty(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Output::Text(s) => Some(s),
            Output::Bytes(_) => None,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Output::Text(s) => s.as_bytes(),
            Output::Bytes(b) => b,
        }
    }
}

impl fmt::Display for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Output::Text(s) => write!(f, "{s}"),
            Output::Bytes(b) => write!(f, "{}", String::from_utf8_lossy(b)),
        }
    }
}

/// Result of one process that actually ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubprocessResult {
    pub cmd: CmdLine,
    /// Exit code; negative means terminated by that signal (POSIX).
    pub exit_code: i32,
    /// `None` when stdout was not captured.
    pub stdout: Option<Output>,
    /// `None` when stderr was not captured.
    pub stderr: Option<Output>,
}

impl SubprocessResult {
    pub fn new(
        cmd: CmdLine,
        exit_code: i32,
        stdout: Option<Output>,
        stderr: Option<Output>,
    ) -> Self {
        Self {
            cmd,
            exit_code,
            stdout,
            stderr,
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Return the error for a non-zero exit code, without raising it.
    pub fn check_exit_code(&self) -> Option<ExitError> {
        if self.exit_code == 0 {
            return None;
        }
        Some(ExitError {
            exit_code: self.exit_code,
            cmd: self.cmd.clone(),
            stdout: self.stdout.clone(),
            stderr: self.stderr.clone(),
        })
    }
}

impl fmt::Display for SubprocessResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn show(o: &Option<Output>) -> String {
            o.as_ref().map(|o| o.to_string()).unwrap_or_else(|| "None".into())
        }
        writeln!(f, "cmd: {}", self.cmd)?;
        writeln!(f, "exit_code: {}", self.exit_code)?;
        writeln!(f, "stdout: {}", show(&self.stdout))?;
        writeln!(f, "stderr: {}", show(&self.stderr))
    }
}

/// Entries of a serial chain, in the order they were attempted.
///
/// `halted_by` is set when the chain stopped because an entry could not be
/// started at all; that entry has no result of its own.
#[derive(Debug, Clone, Default)]
pub struct SerialResults {
    entries: Vec<ResultNode>,
    halted_by: Option<InvocationError>,
}

impl SerialResults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, node: ResultNode) {
        self.entries.push(node);
    }

    pub fn halt(&mut self, error: InvocationError) {
        self.halted_by = Some(error);
    }

    pub fn halted_by(&self) -> Option<&InvocationError> {
        self.halted_by.as_ref()
    }

    pub fn entries(&self) -> &[ResultNode] {
        &self.entries
    }
}

impl Deref for SerialResults {
    type Target = [ResultNode];

    fn deref(&self) -> &Self::Target {
        &self.entries
    }
}

impl From<Vec<ResultNode>> for SerialResults {
    fn from(entries: Vec<ResultNode>) -> Self {
        Self {
            entries,
            halted_by: None,
        }
    }
}

/// One node of the result tree.
#[derive(Debug, Clone)]
pub enum ResultNode {
    Completed(SubprocessResult),
    Failed(InvocationError),
    Serial(SerialResults),
}

impl ResultNode {
    pub fn as_completed(&self) -> Option<&SubprocessResult> {
        match self {
            ResultNode::Completed(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_failed(&self) -> Option<&InvocationError> {
        match self {
            ResultNode::Failed(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_serial(&self) -> Option<&SerialResults> {
        match self {
            ResultNode::Serial(s) => Some(s),
            _ => None,
        }
    }
}

impl From<SubprocessResult> for ResultNode {
    fn from(r: SubprocessResult) -> Self {
        ResultNode::Completed(r)
    }
}

impl From<InvocationError> for ResultNode {
    fn from(e: InvocationError) -> Self {
        ResultNode::Failed(e)
    }
}

impl From<SerialResults> for ResultNode {
    fn from(s: SerialResults) -> Self {
        ResultNode::Serial(s)
    }
}

/// Collect every failure in `node`, left to right.
pub fn flatten(node: &ResultNode) -> Vec<InvocationError> {
    let mut out = Vec::new();
    flatten_into(node, &mut out);
    out
}

/// [`flatten`] over a list of sibling nodes.
pub fn flatten_all(nodes: &[ResultNode]) -> Vec<InvocationError> {
    let mut out = Vec::new();
    for node in nodes {
        flatten_into(node, &mut out);
    }
    out
}

fn flatten_into(node: &ResultNode, out: &mut Vec<InvocationError>) {
    match node {
        ResultNode::Failed(err) => out.push(err.clone()),
        ResultNode::Completed(result) => {
            if let Some(err) = result.check_exit_code() {
                out.push(err.into());
            }
        }
        ResultNode::Serial(chain) => {
            for entry in chain.entries() {
                flatten_into(entry, out);
            }
            if let Some(err) = chain.halted_by() {
                out.push(err.clone());
            }
        }
    }
}
