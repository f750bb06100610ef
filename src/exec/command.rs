// src/exec/command.rs

//! One top-level unit of work: a single invocation or a serial chain of
//! invocations sharing one output configuration.
//!
//! Individual failures never escape `run()`: a process that could not start
//! is stored as a [`ResultNode::Failed`], and a non-zero exit is a plain
//! [`SubprocessResult`]. Deciding whether that is fatal is left to the
//! orchestration boundary ([`crate::exec::CommandBatch`]).

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::errors::{CmdpipeError, InvocationError, OutputError, Result};
use crate::exec::encoding::{TextEncoding, default_encoding};
use crate::exec::invocation::{CaptureMode, Invocation, InvocationSpec};
use crate::exec::output::{OutputHandles, OutputTarget};
use crate::exec::split::platform_splitter;
use crate::result::{ResultNode, SerialResults, SubprocessResult, flatten_all};

/// What a Command runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandSpec {
    Single(InvocationSpec),
    /// Run in order; stop at the first entry that fails to start or exits
    /// non-zero.
    Serial(Vec<InvocationSpec>),
}

impl CommandSpec {
    pub fn serial<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<InvocationSpec>,
    {
        CommandSpec::Serial(entries.into_iter().map(Into::into).collect())
    }

    pub fn len(&self) -> usize {
        match self {
            CommandSpec::Single(_) => 1,
            CommandSpec::Serial(entries) => entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<&str> for CommandSpec {
    fn from(s: &str) -> Self {
        CommandSpec::Single(s.into())
    }
}

impl From<String> for CommandSpec {
    fn from(s: String) -> Self {
        CommandSpec::Single(s.into())
    }
}

impl From<InvocationSpec> for CommandSpec {
    fn from(spec: InvocationSpec) -> Self {
        CommandSpec::Single(spec)
    }
}

/// Settings shared by every invocation of one Command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOptions {
    pub use_shell: bool,
    pub cwd: Option<PathBuf>,
    /// Pipe stdout/stderr and keep them in the results.
    pub capture: bool,
    /// Decode captured output as text. Ignored without `capture`.
    pub text: bool,
    pub stdout: OutputTarget,
    pub stderr: OutputTarget,
    /// Falls back to [`default_encoding`] when unset.
    pub encoding: Option<TextEncoding>,
    /// Append to file targets instead of truncating them.
    pub append: bool,
}

impl Default for CommandOptions {
    fn default() -> Self {
        Self {
            use_shell: false,
            cwd: None,
            capture: false,
            text: true,
            stdout: OutputTarget::Inherit,
            stderr: OutputTarget::Inherit,
            encoding: None,
            append: false,
        }
    }
}

impl CommandOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shell(mut self, use_shell: bool) -> Self {
        self.use_shell = use_shell;
        self
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn capture(mut self, capture: bool) -> Self {
        self.capture = capture;
        self
    }

    pub fn text(mut self, text: bool) -> Self {
        self.text = text;
        self
    }

    pub fn stdout(mut self, target: OutputTarget) -> Self {
        self.stdout = target;
        self
    }

    pub fn stderr(mut self, target: OutputTarget) -> Self {
        self.stderr = target;
        self
    }

    pub fn encoding(mut self, encoding: TextEncoding) -> Self {
        self.encoding = Some(encoding);
        self
    }

    pub fn append(mut self, append: bool) -> Self {
        self.append = append;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandState {
    Created,
    Running,
    Completed,
}

#[derive(Debug)]
pub struct Command {
    spec: CommandSpec,
    options: CommandOptions,
    capture: CaptureMode,
    state: CommandState,
    results: Vec<ResultNode>,
}

impl Command {
    /// Validate `options` against `spec`.
    ///
    /// Capturing output and naming an explicit stdout/stderr target are
    /// mutually exclusive.
    pub fn new(spec: impl Into<CommandSpec>, options: CommandOptions) -> Result<Self> {
        let spec = spec.into();

        if spec.is_empty() {
            return Err(CmdpipeError::Config(
                "a serial command list needs at least one entry".to_string(),
            ));
        }

        if options.capture && !(options.stdout.is_inherit() && options.stderr.is_inherit()) {
            return Err(CmdpipeError::Config(
                "you can't set `stdout` or `stderr` when capturing output".to_string(),
            ));
        }

        if matches!(options.stdout, OutputTarget::Stdout) {
            return Err(CmdpipeError::Config(
                "stdout can't be redirected to itself".to_string(),
            ));
        }

        if matches!(options.stdout, OutputTarget::Capture)
            || matches!(options.stderr, OutputTarget::Capture)
        {
            return Err(CmdpipeError::Config(
                "set `capture` instead of using a capture output target".to_string(),
            ));
        }

        let capture = match (options.capture, options.text) {
            (false, _) => CaptureMode::Off,
            (true, true) => CaptureMode::Text(options.encoding.unwrap_or_else(default_encoding)),
            (true, false) => CaptureMode::Bytes,
        };

        Ok(Self {
            spec,
            options,
            capture,
            state: CommandState::Created,
            results: Vec::new(),
        })
    }

    pub fn spec(&self) -> &CommandSpec {
        &self.spec
    }

    pub fn options(&self) -> &CommandOptions {
        &self.options
    }

    pub fn cwd(&self) -> Option<&Path> {
        self.options.cwd.as_deref()
    }

    pub fn is_capture(&self) -> bool {
        self.options.capture
    }

    pub fn state(&self) -> CommandState {
        self.state
    }

    /// One node per run: the invocation's outcome, or the serial chain.
    pub fn results(&self) -> &[ResultNode] {
        &self.results
    }

    /// Every failure in [`Command::results`], in order.
    pub fn errors(&self) -> Vec<InvocationError> {
        flatten_all(&self.results)
    }

    /// Run with tokio, suspending only while processes run.
    pub async fn run(&mut self) {
        if !self.begin() {
            return;
        }

        let node = match self.open_handles() {
            Err(err) => self.unopened(err),
            Ok(handles) => match &self.spec {
                CommandSpec::Single(spec) => match self.prepare(spec) {
                    Ok(inv) => into_node(inv.run(&handles).await),
                    Err(err) => ResultNode::Failed(err),
                },
                CommandSpec::Serial(specs) => {
                    let mut chain = SerialResults::new();
                    for (idx, spec) in specs.iter().enumerate() {
                        let outcome = match self.prepare(spec) {
                            Ok(inv) => inv.run(&handles).await,
                            Err(err) => Err(err),
                        };
                        if !record(&mut chain, outcome) {
                            log_skipped(specs.len() - idx - 1);
                            break;
                        }
                    }
                    ResultNode::Serial(chain)
                }
            },
        };

        self.complete(node);
    }

    /// Run on the calling thread, one invocation after another.
    pub fn run_blocking(&mut self) {
        if !self.begin() {
            return;
        }

        let node = match self.open_handles() {
            Err(err) => self.unopened(err),
            Ok(handles) => match &self.spec {
                CommandSpec::Single(spec) => match self.prepare(spec) {
                    Ok(inv) => into_node(inv.run_blocking(&handles)),
                    Err(err) => ResultNode::Failed(err),
                },
                CommandSpec::Serial(specs) => {
                    let mut chain = SerialResults::new();
                    for (idx, spec) in specs.iter().enumerate() {
                        let outcome = self.prepare(spec).and_then(|inv| inv.run_blocking(&handles));
                        if !record(&mut chain, outcome) {
                            log_skipped(specs.len() - idx - 1);
                            break;
                        }
                    }
                    ResultNode::Serial(chain)
                }
            },
        };

        self.complete(node);
    }

    fn begin(&mut self) -> bool {
        match self.state {
            CommandState::Created => {
                self.state = CommandState::Running;
                true
            }
            state => {
                warn!(?state, spec = ?self.spec, "command already ran; keeping its results");
                false
            }
        }
    }

    fn complete(&mut self, node: ResultNode) {
        self.results.push(node);
        self.state = CommandState::Completed;
    }

    fn open_handles(&self) -> std::result::Result<OutputHandles, OutputError> {
        let (stdout, stderr) = if self.options.capture {
            (OutputTarget::Capture, OutputTarget::Capture)
        } else {
            (self.options.stdout.clone(), self.options.stderr.clone())
        };
        OutputHandles::open(&stdout, &stderr, self.options.append)
    }

    fn unopened(&self, err: OutputError) -> ResultNode {
        warn!(error = %err, "could not prepare command output");
        match &self.spec {
            CommandSpec::Single(_) => ResultNode::Failed(err.into()),
            CommandSpec::Serial(_) => {
                let mut chain = SerialResults::new();
                chain.halt(err.into());
                ResultNode::Serial(chain)
            }
        }
    }

    fn prepare(&self, spec: &InvocationSpec) -> std::result::Result<Invocation, InvocationError> {
        Invocation::prepare(
            spec,
            self.options.use_shell,
            platform_splitter(),
            self.options.cwd.clone(),
            self.capture,
        )
        .map_err(InvocationError::from)
    }
}

fn into_node(outcome: std::result::Result<SubprocessResult, InvocationError>) -> ResultNode {
    match outcome {
        Ok(result) => ResultNode::Completed(result),
        Err(err) => ResultNode::Failed(err),
    }
}

/// Add one chain outcome; returns whether the chain may continue.
fn record(
    chain: &mut SerialResults,
    outcome: std::result::Result<SubprocessResult, InvocationError>,
) -> bool {
    match outcome {
        Ok(result) => {
            let ok = result.success();
            chain.push(ResultNode::Completed(result));
            ok
        }
        Err(err) => {
            chain.halt(err);
            false
        }
    }
}

fn log_skipped(remaining: usize) {
    if remaining > 0 {
        info!(skipped = remaining, "serial chain stopped early");
    } else {
        debug!("serial chain stopped at its last entry");
    }
}
