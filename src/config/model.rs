// src/config/model.rs

use std::path::PathBuf;

use serde::Deserialize;

use crate::exec::{CommandOptions, CommandSpec};

/// Step file as read from TOML, before validation.
///
/// ```toml
/// [[step]]
/// name = "build"
/// kind = "cmds"
/// run = ["cargo build", ["cargo test", "cargo doc"]]
///
/// [[step]]
/// name = "rev"
/// run = { run = "git rev-parse HEAD", save = true }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct RawStepFile {
    #[serde(default, rename = "step")]
    pub steps: Vec<RawStep>,
}

/// `[[step]]` table.
#[derive(Debug, Clone, Deserialize)]
pub struct RawStep {
    pub name: String,

    /// `"cmd"` runs the step's commands one after another, `"cmds"` runs them
    /// concurrently.
    #[serde(default)]
    pub kind: StepKind,

    /// Run through the platform shell unless a command overrides it.
    #[serde(default)]
    pub shell: bool,

    pub run: RunInput,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    #[default]
    Cmd,
    Cmds,
}

/// The `run` value of a step.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RunInput {
    Simple(String),
    List(Vec<RunItem>),
    Expanded(ExpandedCmd),
}

/// One item of a top-level `run` list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RunItem {
    Simple(String),
    /// A nested list is a serial chain.
    Serial(Vec<String>),
    Expanded(ExpandedCmd),
}

/// Expanded syntax: `{ run = ..., save = true, cwd = "..." }`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExpandedCmd {
    pub run: RunEntries,

    /// Capture output into the step results.
    #[serde(default)]
    pub save: bool,

    /// With `save`, keep raw bytes instead of decoded text.
    #[serde(default)]
    pub bytes: bool,

    #[serde(default)]
    pub cwd: Option<PathBuf>,

    /// File path, or `/dev/null`.
    #[serde(default)]
    pub stdout: Option<String>,

    /// File path, `/dev/null`, or `/dev/stdout`.
    #[serde(default)]
    pub stderr: Option<String>,

    #[serde(default)]
    pub encoding: Option<String>,

    #[serde(default)]
    pub append: bool,

    /// Overrides the step-level `shell`.
    #[serde(default)]
    pub shell: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RunEntries {
    One(String),
    Many(Vec<RunEntry>),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RunEntry {
    Line(String),
    /// Only valid in `cmds` steps.
    Serial(Vec<String>),
}

/// A validated command: a fresh [`crate::exec::Command`] is built from it for
/// every run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedCommand {
    pub spec: CommandSpec,
    pub options: CommandOptions,
}

/// A validated step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepConfig {
    pub name: String,
    pub kind: StepKind,
    pub commands: Vec<PlannedCommand>,
}

/// A validated step file. Constructed via `TryFrom<RawStepFile>`.
#[derive(Debug, Clone)]
pub struct StepFile {
    steps: Vec<StepConfig>,
}

impl StepFile {
    pub(crate) fn new_unchecked(steps: Vec<StepConfig>) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &[StepConfig] {
        &self.steps
    }

    pub fn step(&self, name: &str) -> Option<&StepConfig> {
        self.steps.iter().find(|s| s.name == name)
    }
}
