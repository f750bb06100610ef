#![allow(dead_code)]

use std::path::PathBuf;

use cmdpipe::config::{
    ExpandedCmd, RawStep, RawStepFile, RunEntries, RunEntry, RunInput, RunItem, StepFile,
    StepKind,
};

/// Builder for `StepFile` to simplify test setup.
pub struct StepFileBuilder {
    file: RawStepFile,
}

impl StepFileBuilder {
    pub fn new() -> Self {
        Self {
            file: RawStepFile { steps: Vec::new() },
        }
    }

    pub fn with_step(mut self, step: RawStep) -> Self {
        self.file.steps.push(step);
        self
    }

    pub fn build(self) -> StepFile {
        StepFile::try_from(self.file).expect("Failed to build valid step file from builder")
    }

    pub fn raw(self) -> RawStepFile {
        self.file
    }
}

impl Default for StepFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for a `[[step]]` table.
pub struct StepBuilder {
    step: RawStep,
    items: Vec<RunItem>,
}

impl StepBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            step: RawStep {
                name: name.to_string(),
                kind: StepKind::Cmd,
                shell: true,
                run: RunInput::List(Vec::new()),
            },
            items: Vec::new(),
        }
    }

    pub fn concurrent(mut self) -> Self {
        self.step.kind = StepKind::Cmds;
        self
    }

    pub fn shell(mut self, val: bool) -> Self {
        self.step.shell = val;
        self
    }

    pub fn run(mut self, line: &str) -> Self {
        self.items.push(RunItem::Simple(line.to_string()));
        self
    }

    pub fn serial(mut self, lines: &[&str]) -> Self {
        self.items
            .push(RunItem::Serial(lines.iter().map(|s| s.to_string()).collect()));
        self
    }

    pub fn expanded(mut self, cmd: ExpandedCmd) -> Self {
        self.items.push(RunItem::Expanded(cmd));
        self
    }

    pub fn build(mut self) -> RawStep {
        self.step.run = RunInput::List(self.items);
        self.step
    }
}

/// Builder for the expanded `{ run = ..., save = ... }` form.
pub struct ExpandedBuilder {
    cmd: ExpandedCmd,
}

impl ExpandedBuilder {
    pub fn new(line: &str) -> Self {
        Self {
            cmd: ExpandedCmd {
                run: RunEntries::One(line.to_string()),
                save: false,
                bytes: false,
                cwd: None,
                stdout: None,
                stderr: None,
                encoding: None,
                append: false,
                shell: None,
            },
        }
    }

    pub fn chain(lines: &[&str]) -> Self {
        let mut b = Self::new("");
        b.cmd.run = RunEntries::Many(
            lines
                .iter()
                .map(|s| RunEntry::Line(s.to_string()))
                .collect(),
        );
        b
    }

    pub fn save(mut self) -> Self {
        self.cmd.save = true;
        self
    }

    pub fn bytes(mut self) -> Self {
        self.cmd.bytes = true;
        self
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cmd.cwd = Some(dir.into());
        self
    }

    pub fn stdout(mut self, target: &str) -> Self {
        self.cmd.stdout = Some(target.to_string());
        self
    }

    pub fn stderr(mut self, target: &str) -> Self {
        self.cmd.stderr = Some(target.to_string());
        self
    }

    pub fn append(mut self) -> Self {
        self.cmd.append = true;
        self
    }

    pub fn build(self) -> ExpandedCmd {
        self.cmd
    }
}
