// src/step.rs

//! Steps: named groups of Commands built from the step file.
//!
//! A `cmd` step runs its Commands one after another on the calling thread,
//! a `cmds` step runs them all at once. Either way every Command runs to
//! completion before failures are reported.

use tracing::{info, warn};

use crate::config::model::{PlannedCommand, StepConfig, StepKind};
use crate::errors::{AggregateError, CmdpipeError, Result};
use crate::exec::{Command, CommandBatch};
use crate::result::{ResultNode, SubprocessResult};

#[derive(Debug, Clone)]
pub struct Step {
    name: String,
    kind: StepKind,
    commands: Vec<PlannedCommand>,
}

impl Step {
    pub fn new(name: impl Into<String>, kind: StepKind, commands: Vec<PlannedCommand>) -> Self {
        Self {
            name: name.into(),
            kind,
            commands,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> StepKind {
        self.kind
    }

    pub fn commands(&self) -> &[PlannedCommand] {
        &self.commands
    }

    /// Build fresh Commands and run them.
    ///
    /// With `force_sequential`, a `cmds` step is run with the sequential
    /// engine as well. Command failures end up in [`StepReport::error`];
    /// only configuration and runtime problems are returned as `Err`.
    pub fn run(&self, force_sequential: bool) -> Result<StepReport> {
        let mut batch = self.batch()?;

        let sequential = force_sequential || self.kind == StepKind::Cmd;
        info!(
            step = %self.name,
            commands = batch.len(),
            sequential,
            "running step"
        );

        let outcome = if sequential {
            batch.run_sequential()
        } else {
            batch.run()
        };

        self.report(batch, outcome)
    }

    /// Like [`Step::run`] for callers already inside a tokio runtime.
    pub async fn run_async(&self) -> Result<StepReport> {
        let mut batch = self.batch()?;
        info!(step = %self.name, commands = batch.len(), "running step");

        let outcome = match self.kind {
            StepKind::Cmd => batch.run_sequential(),
            StepKind::Cmds => batch.run_async().await,
        };

        self.report(batch, outcome)
    }

    fn batch(&self) -> Result<CommandBatch> {
        self.commands
            .iter()
            .map(|planned| Command::new(planned.spec.clone(), planned.options.clone()))
            .collect()
    }

    fn report(&self, batch: CommandBatch, outcome: Result<()>) -> Result<StepReport> {
        let error = match outcome {
            Ok(()) => None,
            Err(CmdpipeError::Aggregate(err)) => {
                warn!(step = %self.name, failures = err.len(), "step failed");
                Some(err)
            }
            Err(other) => return Err(other),
        };

        let saved = batch
            .iter()
            .filter(|command| command.is_capture())
            .flat_map(|command| command.results().iter().cloned())
            .collect();

        Ok(StepReport {
            name: self.name.clone(),
            any_capture: batch.any_capture(),
            results: batch.results().to_vec(),
            saved,
            error,
        })
    }
}

impl From<StepConfig> for Step {
    fn from(cfg: StepConfig) -> Self {
        Step::new(cfg.name, cfg.kind, cfg.commands)
    }
}

/// Outcome of one [`Step::run`].
#[derive(Debug, Clone)]
pub struct StepReport {
    pub name: String,
    /// One node per Command, in step order.
    pub results: Vec<ResultNode>,
    /// Nodes of the Commands that captured their output.
    pub saved: Vec<ResultNode>,
    pub any_capture: bool,
    pub error: Option<AggregateError>,
}

impl StepReport {
    pub fn success(&self) -> bool {
        self.error.is_none()
    }

    /// Every process result among the saved nodes, depth first.
    pub fn saved_results(&self) -> Vec<&SubprocessResult> {
        let mut out = Vec::new();
        for node in &self.saved {
            collect_completed(node, &mut out);
        }
        out
    }
}

fn collect_completed<'a>(node: &'a ResultNode, out: &mut Vec<&'a SubprocessResult>) {
    match node {
        ResultNode::Completed(result) => out.push(result),
        ResultNode::Failed(_) => {}
        ResultNode::Serial(chain) => {
            for entry in chain.entries() {
                collect_completed(entry, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::{CommandOptions, CommandSpec};
    use crate::result::{CmdLine, SerialResults};

    #[test]
    fn saved_results_walk_serial_chains() {
        let ok = |cmd: &str| SubprocessResult::new(CmdLine::Shell(cmd.into()), 0, None, None);
        let chain = SerialResults::from(vec![
            ResultNode::Completed(ok("a")),
            ResultNode::Serial(SerialResults::from(vec![ResultNode::Completed(ok("b"))])),
        ]);
        let report = StepReport {
            name: "s".into(),
            results: vec![],
            saved: vec![ResultNode::Serial(chain), ResultNode::Completed(ok("c"))],
            any_capture: true,
            error: None,
        };

        let cmds: Vec<String> = report
            .saved_results()
            .iter()
            .map(|r| r.cmd.to_string())
            .collect();
        assert_eq!(cmds, ["a", "b", "c"]);
        assert!(report.success());
    }

    #[test]
    fn invalid_planned_command_fails_before_running() {
        let step = Step::new(
            "bad",
            StepKind::Cmds,
            vec![PlannedCommand {
                spec: CommandSpec::Serial(vec![]),
                options: CommandOptions::new(),
            }],
        );
        assert!(matches!(step.run(false), Err(CmdpipeError::Config(_))));
    }
}
