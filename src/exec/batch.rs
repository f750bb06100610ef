// src/exec/batch.rs

//! Running several Commands as one unit and reporting every failure.
//!
//! The concurrent engine drives all Commands at once and joins every one of
//! them unconditionally; a failure in one Command never cancels another.
//! Only after all of them are done are their results gathered (in insertion
//! order) and flattened into a single [`AggregateError`].

use std::ops::Index;

use futures::future::join_all;
use tracing::{debug, info};

use crate::errors::{AggregateError, CmdpipeError, Result};
use crate::exec::command::Command;
use crate::result::{ResultNode, flatten_all};

const AGGREGATE_MESSAGE: &str = "The following error(s) occurred while running the commands:";

#[derive(Debug, Default)]
pub struct CommandBatch {
    commands: Vec<Command>,
    results: Vec<ResultNode>,
    any_capture: bool,
}

impl CommandBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, command: Command) {
        self.any_capture |= command.is_capture();
        self.commands.push(command);
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Command> {
        self.commands.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Command> {
        self.commands.iter()
    }

    /// True when at least one Command captures its output.
    pub fn any_capture(&self) -> bool {
        self.any_capture
    }

    /// One node per Command, in the order the Commands were added.
    pub fn results(&self) -> &[ResultNode] {
        &self.results
    }

    /// Run every Command concurrently on a private tokio runtime.
    ///
    /// This is an entry point: calling it from inside an async runtime is an
    /// error (use [`CommandBatch::run_async`] there).
    pub fn run(&mut self) -> Result<()> {
        if tokio::runtime::Handle::try_current().is_ok() {
            return Err(CmdpipeError::Runtime(
                "CommandBatch::run can't be called from within an async runtime; use run_async"
                    .to_string(),
            ));
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| CmdpipeError::Runtime(e.to_string()))?;

        runtime.block_on(self.run_all());
        self.finish()
    }

    /// Same as [`CommandBatch::run`], for callers that already own a runtime.
    pub async fn run_async(&mut self) -> Result<()> {
        self.run_all().await;
        self.finish()
    }

    /// Run the Commands one after another on the calling thread.
    pub fn run_sequential(&mut self) -> Result<()> {
        info!(commands = self.commands.len(), "running commands sequentially");
        for command in self.commands.iter_mut() {
            command.run_blocking();
        }
        self.finish()
    }

    async fn run_all(&mut self) {
        info!(commands = self.commands.len(), "running commands concurrently");
        join_all(self.commands.iter_mut().map(|command| command.run())).await;
    }

    /// Single-writer join step: only called once every Command is done.
    fn finish(&mut self) -> Result<()> {
        self.results = self
            .commands
            .iter()
            .flat_map(|command| command.results().iter().cloned())
            .collect();

        let errors = flatten_all(&self.results);
        info!(
            commands = self.commands.len(),
            errors = errors.len(),
            "all commands finished"
        );

        if errors.is_empty() {
            return Ok(());
        }

        for err in &errors {
            debug!(kind = err.kind_name(), error = %err, "command failure");
        }
        Err(AggregateError::new(Some(AGGREGATE_MESSAGE.to_string()), errors).into())
    }
}

impl Index<usize> for CommandBatch {
    type Output = Command;

    fn index(&self, index: usize) -> &Self::Output {
        &self.commands[index]
    }
}

impl<'a> IntoIterator for &'a CommandBatch {
    type Item = &'a Command;
    type IntoIter = std::slice::Iter<'a, Command>;

    fn into_iter(self) -> Self::IntoIter {
        self.commands.iter()
    }
}

impl FromIterator<Command> for CommandBatch {
    fn from_iter<T: IntoIterator<Item = Command>>(iter: T) -> Self {
        let mut batch = CommandBatch::new();
        for command in iter {
            batch.push(command);
        }
        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::command::CommandOptions;

    #[test]
    fn any_capture_tracks_pushed_commands() {
        let mut batch = CommandBatch::new();
        batch.push(Command::new("echo a", CommandOptions::new()).unwrap());
        assert!(!batch.any_capture());

        batch.push(Command::new("echo b", CommandOptions::new().capture(true)).unwrap());
        assert!(batch.any_capture());

        batch.push(Command::new("echo c", CommandOptions::new()).unwrap());
        assert!(batch.any_capture());
        assert_eq!(batch.len(), 3);
    }

    #[test]
    fn empty_batch_runs_cleanly() {
        let mut batch = CommandBatch::new();
        batch.run().unwrap();
        assert!(batch.results().is_empty());
    }

    #[tokio::test]
    async fn run_refuses_nested_runtime() {
        let mut batch = CommandBatch::new();
        assert!(matches!(batch.run(), Err(CmdpipeError::Runtime(_))));
    }
}
