// src/lib.rs

pub mod cli;
pub mod config;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod result;
pub mod step;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::{StepConfig, StepKind};
use crate::errors::CmdpipeError;
use crate::exec::{CommandSpec, OutputTarget};
use crate::result::Output;
use crate::step::{Step, StepReport};

pub use crate::errors::{AggregateError, InvocationError};
pub use crate::exec::{Command, CommandBatch, CommandOptions};
pub use crate::result::{ResultNode, SubprocessResult};

/// High-level entry point used by `main.rs`.
///
/// Loads the step file, then runs the selected steps in file order. The
/// first failing step stops the run; its aggregate error is returned.
pub fn run(args: CliArgs) -> Result<()> {
    let file = load_and_validate(&args.config)
        .with_context(|| format!("failed to load step file '{}'", args.config))?;

    let selected: Vec<&StepConfig> = match &args.step {
        Some(name) => vec![
            file.step(name)
                .ok_or_else(|| CmdpipeError::StepNotFound(name.clone()))?,
        ],
        None => file.steps().iter().collect(),
    };

    if args.dry_run {
        print_dry_run(&selected);
        return Ok(());
    }

    for cfg in selected {
        let step = Step::from(cfg.clone());
        let report = step.run(args.sequential)?;
        print_saved(&report);

        if let Some(err) = report.error {
            return Err(anyhow::Error::new(err).context(format!("step '{}' failed", report.name)));
        }
        info!(step = %report.name, "step finished");
    }

    Ok(())
}

/// Print the captured stdout of every saving Command.
fn print_saved(report: &StepReport) {
    if !report.any_capture {
        return;
    }
    for result in report.saved_results() {
        match &result.stdout {
            Some(Output::Text(text)) if !text.is_empty() => println!("{text}"),
            Some(Output::Bytes(bytes)) if !bytes.is_empty() => {
                println!("{}", String::from_utf8_lossy(bytes))
            }
            _ => {}
        }
    }
}

/// Print every step and the commands it would run.
fn print_dry_run(steps: &[&StepConfig]) {
    println!("cmdpipe dry-run");
    println!();

    println!("steps ({}):", steps.len());
    for step in steps {
        let kind = match step.kind {
            StepKind::Cmd => "cmd",
            StepKind::Cmds => "cmds",
        };
        println!("  - {} ({kind})", step.name);

        for planned in &step.commands {
            match &planned.spec {
                CommandSpec::Single(spec) => println!("      run: {spec}"),
                CommandSpec::Serial(specs) => {
                    println!("      serial:");
                    for spec in specs {
                        println!("        - {spec}");
                    }
                }
            }

            let opts = &planned.options;
            if opts.use_shell {
                println!("        shell: true");
            }
            if let Some(ref cwd) = opts.cwd {
                println!("        cwd: {}", cwd.display());
            }
            if opts.capture {
                println!("        save: {}", if opts.text { "text" } else { "bytes" });
            }
            if let Some(encoding) = opts.encoding {
                println!("        encoding: {encoding}");
            }
            if let Some(target) = describe_target(&opts.stdout) {
                println!("        stdout: {target}");
            }
            if let Some(target) = describe_target(&opts.stderr) {
                println!("        stderr: {target}");
            }
            if opts.append {
                println!("        append: true");
            }
        }
    }

    debug!("dry-run complete (no execution)");
}

fn describe_target(target: &OutputTarget) -> Option<String> {
    match target {
        OutputTarget::Inherit | OutputTarget::Capture => None,
        OutputTarget::Null => Some(crate::exec::NULL_DEVICE.to_string()),
        OutputTarget::Stdout => Some(crate::exec::STDOUT_REDIRECT.to_string()),
        OutputTarget::File(path) => Some(path.display().to_string()),
    }
}
