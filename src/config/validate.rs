// src/config/validate.rs

use std::collections::HashSet;

use crate::config::model::{
    ExpandedCmd, PlannedCommand, RawStep, RawStepFile, RunEntries, RunEntry, RunInput, RunItem,
    StepConfig, StepFile, StepKind,
};
use crate::errors::{CmdpipeError, Result};
use crate::exec::{Command, CommandOptions, CommandSpec, InvocationSpec, OutputTarget, TextEncoding};

impl TryFrom<RawStepFile> for StepFile {
    type Error = CmdpipeError;

    fn try_from(raw: RawStepFile) -> std::result::Result<Self, Self::Error> {
        ensure_has_steps(&raw)?;
        ensure_unique_names(&raw)?;

        let steps = raw
            .steps
            .into_iter()
            .map(build_step)
            .collect::<Result<Vec<_>>>()?;

        Ok(StepFile::new_unchecked(steps))
    }
}

fn ensure_has_steps(raw: &RawStepFile) -> Result<()> {
    if raw.steps.is_empty() {
        return Err(CmdpipeError::Config(
            "step file must contain at least one [[step]] table".to_string(),
        ));
    }
    Ok(())
}

fn ensure_unique_names(raw: &RawStepFile) -> Result<()> {
    let mut seen = HashSet::new();
    for step in &raw.steps {
        if step.name.trim().is_empty() {
            return Err(CmdpipeError::Config("step name can't be empty".to_string()));
        }
        if !seen.insert(step.name.as_str()) {
            return Err(CmdpipeError::Config(format!(
                "duplicate step name '{}'",
                step.name
            )));
        }
    }
    Ok(())
}

fn build_step(raw: RawStep) -> Result<StepConfig> {
    let RawStep {
        name,
        kind,
        shell,
        run,
    } = raw;
    let defaults = CommandOptions::new().shell(shell);

    let commands = match run {
        RunInput::Simple(line) => vec![PlannedCommand {
            spec: CommandSpec::Single(line_spec(&name, line)?),
            options: defaults,
        }],
        RunInput::List(items) => {
            if items.is_empty() {
                return Err(empty_run(&name));
            }
            let mut commands = Vec::new();
            for item in items {
                commands.extend(item_commands(&name, kind, &defaults, item)?);
            }
            commands
        }
        RunInput::Expanded(cmd) => expanded_commands(&name, kind, &defaults, cmd)?,
    };

    // Construction is where option conflicts surface; fail here rather than
    // at run time.
    for planned in &commands {
        Command::new(planned.spec.clone(), planned.options.clone()).map_err(|err| match err {
            CmdpipeError::Config(msg) => CmdpipeError::Config(format!("step '{name}': {msg}")),
            other => other,
        })?;
    }

    Ok(StepConfig {
        name,
        kind,
        commands,
    })
}

fn item_commands(
    step: &str,
    kind: StepKind,
    defaults: &CommandOptions,
    item: RunItem,
) -> Result<Vec<PlannedCommand>> {
    match item {
        RunItem::Simple(line) => Ok(vec![PlannedCommand {
            spec: CommandSpec::Single(line_spec(step, line)?),
            options: defaults.clone(),
        }]),
        RunItem::Serial(lines) => Ok(vec![PlannedCommand {
            spec: serial_spec(step, lines)?,
            options: defaults.clone(),
        }]),
        RunItem::Expanded(cmd) => expanded_commands(step, kind, defaults, cmd),
    }
}

fn expanded_commands(
    step: &str,
    kind: StepKind,
    defaults: &CommandOptions,
    cmd: ExpandedCmd,
) -> Result<Vec<PlannedCommand>> {
    let options = expanded_options(step, defaults, &cmd)?;

    let entries = match cmd.run {
        RunEntries::One(line) => {
            return Ok(vec![PlannedCommand {
                spec: CommandSpec::Single(line_spec(step, line)?),
                options,
            }]);
        }
        RunEntries::Many(entries) => entries,
    };

    if entries.is_empty() {
        return Err(empty_run(step));
    }

    match kind {
        // Sequential step: the whole list is one serial chain sharing output.
        StepKind::Cmd => {
            let mut chain = Vec::new();
            for entry in entries {
                match entry {
                    RunEntry::Line(line) => chain.push(line_spec(step, line)?),
                    RunEntry::Serial(_) => {
                        return Err(CmdpipeError::Config(format!(
                            "step '{step}': nested `run` lists are only allowed in `cmds` steps; \
                             a `cmd` step already runs its list in serial"
                        )));
                    }
                }
            }
            Ok(vec![PlannedCommand {
                spec: CommandSpec::Serial(chain),
                options,
            }])
        }
        // Concurrent step: one Command per entry; file handles can't be
        // shared between them.
        StepKind::Cmds => {
            let has_file = options.stdout.file_path().is_some() || options.stderr.file_path().is_some();
            if has_file && entries.len() > 1 {
                return Err(CmdpipeError::Config(format!(
                    "step '{step}': concurrent `run` entries can't share a stdout/stderr file; \
                     use a nested list to run them in serial"
                )));
            }
            entries
                .into_iter()
                .map(|entry| {
                    let spec = match entry {
                        RunEntry::Line(line) => CommandSpec::Single(line_spec(step, line)?),
                        RunEntry::Serial(lines) => serial_spec(step, lines)?,
                    };
                    Ok(PlannedCommand {
                        spec,
                        options: options.clone(),
                    })
                })
                .collect()
        }
    }
}

fn expanded_options(step: &str, defaults: &CommandOptions, cmd: &ExpandedCmd) -> Result<CommandOptions> {
    let config_err = |msg: String| CmdpipeError::Config(format!("step '{step}': {msg}"));

    if cmd.save && (has_value(&cmd.stdout) || has_value(&cmd.stderr)) {
        return Err(config_err(
            "you can't set `stdout` or `stderr` when `save` is true".to_string(),
        ));
    }

    let stdout = OutputTarget::for_stdout(cmd.stdout.as_deref().unwrap_or(""))?;
    let stderr = OutputTarget::for_stderr(cmd.stderr.as_deref().unwrap_or(""));

    let encoding = match cmd.encoding.as_deref() {
        Some(label) if !label.trim().is_empty() => {
            Some(label.parse::<TextEncoding>().map_err(config_err)?)
        }
        _ => None,
    };

    Ok(CommandOptions {
        use_shell: cmd.shell.unwrap_or(defaults.use_shell),
        cwd: cmd.cwd.clone(),
        capture: cmd.save,
        text: !cmd.bytes,
        stdout,
        stderr,
        encoding,
        append: cmd.append,
    })
}

fn has_value(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.is_empty())
}

fn line_spec(step: &str, line: String) -> Result<InvocationSpec> {
    if line.trim().is_empty() {
        return Err(empty_run(step));
    }
    Ok(InvocationSpec::Line(line))
}

fn serial_spec(step: &str, lines: Vec<String>) -> Result<CommandSpec> {
    if lines.is_empty() {
        return Err(empty_run(step));
    }
    let specs = lines
        .into_iter()
        .map(|line| line_spec(step, line))
        .collect::<Result<Vec<_>>>()?;
    Ok(CommandSpec::Serial(specs))
}

fn empty_run(step: &str) -> CmdpipeError {
    CmdpipeError::Config(format!("step '{step}': `run` must have a value"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::loader::parse_and_validate;

    fn only_step(toml: &str) -> StepConfig {
        let file = parse_and_validate(toml).unwrap();
        assert_eq!(file.steps().len(), 1);
        file.steps()[0].clone()
    }

    fn config_error(toml: &str) -> String {
        match parse_and_validate(toml) {
            Err(CmdpipeError::Config(msg)) => msg,
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn simple_run_is_one_command() {
        let step = only_step(
            r#"
            [[step]]
            name = "hello"
            run = "echo hello"
            "#,
        );
        assert_eq!(step.kind, StepKind::Cmd);
        assert_eq!(step.commands.len(), 1);
        assert_eq!(step.commands[0].spec, CommandSpec::from("echo hello"));
        assert!(!step.commands[0].options.use_shell);
    }

    #[test]
    fn list_items_become_commands() {
        let step = only_step(
            r#"
            [[step]]
            name = "build"
            kind = "cmds"
            shell = true
            run = ["echo one", ["echo two", "echo three"]]
            "#,
        );
        assert_eq!(step.kind, StepKind::Cmds);
        assert_eq!(step.commands.len(), 2);
        assert_eq!(step.commands[0].spec, CommandSpec::from("echo one"));
        assert_eq!(
            step.commands[1].spec,
            CommandSpec::serial(["echo two", "echo three"])
        );
        assert!(step.commands.iter().all(|c| c.options.use_shell));
    }

    #[test]
    fn expanded_list_in_cmd_kind_is_one_chain() {
        let step = only_step(
            r#"
            [[step]]
            name = "log"
            run = { run = ["echo a", "echo b", "echo c"], stdout = "out/log.txt", append = true }
            "#,
        );
        assert_eq!(step.commands.len(), 1);
        let planned = &step.commands[0];
        assert_eq!(planned.spec, CommandSpec::serial(["echo a", "echo b", "echo c"]));
        assert_eq!(planned.options.stdout, OutputTarget::File("out/log.txt".into()));
        assert!(planned.options.append);
    }

    #[test]
    fn expanded_list_in_cmds_kind_fans_out() {
        let step = only_step(
            r#"
            [[step]]
            name = "fan"
            kind = "cmds"
            run = { run = ["echo a", "echo b"], save = true, bytes = true }
            "#,
        );
        assert_eq!(step.commands.len(), 2);
        assert!(step.commands.iter().all(|c| c.options.capture && !c.options.text));
    }

    #[test]
    fn nested_list_in_cmd_kind_is_rejected() {
        let msg = config_error(
            r#"
            [[step]]
            name = "log"
            run = { run = ["echo a", ["echo b", "echo c"]] }
            "#,
        );
        assert!(msg.contains("nested"), "{msg}");

        let step = only_step(
            r#"
            [[step]]
            name = "log"
            kind = "cmds"
            run = { run = ["echo a", ["echo b", "echo c"]] }
            "#,
        );
        assert_eq!(step.commands.len(), 2);
        assert_eq!(step.commands[1].spec, CommandSpec::serial(["echo b", "echo c"]));
    }

    #[test]
    fn concurrent_entries_cannot_share_a_file() {
        let msg = config_error(
            r#"
            [[step]]
            name = "fan"
            kind = "cmds"
            run = { run = ["echo a", "echo b"], stdout = "out.txt" }
            "#,
        );
        assert!(msg.contains("fan"), "{msg}");
    }

    #[test]
    fn save_excludes_output_targets() {
        let msg = config_error(
            r#"
            [[step]]
            name = "bad"
            run = { run = "echo hi", save = true, stderr = "/dev/null" }
            "#,
        );
        assert!(msg.contains("save"), "{msg}");
    }

    #[test]
    fn stdout_sentinel_only_valid_for_stderr() {
        config_error(
            r#"
            [[step]]
            name = "bad"
            run = { run = "echo hi", stdout = "/dev/stdout" }
            "#,
        );

        let step = only_step(
            r#"
            [[step]]
            name = "ok"
            run = { run = "echo hi", stderr = "/dev/stdout" }
            "#,
        );
        assert_eq!(step.commands[0].options.stderr, OutputTarget::Stdout);
    }

    #[test]
    fn encoding_labels_are_checked() {
        let step = only_step(
            r#"
            [[step]]
            name = "enc"
            run = { run = "echo hi", save = true, encoding = "Latin-1" }
            "#,
        );
        assert_eq!(step.commands[0].options.encoding, Some(TextEncoding::Latin1));

        config_error(
            r#"
            [[step]]
            name = "enc"
            run = { run = "echo hi", save = true, encoding = "klingon" }
            "#,
        );
    }

    #[test]
    fn per_command_shell_overrides_step() {
        let step = only_step(
            r#"
            [[step]]
            name = "mixed"
            shell = true
            run = ["echo a", { run = "echo b", shell = false }]
            "#,
        );
        assert!(step.commands[0].options.use_shell);
        assert!(!step.commands[1].options.use_shell);
    }

    #[test]
    fn structural_errors() {
        config_error("");
        config_error(
            r#"
            [[step]]
            name = "a"
            run = "echo a"

            [[step]]
            name = "a"
            run = "echo b"
            "#,
        );
        config_error(
            r#"
            [[step]]
            name = "empty"
            run = ""
            "#,
        );
        config_error(
            r#"
            [[step]]
            name = "empty"
            run = []
            "#,
        );
        config_error(
            r#"
            [[step]]
            name = "empty-chain"
            run = [[]]
            "#,
        );
    }

    #[test]
    fn lookup_by_name() {
        let file = parse_and_validate(
            r#"
            [[step]]
            name = "first"
            run = "echo 1"

            [[step]]
            name = "second"
            run = "echo 2"
            "#,
        )
        .unwrap();
        assert_eq!(file.step("second").map(|s| s.commands.len()), Some(1));
        assert!(file.step("third").is_none());
    }
}
