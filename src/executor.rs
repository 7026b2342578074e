use std::io::{self, Write};
#[cfg(unix)]
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::Command;
use std::thread;

use crate::commands::{Builtin, Outcome, Output};
use crate::error::ShellError;
use crate::redirection::{ParsedCommand, ResolvedCommand, Sink, Source};
use crate::resolver::Resolution;
use crate::shell::{Flow, Shell};

/// A stage waiting to run, holding its positional endpoints.
#[derive(Debug)]
pub struct Stage {
    command: ParsedCommand,
    stdin: Source,
    stdout: Sink,
}

/// Stages in pipeline order, linked by pipes.
///
/// Stage `i` writes into the pipe that stage `i + 1` reads. The first stage
/// reads the terminal and the last one writes to it unless redirected.
#[derive(Debug)]
pub struct Plan {
    stages: Vec<Stage>,
}

impl Plan {
    pub fn new(commands: Vec<ParsedCommand>) -> io::Result<Plan> {
        let count = commands.len();
        let mut stages = Vec::with_capacity(count);
        let mut stdin = Source::Terminal;

        for (index, command) in commands.into_iter().enumerate() {
            let (stdout, next_stdin) = if index + 1 < count {
                let (reader, writer) = io::pipe()?;
                (Sink::Pipe(writer), Source::Pipe(reader))
            } else {
                (Sink::Stdout, Source::Terminal)
            };
            stages.push(Stage {
                command,
                stdin: std::mem::replace(&mut stdin, next_stdin),
                stdout,
            });
        }

        Ok(Plan { stages })
    }
}

/// How a stage ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageStatus {
    Completed,
    Failed,
    Exit(i32),
}

/// Runs a plan to completion.
///
/// A single stage runs on the calling thread and may ask the loop to exit.
/// Longer pipelines run every stage on its own thread and wait for all of
/// them; an `exit` inside one ends the process straight away.
pub fn execute(shell: &Shell, plan: Plan) -> Flow {
    let mut stages = plan.stages;
    if stages.len() <= 1 {
        return match stages.pop().map(|stage| run_stage(shell, 0, stage)) {
            Some(StageStatus::Exit(code)) => Flow::Exit(code),
            _ => Flow::Continue,
        };
    }
    run_concurrently(shell, stages);
    Flow::Continue
}

fn run_concurrently(shell: &Shell, stages: Vec<Stage>) -> Vec<StageStatus> {
    thread::scope(|scope| {
        let mut handles = Vec::with_capacity(stages.len());
        for (index, stage) in stages.into_iter().enumerate() {
            let spawned = thread::Builder::new()
                .name(format!("stage-{index}"))
                .spawn_scoped(scope, move || {
                    let status = run_stage(shell, index, stage);
                    if let StageStatus::Exit(code) = status {
                        shell.terminate(code);
                    }
                    status
                });
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => eprintln!("failed to start pipeline stage: {e}"),
            }
        }

        handles
            .into_iter()
            .map(|handle| {
                handle.join().unwrap_or_else(|_| {
                    tracing::warn!("pipeline stage panicked");
                    StageStatus::Failed
                })
            })
            .collect()
    })
}

fn run_stage(shell: &Shell, index: usize, stage: Stage) -> StageStatus {
    let name = stage.command.name().to_string();
    let _span = tracing::debug_span!("stage", index, command = %name).entered();
    tracing::debug!("running");

    let status = match ResolvedCommand::bind(stage.command, stage.stdin, stage.stdout) {
        Ok(resolved) => match shell.resolve(&name) {
            Resolution::Builtin(builtin) => run_builtin(shell, builtin, resolved),
            Resolution::External(path) => run_external(&path, resolved),
            Resolution::NotFound => {
                let mut stderr = resolved.stderr;
                report(&mut stderr, &ShellError::CommandNotFound(name));
                StageStatus::Failed
            }
        },
        Err(e) => {
            report(&mut Sink::Stderr, &e);
            StageStatus::Failed
        }
    };

    tracing::debug!(?status, "finished");
    status
}

fn run_builtin(shell: &Shell, builtin: Builtin, resolved: ResolvedCommand) -> StageStatus {
    let mut output = Output::default();
    let outcome = builtin.run(&resolved.argv, shell, &mut output);

    let ResolvedCommand {
        mut stdout,
        mut stderr,
        ..
    } = resolved;
    flush_buffer(&mut stdout, &output.stdout);
    flush_buffer(&mut stderr, &output.stderr);

    match outcome {
        Outcome::Success => StageStatus::Completed,
        Outcome::Failure => StageStatus::Failed,
        Outcome::Exit(code) => StageStatus::Exit(code),
    }
}

fn run_external(path: &Path, resolved: ResolvedCommand) -> StageStatus {
    let ResolvedCommand {
        argv,
        stdin,
        stdout,
        stderr,
    } = resolved;
    let mut report_to = match &stderr {
        Sink::File(file) => file.try_clone().map_or(Sink::Stderr, Sink::File),
        _ => Sink::Stderr,
    };

    // The Command owns our copies of the pipe ends; it must be gone before
    // waiting so the neighbours see end-of-input when the child exits.
    let spawned = {
        let mut command = Command::new(path);
        #[cfg(unix)]
        command.arg0(&argv[0]);
        command
            .args(&argv[1..])
            .stdin(stdin.into_stdio())
            .stdout(stdout.into_stdio())
            .stderr(stderr.into_stdio());
        command.spawn()
    };

    let mut child = match spawned {
        Ok(child) => child,
        Err(e) => {
            tracing::debug!(error = %e, "spawn failed");
            report(&mut report_to, &ShellError::CommandNotFound(argv[0].clone()));
            return StageStatus::Failed;
        }
    };

    match child.wait() {
        Ok(status) if status.success() => StageStatus::Completed,
        Ok(status) => {
            tracing::debug!(%status, "non-zero exit");
            StageStatus::Failed
        }
        Err(e) => {
            tracing::debug!(error = %e, "wait failed");
            StageStatus::Failed
        }
    }
}

fn flush_buffer(sink: &mut Sink, buf: &[u8]) {
    if buf.is_empty() {
        return;
    }
    if let Err(e) = sink.write_all(buf).and_then(|()| sink.flush()) {
        tracing::debug!(error = %e, "builtin output dropped");
    }
}

fn report(sink: &mut Sink, err: &ShellError) {
    flush_buffer(sink, format!("{err}\n").as_bytes());
}
