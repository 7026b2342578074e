use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result};
use rustyline::config::{BellStyle, CompletionType};
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{
    Cmd, ConditionalEventHandler, Editor, Event, EventContext, EventHandler, KeyEvent,
    RepeatCount,
};

use crate::completion::ShellCompleter;
use crate::config::Config;
use crate::error::ShellError;
use crate::executor::{self, Plan};
use crate::history::History;
use crate::pipeline;
use crate::redirection::{self, ParsedCommand};
use crate::resolver::{self, PathCache, Resolution};
use crate::tokenize::tokenize;

/// What the interactive loop does after a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit(i32),
}

/// State shared by the loop and every pipeline stage.
pub struct Shell {
    config: Config,
    history: Mutex<History>,
    paths: Arc<PathCache>,
}

/// Tokenizes, splits and extracts redirections from one input line.
pub fn parse_line(line: &str) -> Result<Vec<ParsedCommand>, ShellError> {
    let tokens = tokenize(line)?;
    tracing::debug!(?tokens, "tokenized");
    pipeline::split(tokens)?
        .into_iter()
        .map(redirection::parse_command)
        .collect()
}

impl Shell {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            history: Mutex::new(History::new()),
            paths: Arc::new(PathCache::new()),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn history(&self) -> MutexGuard<'_, History> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn paths(&self) -> Arc<PathCache> {
        Arc::clone(&self.paths)
    }

    pub fn search_path(&self) -> String {
        self.config.search_path()
    }

    pub fn resolve(&self, name: &str) -> Resolution {
        resolver::resolve(name, &self.search_path())
    }

    /// Loads the configured history file, if any. Its entries count as
    /// already persisted.
    pub fn load_histfile(&self) {
        let Some(path) = &self.config.histfile else {
            return;
        };
        let mut history = self.history();
        match history.load(path) {
            Ok(count) => tracing::debug!(count, path = %path.display(), "loaded history"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to load history from {}: {}", path.display(), e),
        }
        history.mark_persisted();
    }

    /// Rewrites the configured history file with the whole log.
    pub fn flush_history(&self) {
        if let Some(path) = &self.config.histfile
            && let Err(e) = self.history().write(path)
        {
            tracing::warn!("Failed to save history to {}: {}", path.display(), e);
        }
    }

    /// Flushes history and ends the process.
    pub fn terminate(&self, code: i32) -> ! {
        self.flush_history();
        let _ = io::stdout().flush();
        std::process::exit(code)
    }

    /// Records and evaluates one accepted line.
    pub fn eval(&self, line: &str) -> Flow {
        self.history().push(line);

        let commands = match parse_line(line) {
            Ok(commands) if commands.is_empty() => return Flow::Continue,
            Ok(commands) => commands,
            Err(e) => {
                eprintln!("{e}");
                return Flow::Continue;
            }
        };
        match Plan::new(commands) {
            Ok(plan) => executor::execute(self, plan),
            Err(e) => {
                eprintln!("pipe: {e}");
                Flow::Continue
            }
        }
    }
}

/// Ctrl-C on an empty line ends input; otherwise it drops the line.
struct InterruptHandler;

fn interrupt_command(line: &str) -> Cmd {
    if line.is_empty() {
        Cmd::EndOfFile
    } else {
        Cmd::Interrupt
    }
}

impl ConditionalEventHandler for InterruptHandler {
    fn handle(
        &self,
        _evt: &Event,
        _n: RepeatCount,
        _positive: bool,
        ctx: &EventContext<'_>,
    ) -> Option<Cmd> {
        Some(interrupt_command(ctx.line()))
    }
}

/// Runs the interactive loop until `exit` or end of input.
pub fn run(config: Config) -> Result<()> {
    let shell = Shell::new(config);
    shell.load_histfile();

    let editor_config = rustyline::Config::builder()
        .completion_type(CompletionType::List)
        .bell_style(BellStyle::None)
        .build();
    let mut rl: Editor<ShellCompleter, DefaultHistory> =
        Editor::with_config(editor_config).context("Failed to create editor")?;
    rl.set_helper(Some(ShellCompleter::new(shell.config().clone(), shell.paths())));
    rl.bind_sequence(
        KeyEvent::ctrl('C'),
        EventHandler::Conditional(Box::new(InterruptHandler)),
    );

    for line in shell.history().entries() {
        let _ = rl.add_history_entry(line.as_str());
    }

    loop {
        if let Some(helper) = rl.helper() {
            helper.reset();
        }
        match rl.readline(&shell.config().prompt) {
            Ok(line) => {
                if let Err(e) = rl.add_history_entry(line.as_str()) {
                    tracing::warn!("Failed to add history entry: {}", e);
                }
                if let Flow::Exit(code) = shell.eval(&line) {
                    shell.terminate(code);
                }
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(err) => return Err(err).context("Failed to read input"),
        }
    }

    shell.flush_history();
    Ok(())
}
