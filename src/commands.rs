use std::env;
use std::path::{Path, PathBuf};

use bytes::BytesMut;

use crate::error::describe_io;
use crate::resolver::{self, Resolution};
use crate::shell::Shell;

/// The builtin commands. Dispatch goes through [`Builtin::run`] so the
/// resolver and executor never match on names themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Exit,
    Echo,
    Pwd,
    Cd,
    Type,
    History,
}

/// List of builtin commands
pub const BUILTINS: &[&str] = &["cd", "echo", "exit", "history", "pwd", "type"];

/// What the executor should do after a builtin returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
    Exit(i32),
}

/// Buffered output of a builtin, flushed to the stage's sinks afterwards.
#[derive(Debug, Default)]
pub struct Output {
    pub stdout: BytesMut,
    pub stderr: BytesMut,
}

impl Output {
    pub fn out(&mut self, text: &str) {
        self.stdout.extend_from_slice(text.as_bytes());
    }

    pub fn err(&mut self, text: &str) {
        self.stderr.extend_from_slice(text.as_bytes());
        self.stderr.extend_from_slice(b"\n");
    }
}

impl Builtin {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "exit" => Self::Exit,
            "echo" => Self::Echo,
            "pwd" => Self::Pwd,
            "cd" => Self::Cd,
            "type" => Self::Type,
            "history" => Self::History,
            _ => return None,
        })
    }

    /// Runs the builtin. `args[0]` is the command name.
    pub fn run(self, args: &[String], shell: &Shell, output: &mut Output) -> Outcome {
        match self {
            Self::Exit => execute_exit(args, output),
            Self::Echo => {
                output.out(&(args[1..].join(" ") + "\n"));
                Outcome::Success
            }
            Self::Pwd => match env::current_dir() {
                Ok(dir) => {
                    output.out(&format!("{}\n", dir.display()));
                    Outcome::Success
                }
                Err(e) => {
                    output.err(&format!("pwd: error retrieving current directory: {e}"));
                    Outcome::Failure
                }
            },
            Self::Cd => execute_cd(args, shell.config().home.as_deref(), output),
            Self::Type => execute_type(args, &shell.search_path(), output),
            Self::History => execute_history(args, shell, output),
        }
    }
}

fn execute_exit(args: &[String], output: &mut Output) -> Outcome {
    let Some(code) = args.get(1) else {
        return Outcome::Exit(0);
    };
    match code.parse::<i64>() {
        Ok(n) => Outcome::Exit((n & 0xff) as i32),
        Err(_) => {
            output.err(&format!("exit: {code}: numeric argument required"));
            Outcome::Exit(2)
        }
    }
}

fn execute_cd(args: &[String], home: Option<&Path>, output: &mut Output) -> Outcome {
    let arg = args.get(1).map_or("~", String::as_str);
    let target = if arg == "~" {
        home.map(Path::to_path_buf)
    } else if let Some(rest) = arg.strip_prefix("~/") {
        home.map(|h| h.join(rest))
    } else {
        Some(PathBuf::from(arg))
    };

    let result = match target {
        Some(dir) => env::set_current_dir(&dir).map_err(|e| describe_io(&e)),
        None => Err("No such file or directory".to_string()),
    };
    match result {
        Ok(()) => Outcome::Success,
        Err(reason) => {
            output.err(&format!("cd: {arg}: {reason}"));
            Outcome::Failure
        }
    }
}

fn execute_type(args: &[String], search_path: &str, output: &mut Output) -> Outcome {
    if args.len() < 2 {
        output.err("type: missing argument");
        return Outcome::Failure;
    }

    let mut outcome = Outcome::Success;
    for arg in &args[1..] {
        match resolver::resolve(arg, search_path) {
            Resolution::Builtin(_) => output.out(&format!("{arg} is a shell builtin\n")),
            Resolution::External(path) => output.out(&format!("{arg} is {}\n", path.display())),
            Resolution::NotFound => {
                output.err(&format!("{arg}: not found"));
                outcome = Outcome::Failure;
            }
        }
    }
    outcome
}

fn execute_history(args: &[String], shell: &Shell, output: &mut Output) -> Outcome {
    let mut history = shell.history();
    let Some(flag) = args.get(1) else {
        output.out(&history.render(None));
        return Outcome::Success;
    };

    if let Some(op) = ["-r", "-w", "-a"].into_iter().find(|op| *op == flag.as_str()) {
        let Some(file) = args.get(2) else {
            output.err(&format!("history: {op}: option requires an argument"));
            return Outcome::Failure;
        };
        let path = Path::new(file);
        let result = match op {
            "-r" => history.load(path).map(|_| ()),
            "-w" => history.write(path),
            _ => history.append_new(path),
        };
        return match result {
            Ok(()) => Outcome::Success,
            Err(e) => {
                output.err(&format!("history: {file}: {}", describe_io(&e)));
                Outcome::Failure
            }
        };
    }

    match flag.parse::<usize>() {
        Ok(n) => {
            output.out(&history.render(Some(n)));
            Outcome::Success
        }
        Err(_) => {
            output.err(&format!("history: {flag}: numeric argument required"));
            Outcome::Failure
        }
    }
}
