use std::fs::{File, OpenOptions};
use std::io::{self, PipeReader, PipeWriter, Write};
use std::process::Stdio;

use crate::error::ShellError;
use crate::pipeline::Segment;

/// How a redirection target is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Truncate,
    Append,
}

/// Represents a redirection operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirection {
    pub file: String,
    pub mode: Mode,
}

impl Redirection {
    /// Opens (creating if needed) the target file.
    pub fn open(&self) -> Result<File, ShellError> {
        let mut options = OpenOptions::new();
        options.create(true);
        match self.mode {
            Mode::Truncate => options.write(true).truncate(true),
            Mode::Append => options.append(true),
        };
        options.open(&self.file).map_err(|source| ShellError::FileOpen {
            path: self.file.clone(),
            source,
        })
    }
}

/// A parsed command with arguments and redirections.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub args: Vec<String>,
    pub redirect_stdout: Option<Redirection>,
    pub redirect_stderr: Option<Redirection>,
}

impl ParsedCommand {
    pub fn name(&self) -> &str {
        &self.args[0]
    }
}

enum Stream {
    Stdout,
    Stderr,
}

fn classify(token: &str) -> Option<(Stream, Mode)> {
    match token {
        ">" | "1>" => Some((Stream::Stdout, Mode::Truncate)),
        ">>" | "1>>" => Some((Stream::Stdout, Mode::Append)),
        "2>" => Some((Stream::Stderr, Mode::Truncate)),
        "2>>" => Some((Stream::Stderr, Mode::Append)),
        _ => None,
    }
}

/// Parses a segment into a ParsedCommand, extracting redirection operators.
///
/// The first redirection of each stream wins; later ones are dropped
/// from the arguments and otherwise ignored.
pub fn parse_command(segment: Segment) -> Result<ParsedCommand, ShellError> {
    let mut parsed = ParsedCommand::default();
    let mut tokens = segment.into_iter();

    while let Some(token) = tokens.next() {
        let Some((stream, mode)) = classify(&token) else {
            parsed.args.push(token);
            continue;
        };
        let file = tokens
            .next()
            .ok_or_else(|| ShellError::RedirectTargetMissing(token.clone()))?;
        let slot = match stream {
            Stream::Stdout => &mut parsed.redirect_stdout,
            Stream::Stderr => &mut parsed.redirect_stderr,
        };
        if slot.is_none() {
            *slot = Some(Redirection { file, mode });
        } else {
            tracing::debug!(operator = %token, target = %file, "ignoring repeated redirection");
        }
    }

    if parsed.args.is_empty() {
        return Err(ShellError::EmptyCommand);
    }
    Ok(parsed)
}

/// Where a stage reads its input from.
#[derive(Debug)]
pub enum Source {
    Terminal,
    Pipe(PipeReader),
}

impl Source {
    pub fn into_stdio(self) -> Stdio {
        match self {
            Source::Terminal => Stdio::inherit(),
            Source::Pipe(reader) => reader.into(),
        }
    }
}

/// Where a stage's output stream goes.
#[derive(Debug)]
pub enum Sink {
    Stdout,
    Stderr,
    Pipe(PipeWriter),
    File(File),
}

impl Sink {
    pub fn into_stdio(self) -> Stdio {
        match self {
            Sink::Stdout | Sink::Stderr => Stdio::inherit(),
            Sink::Pipe(writer) => writer.into(),
            Sink::File(file) => file.into(),
        }
    }
}

impl Write for Sink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Sink::Stdout => io::stdout().lock().write(buf),
            Sink::Stderr => io::stderr().lock().write(buf),
            Sink::Pipe(writer) => writer.write(buf),
            Sink::File(file) => file.write(buf),
        }
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        match self {
            Sink::Stdout => {
                let mut out = io::stdout().lock();
                out.write_all(buf)?;
                out.flush()
            }
            Sink::Stderr => io::stderr().lock().write_all(buf),
            Sink::Pipe(writer) => writer.write_all(buf),
            Sink::File(file) => file.write_all(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Sink::Stdout => io::stdout().flush(),
            Sink::Stderr => io::stderr().flush(),
            Sink::Pipe(writer) => writer.flush(),
            Sink::File(file) => file.flush(),
        }
    }
}

/// A command with every stream endpoint bound.
///
/// Dropping it closes any redirection files and pipe ends it holds.
#[derive(Debug)]
pub struct ResolvedCommand {
    pub argv: Vec<String>,
    pub stdin: Source,
    pub stdout: Sink,
    pub stderr: Sink,
}

impl ResolvedCommand {
    /// Binds a parsed command to its endpoints. Redirections override the
    /// positional defaults; an overridden pipe end is dropped here so the
    /// neighbouring stage sees end-of-input.
    pub fn bind(
        parsed: ParsedCommand,
        stdin: Source,
        stdout: Sink,
    ) -> Result<ResolvedCommand, ShellError> {
        let stdout = match &parsed.redirect_stdout {
            Some(redirection) => Sink::File(redirection.open()?),
            None => stdout,
        };
        let stderr = match &parsed.redirect_stderr {
            Some(redirection) => Sink::File(redirection.open()?),
            None => Sink::Stderr,
        };
        Ok(ResolvedCommand {
            argv: parsed.args,
            stdin,
            stdout,
            stderr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn segment(s: &str) -> Segment {
        s.split_whitespace().map(String::from).collect()
    }

    #[test]
    fn test_parse_stdout_redirect() {
        let parsed = parse_command(segment("echo hi > out.txt")).unwrap();
        assert_eq!(parsed.args, vec!["echo", "hi"]);
        assert_eq!(
            parsed.redirect_stdout,
            Some(Redirection {
                file: "out.txt".to_string(),
                mode: Mode::Truncate
            })
        );
        assert!(parsed.redirect_stderr.is_none());
    }

    #[test]
    fn test_parse_all_operators() {
        let parsed = parse_command(segment("ls 1>> a 2> b -l")).unwrap();
        assert_eq!(parsed.args, vec!["ls", "-l"]);
        assert_eq!(parsed.redirect_stdout.unwrap().mode, Mode::Append);
        let stderr = parsed.redirect_stderr.unwrap();
        assert_eq!(stderr.file, "b");
        assert_eq!(stderr.mode, Mode::Truncate);

        let parsed = parse_command(segment("ls 2>> e 1> o")).unwrap();
        assert_eq!(parsed.redirect_stderr.unwrap().mode, Mode::Append);
        assert_eq!(parsed.redirect_stdout.unwrap().mode, Mode::Truncate);
    }

    #[test]
    fn test_first_redirection_wins() {
        let parsed = parse_command(segment("echo x > first >> second y")).unwrap();
        assert_eq!(parsed.args, vec!["echo", "x", "y"]);
        assert_eq!(parsed.redirect_stdout.unwrap().file, "first");
    }

    #[test]
    fn test_missing_target() {
        assert!(matches!(
            parse_command(segment("echo hi 2>")),
            Err(ShellError::RedirectTargetMissing(op)) if op == "2>"
        ));
    }

    #[test]
    fn test_empty_command_after_removal() {
        assert!(matches!(
            parse_command(segment("> out.txt")),
            Err(ShellError::EmptyCommand)
        ));
    }

    #[test]
    fn test_operator_free_argv_is_unchanged() {
        let parsed = parse_command(segment("grep -n foo bar")).unwrap();
        let again = parse_command(parsed.args.clone()).unwrap();
        assert_eq!(again, parsed);
        assert!(again.redirect_stdout.is_none() && again.redirect_stderr.is_none());
    }

    #[test]
    fn test_open_truncates_and_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let file = path.to_string_lossy().into_owned();

        let truncate = Redirection { file: file.clone(), mode: Mode::Truncate };
        truncate.open().unwrap().write_all(b"one\n").unwrap();
        truncate.open().unwrap().write_all(b"two\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "two\n");

        let append = Redirection { file, mode: Mode::Append };
        append.open().unwrap().write_all(b"three\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "two\nthree\n");
    }

    #[test]
    fn test_open_missing_directory() {
        let redirection = Redirection {
            file: "/nonexistent-dir/out.txt".to_string(),
            mode: Mode::Truncate,
        };
        let err = redirection.open().unwrap_err();
        assert_eq!(
            err.to_string(),
            "/nonexistent-dir/out.txt: No such file or directory"
        );
    }

    #[test]
    fn test_bind_prefers_redirection_over_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("o");
        let line = format!("echo hi > {}", path.display());
        let parsed = parse_command(segment(&line)).unwrap();
        let resolved = ResolvedCommand::bind(parsed, Source::Terminal, Sink::Stdout).unwrap();
        assert_eq!(resolved.argv, vec!["echo", "hi"]);
        assert!(matches!(resolved.stdout, Sink::File(_)));
        assert!(matches!(resolved.stderr, Sink::Stderr));
        assert!(path.exists());
    }
}
