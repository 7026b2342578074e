use std::io;

use thiserror::Error;

/// Errors surfaced while turning an input line into running commands.
///
/// None of these end the interactive loop; they are printed and the
/// offending line is dropped.
#[derive(Debug, Error)]
pub enum ShellError {
    #[error("syntax error: unterminated {0} quote")]
    MalformedQuoting(&'static str),

    #[error("syntax error near unexpected token `|'")]
    MalformedPipeline,

    #[error("syntax error near unexpected token `newline' after `{0}'")]
    RedirectTargetMissing(String),

    #[error("syntax error: missing command")]
    EmptyCommand,

    #[error("{0}: command not found")]
    CommandNotFound(String),

    #[error("{path}: {}", describe_io(.source))]
    FileOpen {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// Shell-style wording for the io errors users actually hit.
pub fn describe_io(err: &io::Error) -> String {
    match err.kind() {
        io::ErrorKind::NotFound => "No such file or directory".to_string(),
        io::ErrorKind::PermissionDenied => "Permission denied".to_string(),
        io::ErrorKind::IsADirectory => "Is a directory".to_string(),
        io::ErrorKind::NotADirectory => "Not a directory".to_string(),
        _ => err.to_string(),
    }
}
