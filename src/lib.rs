pub mod commands;
pub mod completion;
pub mod config;
pub mod error;
pub mod executor;
pub mod history;
pub mod pipeline;
pub mod redirection;
pub mod resolver;
pub mod shell;
pub mod tokenize;

pub use config::Config;
pub use error::ShellError;
pub use shell::{Flow, Shell};
