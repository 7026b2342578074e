use std::env;
use std::path::PathBuf;

/// Startup settings for a [`Shell`](crate::shell::Shell).
#[derive(Debug, Clone)]
pub struct Config {
    pub prompt: String,
    /// History file loaded at startup and rewritten on exit.
    pub histfile: Option<PathBuf>,
    /// Target of a bare `cd` and of `~`.
    pub home: Option<PathBuf>,
    /// Fixed search path. `None` re-reads `PATH` on every lookup, so an
    /// edit to the environment applies to the next command.
    pub search_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            prompt: "$ ".to_string(),
            histfile: None,
            home: None,
            search_path: None,
        }
    }
}

impl Config {
    /// Reads `HISTFILE` and `HOME` once; `PATH` stays live.
    pub fn from_env() -> Self {
        Self {
            histfile: non_empty_var("HISTFILE").map(PathBuf::from),
            home: non_empty_var("HOME").map(PathBuf::from),
            ..Self::default()
        }
    }

    pub fn search_path(&self) -> String {
        match &self.search_path {
            Some(path) => path.clone(),
            None => env::var("PATH").unwrap_or_default(),
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.is_empty())
}
