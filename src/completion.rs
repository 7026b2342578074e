use rustyline::completion::{Completer, FilenameCompleter, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::Helper;
use std::cell::RefCell;
use std::io::{self, Write};
use std::sync::Arc;

use crate::commands::BUILTINS;
use crate::config::Config;
use crate::resolver::PathCache;

/// Command names starting with `prefix`: builtins plus executables on the
/// search path, sorted and without duplicates.
pub fn complete(prefix: &str, search_path: &str, paths: &PathCache) -> Vec<String> {
    let executables = paths.executables(search_path);
    let mut candidates: Vec<String> = BUILTINS
        .iter()
        .map(|name| name.to_string())
        .chain(executables.iter().cloned())
        .filter(|name| name.starts_with(prefix))
        .collect();
    candidates.sort();
    candidates.dedup();
    candidates
}

/// What a Tab press does to the line.
#[derive(Debug, PartialEq, Eq)]
pub enum Action {
    Bell,
    Replace(String),
    List(Vec<String>),
}

/// Completion policy for the word `word`. `repeated` is set when the
/// previous Tab was pressed on the same, unedited line.
pub fn decide(word: &str, candidates: &[String], repeated: bool) -> Action {
    match candidates {
        [] => Action::Bell,
        [only] => Action::Replace(format!("{only} ")),
        _ => {
            let common = longest_common_prefix(candidates);
            if common.len() > word.len() {
                Action::Replace(common.to_string())
            } else if repeated {
                Action::List(candidates.to_vec())
            } else {
                Action::Bell
            }
        }
    }
}

fn longest_common_prefix(candidates: &[String]) -> &str {
    let first = &candidates[0];
    let len = candidates[1..].iter().fold(first.len(), |len, other| {
        first[..len]
            .char_indices()
            .zip(other.chars())
            .find(|((_, a), b)| a != b)
            .map_or(len.min(other.len()), |((i, _), _)| i)
    });
    &first[..len]
}

/// Shell completer for tab completion.
pub struct ShellCompleter {
    config: Config,
    paths: Arc<PathCache>,
    filename_completer: FilenameCompleter,
    last_attempt: RefCell<Option<(String, usize)>>,
}

impl ShellCompleter {
    pub fn new(config: Config, paths: Arc<PathCache>) -> Self {
        Self {
            config,
            paths,
            filename_completer: FilenameCompleter::new(),
            last_attempt: RefCell::new(None),
        }
    }

    /// Forgets the previous Tab press; called before every prompt.
    pub fn reset(&self) {
        self.last_attempt.borrow_mut().take();
    }

    /// Applies the policy for a Tab at `pos`, updating the repeat state.
    /// `None` means the word is an argument, not a command name.
    fn next_action(&self, line: &str, pos: usize) -> Option<(usize, Action)> {
        let (start, word) = extract_word(line, pos);
        if !is_command_position(&line[..start]) {
            return None;
        }

        let candidates = complete(&word, &self.config.search_path(), &self.paths);
        let attempt = (line.to_string(), pos);
        let repeated = self.last_attempt.borrow().as_ref() == Some(&attempt);
        let action = decide(&word, &candidates, repeated);
        match action {
            Action::Replace(_) => self.reset(),
            Action::Bell | Action::List(_) => *self.last_attempt.borrow_mut() = Some(attempt),
        }
        Some((start, action))
    }
}

/// True when the next word names a command: start of line or right after `|`.
fn is_command_position(before: &str) -> bool {
    let before = before.trim_end();
    before.is_empty() || before.ends_with('|')
}

/// Candidate list followed by the prompt and line redrawn, with the cursor
/// moved back to `pos`.
fn list_text(prompt: &str, line: &str, pos: usize, candidates: &[String]) -> String {
    let mut text = format!("\n{}\n{}{}", candidates.join("  "), prompt, line);
    let tail = line[pos..].chars().count();
    if tail > 0 {
        text.push_str(&format!("\x1b[{tail}D"));
    }
    text
}

fn show_list(text: &str) {
    let mut out = io::stdout().lock();
    let _ = out.write_all(text.as_bytes());
    let _ = out.flush();
}

fn ring_bell() {
    let mut out = io::stdout().lock();
    let _ = out.write_all(b"\x07");
    let _ = out.flush();
}

impl Completer for ShellCompleter {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        ctx: &rustyline::Context<'_>,
    ) -> Result<(usize, Vec<Self::Candidate>), ReadlineError> {
        let Some((start, action)) = self.next_action(line, pos) else {
            return self.filename_completer.complete(line, pos, ctx);
        };

        match action {
            Action::Bell => {
                ring_bell();
                Ok((start, Vec::new()))
            }
            Action::Replace(replacement) => Ok((
                start,
                vec![Pair {
                    display: replacement.trim_end().to_string(),
                    replacement,
                }],
            )),
            Action::List(all) => {
                show_list(&list_text(&self.config.prompt, line, pos, &all));
                Ok((start, Vec::new()))
            }
        }
    }
}

fn extract_word(line: &str, pos: usize) -> (usize, String) {
    let before = &line[..pos];
    let start = before.rfind(|c: char| c.is_whitespace()).map_or(0, |i| i + 1);
    (start, line[start..pos].to_string())
}

impl Helper for ShellCompleter {}
impl Hinter for ShellCompleter {
    type Hint = String;
}
impl Highlighter for ShellCompleter {}
impl Validator for ShellCompleter {}

#[cfg(test)]
mod tests {
    use super::*;
    use rustyline::history::DefaultHistory;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn path_with(executables: &[&str]) -> (tempfile::TempDir, String) {
        let dir = tempfile::tempdir().unwrap();
        for name in executables {
            let path = dir.path().join(name);
            fs::write(&path, "").unwrap();
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        }
        let search = dir.path().to_string_lossy().into_owned();
        (dir, search)
    }

    #[test]
    fn test_candidates_merge_builtins_and_path() {
        let (_dir, search) = path_with(&["echo", "exa", "xargs"]);
        let cache = PathCache::new();
        assert_eq!(complete("e", &search, &cache), names(&["echo", "exa", "exit"]));
        assert_eq!(complete("x", &search, &cache), names(&["xargs"]));
        assert!(complete("zz", &search, &cache).is_empty());
    }

    #[test]
    fn test_single_match_gets_trailing_space() {
        let (_dir, search) = path_with(&["custom_tool"]);
        let candidates = complete("custom", &search, &PathCache::new());
        assert_eq!(
            decide("custom", &candidates, false),
            Action::Replace("custom_tool ".to_string())
        );
        assert_eq!(
            decide("ech", &names(&["echo"]), false),
            Action::Replace("echo ".to_string())
        );
    }

    #[test]
    fn test_no_match_rings_bell() {
        assert_eq!(decide("qq", &[], false), Action::Bell);
        assert_eq!(decide("qq", &[], true), Action::Bell);
    }

    #[test]
    fn test_common_prefix_extends() {
        let candidates = names(&["xyz_foo", "xyz_foo_bar", "xyz_foo_bar_baz"]);
        assert_eq!(
            decide("xyz_", &candidates, false),
            Action::Replace("xyz_foo".to_string())
        );
    }

    #[test]
    fn test_ambiguous_bells_then_lists() {
        let candidates = names(&["exa", "exit"]);
        assert_eq!(decide("ex", &candidates, false), Action::Bell);
        assert_eq!(decide("ex", &candidates, true), Action::List(candidates.clone()));
    }

    #[test]
    fn test_longest_common_prefix() {
        assert_eq!(longest_common_prefix(&names(&["abc", "abd", "ab"])), "ab");
        assert_eq!(longest_common_prefix(&names(&["same", "same"])), "same");
        assert_eq!(longest_common_prefix(&names(&["a", "b"])), "");
    }

    fn completer(search: &str) -> ShellCompleter {
        let config = Config {
            search_path: Some(search.to_string()),
            ..Config::default()
        };
        ShellCompleter::new(config, Arc::new(PathCache::new()))
    }

    #[test]
    fn test_second_tab_lists_candidates() {
        let (_dir, search) = path_with(&["exa", "exb"]);
        let completer = completer(&search);
        let history = DefaultHistory::new();
        let ctx = rustyline::Context::new(&history);

        let (start, pairs) = completer.complete("ex", 2, &ctx).unwrap();
        assert_eq!(start, 0);
        assert!(pairs.is_empty());
        assert_eq!(
            *completer.last_attempt.borrow(),
            Some(("ex".to_string(), 2))
        );

        assert_eq!(
            completer.next_action("ex", 2),
            Some((0, Action::List(names(&["exa", "exb", "exit"]))))
        );
    }

    #[test]
    fn test_edit_or_reset_restarts_the_two_tab_cycle() {
        let (_dir, search) = path_with(&["exa", "exb"]);
        let completer = completer(&search);

        assert_eq!(completer.next_action("ex", 2), Some((0, Action::Bell)));
        assert_eq!(completer.next_action("ex ", 2).map(|(_, a)| a), Some(Action::Bell));
        completer.reset();
        assert_eq!(completer.next_action("ex", 2), Some((0, Action::Bell)));
    }

    #[test]
    fn test_single_match_returns_one_pair() {
        let (_dir, search) = path_with(&["custom_tool"]);
        let completer = completer(&search);
        let history = DefaultHistory::new();
        let ctx = rustyline::Context::new(&history);

        let (start, pairs) = completer.complete("echo x | cus", 12, &ctx).unwrap();
        assert_eq!(start, 9);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].replacement, "custom_tool ");
        assert_eq!(pairs[0].display, "custom_tool");
        assert!(completer.last_attempt.borrow().is_none());
    }

    #[test]
    fn test_command_position() {
        assert!(is_command_position(""));
        assert!(is_command_position("  "));
        assert!(is_command_position("echo x | "));
        assert!(is_command_position("echo x |"));
        assert!(!is_command_position("echo "));
        assert!(!is_command_position("cat | grep "));

        let completer = completer("");
        assert_eq!(completer.next_action("cat fi", 6), None);
    }

    #[test]
    fn test_list_text_restores_cursor() {
        let candidates = names(&["exa", "exit"]);
        assert_eq!(
            list_text("$ ", "ex", 2, &candidates),
            "\nexa  exit\n$ ex"
        );
        assert_eq!(
            list_text("$ ", "ex foo", 2, &candidates),
            "\nexa  exit\n$ ex foo\x1b[4D"
        );
    }

    #[test]
    fn test_extract_word() {
        assert_eq!(extract_word("ec", 2), (0, "ec".to_string()));
        assert_eq!(extract_word("cat fi", 6), (4, "fi".to_string()));
    }
}
