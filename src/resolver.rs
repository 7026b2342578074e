use std::collections::BTreeSet;
use std::fs;
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use crate::commands::Builtin;

/// Outcome of looking a command name up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Builtin(Builtin),
    External(PathBuf),
    NotFound,
}

/// Resolves a command name. Builtins shadow executables of the same name.
pub fn resolve(name: &str, search_path: &str) -> Resolution {
    if let Some(builtin) = Builtin::from_name(name) {
        return Resolution::Builtin(builtin);
    }
    match full_path(name, search_path) {
        Some(path) => Resolution::External(path),
        None => Resolution::NotFound,
    }
}

/// Finds the full path of a command by searching the given PATH value.
/// Names containing a `/` are checked as given.
pub fn full_path(command: &str, search_path: &str) -> Option<PathBuf> {
    if command.contains('/') {
        let path = PathBuf::from(command);
        return is_executable(&path).then_some(path);
    }
    directories(search_path)
        .map(|dir| Path::new(dir).join(command))
        .find(|candidate| is_executable(candidate))
}

fn directories(search_path: &str) -> impl Iterator<Item = &str> {
    search_path.split(':').filter(|dir| !dir.is_empty())
}

/// A regular file with at least one executable bit set.
pub fn is_executable(path: &Path) -> bool {
    fs::metadata(path)
        .map(|m| {
            m.is_file() && {
                #[cfg(unix)]
                {
                    m.permissions().mode() & 0o111 != 0
                }
                #[cfg(not(unix))]
                {
                    true
                }
            }
        })
        .unwrap_or(false)
}

struct Snapshot {
    search_path: String,
    names: Arc<BTreeSet<String>>,
}

/// Executable names found on the search path, cached per PATH value.
///
/// A changed PATH replaces the snapshot. Two threads racing on a stale
/// snapshot both rescan; the last writer wins.
#[derive(Default)]
pub struct PathCache {
    snapshot: RwLock<Option<Snapshot>>,
}

impl PathCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn executables(&self, search_path: &str) -> Arc<BTreeSet<String>> {
        {
            let guard = self.snapshot.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(snapshot) = guard.as_ref()
                && snapshot.search_path == search_path
            {
                return Arc::clone(&snapshot.names);
            }
        }

        let names = Arc::new(scan(search_path));
        tracing::debug!(count = names.len(), "rescanned search path");
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = Some(Snapshot {
            search_path: search_path.to_string(),
            names: Arc::clone(&names),
        });
        names
    }
}

fn scan(search_path: &str) -> BTreeSet<String> {
    directories(search_path)
        .filter_map(|dir| fs::read_dir(dir).ok())
        .flat_map(|entries| entries.flatten())
        .filter(|entry| is_executable(&entry.path()))
        .filter_map(|entry| entry.file_name().into_string().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    fn make_executable(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        File::create(&path).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn make_plain(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        File::create(&path).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();
        path
    }

    #[test]
    fn test_builtins_shadow_executables() {
        let dir = tempfile::tempdir().unwrap();
        make_executable(dir.path(), "echo");
        let search = dir.path().to_string_lossy().into_owned();
        assert_eq!(resolve("echo", &search), Resolution::Builtin(Builtin::Echo));
    }

    #[test]
    fn test_first_directory_wins() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        make_plain(first.path(), "tool");
        let expected = make_executable(second.path(), "tool");
        let third = make_executable(first.path(), "other");
        let search = format!("{}:{}", first.path().display(), second.path().display());

        assert_eq!(resolve("tool", &search), Resolution::External(expected));
        assert_eq!(resolve("other", &search), Resolution::External(third));
        assert_eq!(resolve("missing", &search), Resolution::NotFound);
    }

    #[test]
    fn test_directories_are_not_executables() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        let search = dir.path().to_string_lossy().into_owned();
        assert_eq!(resolve("sub", &search), Resolution::NotFound);
    }

    #[test]
    fn test_slash_names_skip_search() {
        let dir = tempfile::tempdir().unwrap();
        let path = make_executable(dir.path(), "run");
        let name = path.to_string_lossy().into_owned();
        assert_eq!(resolve(&name, ""), Resolution::External(path));
    }

    #[test]
    fn test_cache_tracks_search_path_value() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        make_executable(first.path(), "alpha");
        make_plain(first.path(), "notes");
        make_executable(second.path(), "beta");

        let cache = PathCache::new();
        let a = first.path().to_string_lossy().into_owned();
        let names = cache.executables(&a);
        assert!(names.contains("alpha"));
        assert!(!names.contains("notes"));

        // Same key: served from the snapshot even though the directory changed.
        make_executable(first.path(), "gamma");
        assert!(!cache.executables(&a).contains("gamma"));

        let both = format!("{a}:{}", second.path().display());
        let names = cache.executables(&both);
        assert!(names.contains("beta"));
        assert!(names.contains("gamma"));
    }
}
