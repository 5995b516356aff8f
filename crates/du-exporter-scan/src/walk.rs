//! Recursive traversal strategies.
//!
//! Both strategies walk serially with jwalk, never follow symlinks, and
//! include hidden entries. They differ only in what a failed entry does:
//!
//! - [`walk_abort_on_error`] stops at the first failure and returns it.
//!   Used for subfolder aggregates, where a partial total would mislead.
//! - [`walk_continue_on_error`] hands each failure to a callback and keeps
//!   going. Used for per-file reporting, where partial results are useful.

use std::fs::Metadata;
use std::path::{Path, PathBuf};

use jwalk::{DirEntry, Parallelism, WalkDir};

use du_exporter_core::ScanError;

/// A non-directory entry found during a walk.
#[derive(Debug)]
pub struct FileEntry {
    /// Full path, rooted at the walk's starting directory.
    pub path: PathBuf,
    /// Metadata of the entry itself (symlinks are not followed).
    pub metadata: Metadata,
}

/// Walk `dir`, visiting every non-directory entry. The first traversal
/// error, or the first error returned by `visit`, ends the walk.
pub fn walk_abort_on_error<F>(dir: &Path, mut visit: F) -> Result<(), ScanError>
where
    F: FnMut(FileEntry) -> Result<(), ScanError>,
{
    let root_meta = std::fs::symlink_metadata(dir).map_err(|e| ScanError::io(dir, e))?;
    if !root_meta.is_dir() {
        return Err(ScanError::NotADirectory {
            path: dir.to_path_buf(),
        });
    }

    for entry_result in walker(dir) {
        let mut entry = entry_result.map_err(|err| walk_error(dir, err))?;
        if let Some(err) = entry.read_children_error.take() {
            return Err(walk_error(&entry.path(), err));
        }
        if let Some(file) = file_entry(&entry)? {
            visit(file)?;
        }
    }

    Ok(())
}

/// Walk `dir`, visiting every non-directory entry. Traversal errors are
/// passed to `on_error` and the walk carries on with the next entry.
pub fn walk_continue_on_error<F, E>(dir: &Path, mut visit: F, mut on_error: E)
where
    F: FnMut(FileEntry),
    E: FnMut(ScanError),
{
    if let Err(e) = std::fs::symlink_metadata(dir) {
        on_error(ScanError::io(dir, e));
        return;
    }

    for entry_result in walker(dir) {
        let mut entry = match entry_result {
            Ok(entry) => entry,
            Err(err) => {
                on_error(walk_error(dir, err));
                continue;
            }
        };
        if let Some(err) = entry.read_children_error.take() {
            on_error(walk_error(&entry.path(), err));
        }
        match file_entry(&entry) {
            Ok(Some(file)) => visit(file),
            Ok(None) => {}
            Err(err) => on_error(err),
        }
    }
}

/// Path of `path` relative to `root`, with `/` separators.
///
/// Paths outside `root` are returned whole, still `/`-separated.
pub fn relative_slash_path(root: &Path, path: &Path) -> String {
    match path.strip_prefix(root) {
        Ok(rel) => rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/"),
        Err(_) => path.to_string_lossy().replace('\\', "/"),
    }
}

fn walker(dir: &Path) -> WalkDir {
    WalkDir::new(dir)
        .parallelism(Parallelism::Serial)
        .skip_hidden(false)
        .follow_links(false)
        .min_depth(0)
}

fn file_entry(entry: &DirEntry<((), ())>) -> Result<Option<FileEntry>, ScanError> {
    if entry.file_type().is_dir() {
        return Ok(None);
    }
    let path = entry.path();
    let metadata = entry.metadata().map_err(|err| walk_error(&path, err))?;
    Ok(Some(FileEntry { path, metadata }))
}

fn walk_error(fallback: &Path, err: jwalk::Error) -> ScanError {
    let path = err
        .path()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| fallback.to_path_buf());
    let source = match err.io_error() {
        Some(io) => std::io::Error::new(io.kind(), err.to_string()),
        None => std::io::Error::other(err.to_string()),
    };
    ScanError::io(path, source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_tree() -> TempDir {
        let temp = TempDir::new().unwrap();
        let root = temp.path();

        fs::create_dir_all(root.join("a/deep/er")).unwrap();
        fs::create_dir(root.join("empty")).unwrap();
        fs::write(root.join("top.txt"), "top").unwrap();
        fs::write(root.join("a/one.txt"), "1").unwrap();
        fs::write(root.join("a/deep/er/two.txt"), "22").unwrap();
        fs::write(root.join("a/.hidden"), "333").unwrap();

        temp
    }

    fn collect_abort(dir: &Path) -> Vec<String> {
        let mut seen = Vec::new();
        walk_abort_on_error(dir, |file| {
            seen.push(relative_slash_path(dir, &file.path));
            Ok(())
        })
        .unwrap();
        seen.sort();
        seen
    }

    #[test]
    fn test_abort_walk_visits_files_only() {
        let temp = create_test_tree();
        let seen = collect_abort(temp.path());
        assert_eq!(seen, vec!["a/.hidden", "a/deep/er/two.txt", "a/one.txt", "top.txt"]);
    }

    #[test]
    fn test_abort_walk_missing_dir() {
        let temp = TempDir::new().unwrap();
        let result = walk_abort_on_error(&temp.path().join("gone"), |_| Ok(()));
        assert!(matches!(result, Err(ScanError::NotFound { .. })));
    }

    #[test]
    fn test_abort_walk_on_file_root() {
        let temp = create_test_tree();
        let result = walk_abort_on_error(&temp.path().join("top.txt"), |_| Ok(()));
        assert!(matches!(result, Err(ScanError::NotADirectory { .. })));
    }

    #[test]
    fn test_abort_walk_stops_on_visitor_error() {
        let temp = create_test_tree();
        let mut visits = 0;
        let result = walk_abort_on_error(temp.path(), |file| {
            visits += 1;
            Err(ScanError::NotADirectory { path: file.path })
        });
        assert!(result.is_err());
        assert_eq!(visits, 1);
    }

    #[test]
    fn test_continue_walk_reports_missing_root() {
        let temp = TempDir::new().unwrap();
        let mut files = 0;
        let mut errors = Vec::new();
        walk_continue_on_error(&temp.path().join("gone"), |_| files += 1, |e| errors.push(e));

        assert_eq!(files, 0);
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_continue_walk_visits_everything() {
        let temp = create_test_tree();
        let mut seen = Vec::new();
        let mut errors = 0;
        walk_continue_on_error(
            temp.path(),
            |file| seen.push(relative_slash_path(temp.path(), &file.path)),
            |_| errors += 1,
        );
        seen.sort();

        assert_eq!(errors, 0);
        assert_eq!(seen.len(), 4);
        assert!(seen.contains(&"a/deep/er/two.txt".to_string()));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_are_not_followed() {
        let temp = create_test_tree();
        std::os::unix::fs::symlink(temp.path().join("a"), temp.path().join("empty/link")).unwrap();

        let seen = collect_abort(&temp.path().join("empty"));
        assert_eq!(seen, vec!["link"]);
    }

    #[test]
    fn test_relative_slash_path() {
        let root = Path::new("/srv/watched");
        assert_eq!(relative_slash_path(root, Path::new("/srv/watched/x/y.db")), "x/y.db");
        assert_eq!(relative_slash_path(root, Path::new("/elsewhere/z")), "/elsewhere/z");

        let relative_root = Path::new("./watched");
        assert_eq!(
            relative_slash_path(relative_root, Path::new("./watched/a/b.txt")),
            "a/b.txt"
        );
    }
}
