//! Per-subfolder aggregation.

use std::path::Path;

use chrono::{DateTime, Utc};
use compact_str::CompactString;

use du_exporter_core::{ScanError, SubfolderStat, SubfolderTally};

use crate::walk::walk_abort_on_error;

/// Reduces a subfolder's whole subtree to a single [`SubfolderStat`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SubfolderAggregator;

impl SubfolderAggregator {
    /// Create a new aggregator.
    pub fn new() -> Self {
        Self
    }

    /// Aggregate every non-directory entry below `subfolder`.
    ///
    /// The stat is labeled with the subfolder's base name. Any traversal
    /// error aborts the whole subfolder.
    pub fn aggregate(&self, subfolder: &Path) -> Result<SubfolderStat, ScanError> {
        let name = subfolder
            .file_name()
            .map(|n| CompactString::new(n.to_string_lossy()))
            .unwrap_or_else(|| CompactString::new(subfolder.to_string_lossy()));

        let mut tally = SubfolderTally::new();
        walk_abort_on_error(subfolder, |file| {
            let modified = file
                .metadata
                .modified()
                .map_err(|e| ScanError::io(&file.path, e))?;
            tally.record_file(file.metadata.len(), epoch_seconds(modified));
            Ok(())
        })?;

        Ok(tally.finish(name))
    }
}

/// Whole seconds since the Unix epoch, negative before it.
pub(crate) fn epoch_seconds(time: std::time::SystemTime) -> i64 {
    DateTime::<Utc>::from(time).timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::{Duration, SystemTime, UNIX_EPOCH};
    use tempfile::TempDir;

    fn write_file(path: &Path, size: usize, mtime: u64) {
        fs::write(path, vec![b'x'; size]).unwrap();
        fs::File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(UNIX_EPOCH + Duration::from_secs(mtime))
            .unwrap();
    }

    #[test]
    fn test_aggregate_counts_sizes_and_mtimes() {
        let temp = TempDir::new().unwrap();
        let sub = temp.path().join("a");
        fs::create_dir_all(sub.join("nested")).unwrap();
        write_file(&sub.join("one"), 10, 100);
        write_file(&sub.join("nested/two"), 20, 200);

        let stat = SubfolderAggregator::new().aggregate(&sub).unwrap();
        assert_eq!(stat.name.as_str(), "a");
        assert_eq!(stat.file_count, 2);
        assert_eq!(stat.total_size, 30);
        assert_eq!(stat.newest_mtime, Some(200));
        assert_eq!(stat.oldest_mtime, Some(100));
    }

    #[test]
    fn test_empty_subfolder_has_no_mtimes() {
        let temp = TempDir::new().unwrap();
        let sub = temp.path().join("b");
        fs::create_dir_all(sub.join("only/dirs")).unwrap();

        let stat = SubfolderAggregator::new().aggregate(&sub).unwrap();
        assert_eq!(stat.file_count, 0);
        assert_eq!(stat.total_size, 0);
        assert_eq!(stat.newest_mtime, None);
        assert_eq!(stat.oldest_mtime, None);
    }

    #[test]
    fn test_epoch_zero_mtime_is_a_real_value() {
        let temp = TempDir::new().unwrap();
        let sub = temp.path().join("c");
        fs::create_dir(&sub).unwrap();
        write_file(&sub.join("old"), 1, 0);
        write_file(&sub.join("new"), 1, 50);

        let stat = SubfolderAggregator::new().aggregate(&sub).unwrap();
        assert_eq!(stat.oldest_mtime, Some(0));
        assert_eq!(stat.newest_mtime, Some(50));
    }

    #[test]
    fn test_missing_subfolder_fails() {
        let temp = TempDir::new().unwrap();
        let result = SubfolderAggregator::new().aggregate(&temp.path().join("vanished"));
        assert!(matches!(result, Err(ScanError::NotFound { .. })));
    }

    #[test]
    fn test_epoch_seconds() {
        assert_eq!(epoch_seconds(UNIX_EPOCH), 0);
        assert_eq!(epoch_seconds(UNIX_EPOCH + Duration::from_millis(1500)), 1);
        assert_eq!(epoch_seconds(UNIX_EPOCH - Duration::from_secs(30)), -30);
        assert!(epoch_seconds(SystemTime::now()) > 1_600_000_000);
    }
}
