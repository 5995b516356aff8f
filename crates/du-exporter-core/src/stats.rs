//! Values produced by a scan cycle.

use std::path::PathBuf;
use std::time::Duration;

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

use crate::metrics::{
    DISK_FREE_PERCENT, DISK_TOTAL_BYTES, DISK_USED_BYTES, FILE_SIZE_BYTES, MetricsSink,
    SUBFOLDER_FILE_COUNT, SUBFOLDER_NEWEST_MTIME, SUBFOLDER_OLDEST_MTIME, SUBFOLDER_TOTAL_SIZE,
};

/// Aggregate of one immediate subfolder of the watched root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubfolderStat {
    /// Base name of the subfolder, used as the metric label.
    pub name: CompactString,
    /// Number of non-directory entries in the subtree.
    pub file_count: u64,
    /// Sum of their sizes in bytes.
    pub total_size: u64,
    /// Newest modification time, epoch seconds. None when empty.
    pub newest_mtime: Option<i64>,
    /// Oldest modification time, epoch seconds. None when empty.
    pub oldest_mtime: Option<i64>,
}

impl SubfolderStat {
    /// Write this aggregate into the subfolder gauges.
    ///
    /// Mtime gauges are only set when at least one file was seen.
    pub fn publish(&self, sink: &dyn MetricsSink) {
        sink.set_gauge(SUBFOLDER_FILE_COUNT, &self.name, self.file_count as f64);
        sink.set_gauge(SUBFOLDER_TOTAL_SIZE, &self.name, self.total_size as f64);
        if let Some(newest) = self.newest_mtime {
            sink.set_gauge(SUBFOLDER_NEWEST_MTIME, &self.name, newest as f64);
        }
        if let Some(oldest) = self.oldest_mtime {
            sink.set_gauge(SUBFOLDER_OLDEST_MTIME, &self.name, oldest as f64);
        }
    }

    /// Clear every subfolder-scoped series.
    pub fn reset_all(sink: &dyn MetricsSink) {
        sink.reset_gauge(SUBFOLDER_FILE_COUNT);
        sink.reset_gauge(SUBFOLDER_TOTAL_SIZE);
        sink.reset_gauge(SUBFOLDER_NEWEST_MTIME);
        sink.reset_gauge(SUBFOLDER_OLDEST_MTIME);
    }
}

/// Running totals while walking a subfolder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubfolderTally {
    pub file_count: u64,
    pub total_size: u64,
    pub newest_mtime: Option<i64>,
    pub oldest_mtime: Option<i64>,
}

impl SubfolderTally {
    /// Create an empty tally.
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for one file.
    pub fn record_file(&mut self, size: u64, mtime: i64) {
        self.file_count += 1;
        self.total_size = self.total_size.saturating_add(size);

        if self.newest_mtime.is_none_or(|t| mtime > t) {
            self.newest_mtime = Some(mtime);
        }
        if self.oldest_mtime.is_none_or(|t| mtime < t) {
            self.oldest_mtime = Some(mtime);
        }
    }

    /// Finish the tally under the given label.
    pub fn finish(self, name: impl Into<CompactString>) -> SubfolderStat {
        SubfolderStat {
            name: name.into(),
            file_count: self.file_count,
            total_size: self.total_size,
            newest_mtime: self.newest_mtime,
            oldest_mtime: self.oldest_mtime,
        }
    }
}

/// Size of one file matched by the configured globs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileObservation {
    /// Path relative to the root, `/`-separated.
    pub path: String,
    /// Size in bytes.
    pub size: u64,
}

impl FileObservation {
    /// Write this observation into the file size gauge.
    pub fn publish(&self, sink: &dyn MetricsSink) {
        sink.set_gauge(FILE_SIZE_BYTES, &self.path, self.size as f64);
    }
}

/// Capacity figures for the filesystem holding a path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiskSample {
    /// Path that was queried; also the metric label.
    pub path: PathBuf,
    /// Total bytes on the filesystem.
    pub total: u64,
    /// Bytes not available to unprivileged users.
    pub used: u64,
    /// Available bytes as a percentage of total, in `[0, 100]`.
    pub free_percent: f64,
}

impl DiskSample {
    /// Bytes available to unprivileged users.
    pub fn free(&self) -> u64 {
        self.total - self.used
    }

    /// Write this sample into the disk gauges.
    pub fn publish(&self, sink: &dyn MetricsSink) {
        let label = self.path.to_string_lossy();
        sink.set_gauge(DISK_TOTAL_BYTES, &label, self.total as f64);
        sink.set_gauge(DISK_USED_BYTES, &label, self.used as f64);
        sink.set_gauge(DISK_FREE_PERCENT, &label, self.free_percent);
    }
}

/// Summary of a single scan cycle.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleReport {
    /// Wall-clock duration of the cycle.
    pub duration: Duration,
    /// Whether the root could be enumerated.
    pub root_listed: bool,
    /// Subfolders whose aggregate was published.
    pub subfolders_published: usize,
    /// Subfolders skipped because their walk failed.
    pub subfolders_failed: usize,
    /// Files matched by the globs this cycle.
    pub files_observed: usize,
    /// File series removed because the file was not seen this cycle.
    pub files_retracted: usize,
    /// Errors counted during the cycle.
    pub errors: u64,
    /// Capacity sample, if one was taken.
    pub disk: Option<DiskSample>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_file_sets_both_bounds() {
        let mut tally = SubfolderTally::new();
        tally.record_file(10, 100);

        assert_eq!(tally.newest_mtime, Some(100));
        assert_eq!(tally.oldest_mtime, Some(100));
    }

    #[test]
    fn test_bounds_do_not_use_zero_sentinel() {
        let mut tally = SubfolderTally::new();
        tally.record_file(1, 500);
        tally.record_file(1, 0);
        tally.record_file(1, -20);

        assert_eq!(tally.newest_mtime, Some(500));
        assert_eq!(tally.oldest_mtime, Some(-20));
    }

    #[test]
    fn test_empty_tally_has_no_mtimes() {
        let stat = SubfolderTally::new().finish("b");
        assert_eq!(stat.name.as_str(), "b");
        assert_eq!(stat.file_count, 0);
        assert_eq!(stat.total_size, 0);
        assert!(stat.newest_mtime.is_none());
        assert!(stat.oldest_mtime.is_none());
    }

    #[test]
    fn test_disk_sample_free() {
        let sample = DiskSample {
            path: "/".into(),
            total: 4_096_000,
            used: 3_072_000,
            free_percent: 25.0,
        };
        assert_eq!(sample.free(), 1_024_000);
    }
}
