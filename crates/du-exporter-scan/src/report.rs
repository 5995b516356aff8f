//! Glob-selected file size reporting.

use std::collections::HashSet;
use std::path::Path;

use tracing::{debug, warn};

use du_exporter_core::names::{FILE_SIZE_BYTES, SCAN_ERRORS_TOTAL};
use du_exporter_core::{FileObservation, MetricsSink, ScanError};

use crate::glob::GlobMatcher;
use crate::walk::{relative_slash_path, walk_continue_on_error};

/// Outcome of one reporting pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportSummary {
    /// Files matched and published.
    pub observed: usize,
    /// Series removed because their file was not matched this pass.
    pub retracted: usize,
    /// Walk and pattern errors counted.
    pub errors: u64,
}

/// Publishes the size of every file under the root matched by the globs.
///
/// Series published by an earlier pass whose file is not matched by the
/// current pass are removed from the sink.
#[derive(Debug, Clone)]
pub struct FileSizeReporter {
    matcher: GlobMatcher,
    published: HashSet<String>,
}

impl FileSizeReporter {
    /// Create a reporter for the given patterns.
    pub fn new(matcher: GlobMatcher) -> Self {
        Self {
            matcher,
            published: HashSet::new(),
        }
    }

    /// Walk `root` and yield an observation for each matched file.
    ///
    /// Per-entry errors go to `on_error` and do not stop the walk.
    pub fn observe<F, E>(&self, root: &Path, mut emit: F, on_error: E)
    where
        F: FnMut(FileObservation),
        E: FnMut(ScanError),
    {
        if !self.matcher.can_match() {
            return;
        }

        walk_continue_on_error(
            root,
            |file| {
                let relative = relative_slash_path(root, &file.path);
                if self.matcher.is_match(&relative) {
                    emit(FileObservation {
                        path: relative,
                        size: file.metadata.len(),
                    });
                }
            },
            on_error,
        );
    }

    /// Run one pass over `root`, writing file size gauges into `sink`.
    pub fn report(&mut self, root: &Path, sink: &dyn MetricsSink) -> ReportSummary {
        let mut summary = ReportSummary::default();

        if self.matcher.is_empty() {
            debug!(root = %root.display(), "no file globs configured, nothing to report");
            return summary;
        }

        for err in self.matcher.invalid() {
            warn!(error = %err, "glob pattern ignored");
            sink.inc_counter(SCAN_ERRORS_TOTAL);
            summary.errors += 1;
        }

        let mut seen = HashSet::new();
        self.observe(
            root,
            |observation| {
                observation.publish(sink);
                seen.insert(observation.path);
                summary.observed += 1;
            },
            |err| {
                warn!(path = ?err.path(), error = %err, "error walking path");
                sink.inc_counter(SCAN_ERRORS_TOTAL);
                summary.errors += 1;
            },
        );

        for stale in self.published.difference(&seen) {
            debug!(path = %stale, "file no longer matched, removing series");
            sink.remove_gauge(FILE_SIZE_BYTES, stale);
            summary.retracted += 1;
        }
        self.published = seen;

        summary
    }
}
