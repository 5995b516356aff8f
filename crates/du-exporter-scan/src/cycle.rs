//! Scan cycle orchestration.

use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{debug, error, warn};

use du_exporter_core::names::{SCAN_DURATION_SECONDS, SCAN_ERRORS_TOTAL, SCAN_TOTAL};
use du_exporter_core::{CycleReport, ExporterConfig, MetricsSink, ScanError, SubfolderStat};

use crate::aggregate::SubfolderAggregator;
use crate::disk::DiskSampler;
use crate::glob::GlobMatcher;
use crate::report::FileSizeReporter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum ScanState {
    #[default]
    Idle,
    Scanning,
}

/// Runs complete scan cycles over a watched root.
///
/// Each call to [`ScanOrchestrator::run_cycle`] is an independent pass:
/// subfolder series are cleared and rebuilt, file and disk series are
/// upserted, and the cycle duration and count are always recorded.
#[derive(Debug)]
pub struct ScanOrchestrator {
    root: PathBuf,
    disk_path: PathBuf,
    aggregator: SubfolderAggregator,
    reporter: FileSizeReporter,
    sampler: DiskSampler,
    state: ScanState,
}

impl ScanOrchestrator {
    /// Create an orchestrator for `root`, sampling capacity at `disk_path`.
    pub fn new<S: AsRef<str>>(
        root: impl Into<PathBuf>,
        disk_path: impl Into<PathBuf>,
        globs: &[S],
    ) -> Self {
        Self {
            root: root.into(),
            disk_path: disk_path.into(),
            aggregator: SubfolderAggregator::new(),
            reporter: FileSizeReporter::new(GlobMatcher::new(globs)),
            sampler: DiskSampler::new(),
            state: ScanState::Idle,
        }
    }

    /// Create an orchestrator from exporter configuration.
    pub fn from_config(config: &ExporterConfig) -> Self {
        Self::new(&config.root, config.disk_path(), config.globs.as_slice())
    }

    /// Watched root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Run one full cycle, writing into `sink`.
    pub fn run_cycle(&mut self, sink: &dyn MetricsSink) -> CycleReport {
        self.state = ScanState::Scanning;
        debug!(root = %self.root.display(), state = ?self.state, "scan cycle started");
        let start = Instant::now();
        let mut report = CycleReport::default();

        SubfolderStat::reset_all(sink);

        match list_subfolders(&self.root) {
            Ok(subfolders) => {
                report.root_listed = true;
                self.scan_subfolders(&subfolders, sink, &mut report);
                self.report_files(sink, &mut report);
                self.sample_disk(sink, &mut report);
            }
            Err(err) => {
                error!(root = %self.root.display(), error = %err, "error reading root folder");
                count_error(sink, &mut report);
            }
        }

        report.duration = start.elapsed();
        sink.observe_histogram(SCAN_DURATION_SECONDS, report.duration.as_secs_f64());
        sink.inc_counter(SCAN_TOTAL);

        debug!(
            root = %self.root.display(),
            elapsed_ms = report.duration.as_millis() as u64,
            subfolders = report.subfolders_published,
            errors = report.errors,
            "scan cycle finished"
        );

        self.state = ScanState::Idle;
        debug!(state = ?self.state, "orchestrator ready");
        report
    }

    fn scan_subfolders(
        &self,
        subfolders: &[PathBuf],
        sink: &dyn MetricsSink,
        report: &mut CycleReport,
    ) {
        for subfolder in subfolders {
            match self.aggregator.aggregate(subfolder) {
                Ok(stat) => {
                    stat.publish(sink);
                    report.subfolders_published += 1;
                }
                Err(err) => {
                    warn!(
                        subfolder = %subfolder.display(),
                        entry = ?err.path(),
                        error = %err,
                        "error scanning subfolder"
                    );
                    count_error(sink, report);
                    report.subfolders_failed += 1;
                }
            }
        }
    }

    fn report_files(&mut self, sink: &dyn MetricsSink, report: &mut CycleReport) {
        let summary = self.reporter.report(&self.root, sink);
        report.files_observed = summary.observed;
        report.files_retracted = summary.retracted;
        report.errors += summary.errors;
    }

    fn sample_disk(&self, sink: &dyn MetricsSink, report: &mut CycleReport) {
        match self.sampler.sample(&self.disk_path) {
            Ok(sample) => {
                sample.publish(sink);
                report.disk = Some(sample);
            }
            Err(err) => {
                warn!(path = %self.disk_path.display(), error = %err, "error getting disk stats");
                count_error(sink, report);
            }
        }
    }
}

/// Immediate child directories of `root`, sorted by name.
///
/// Symlinks to directories are not followed.
fn list_subfolders(root: &Path) -> Result<Vec<PathBuf>, ScanError> {
    let mut subfolders = Vec::new();
    for entry in std::fs::read_dir(root).map_err(|e| ScanError::io(root, e))? {
        let entry = entry.map_err(|e| ScanError::io(root, e))?;
        let file_type = entry.file_type().map_err(|e| ScanError::io(entry.path(), e))?;
        if file_type.is_dir() {
            subfolders.push(entry.path());
        }
    }
    subfolders.sort();
    Ok(subfolders)
}

fn count_error(sink: &dyn MetricsSink, report: &mut CycleReport) {
    sink.inc_counter(SCAN_ERRORS_TOTAL);
    report.errors += 1;
}
