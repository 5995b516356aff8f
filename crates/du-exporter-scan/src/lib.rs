//! Scan-and-aggregate engine for du-exporter.
//!
//! # Overview
//!
//! `du-exporter-scan` turns a watched directory into metric observations.
//! One [`ScanOrchestrator::run_cycle`] call:
//!
//! - **Resets** every subfolder series in the sink
//! - **Aggregates** each immediate subfolder into file count, total size
//!   and newest/oldest modification time
//! - **Reports** the size of every file matched by the configured globs
//! - **Samples** capacity of the filesystem holding the disk path
//! - **Records** the cycle duration and count
//!
//! Failures are logged and counted in `du_scan_errors_total`; they never
//! abort the cycle as a whole.
//!
//! # Example
//!
//! ```rust,no_run
//! use du_exporter_scan::{MetricsRegistry, ScanOrchestrator};
//!
//! let registry = MetricsRegistry::new();
//! let mut orchestrator = ScanOrchestrator::new("/srv/watched", "/srv/watched", &["**/*.db"]);
//! let report = orchestrator.run_cycle(&registry);
//!
//! println!("{} subfolders in {:?}", report.subfolders_published, report.duration);
//! print!("{}", registry.render());
//! ```

mod aggregate;
mod cycle;
mod disk;
mod glob;
mod report;
mod walk;

pub use aggregate::SubfolderAggregator;
pub use cycle::ScanOrchestrator;
pub use disk::{DiskSampler, sample_from_blocks};
pub use glob::GlobMatcher;
pub use report::{FileSizeReporter, ReportSummary};
pub use walk::{FileEntry, relative_slash_path, walk_abort_on_error, walk_continue_on_error};

// Re-export core types for convenience
pub use du_exporter_core::{
    CycleReport, DiskSample, ExporterConfig, FileObservation, MetricsRegistry, MetricsSink,
    ScanError, SubfolderStat,
};
