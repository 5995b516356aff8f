//! Core types and traits for du-exporter.
//!
//! This crate provides the data model produced by a scan cycle, the
//! exporter configuration, error types, and the metrics sink the scan
//! engine writes into.

mod config;
mod error;
mod metrics;
mod registry;
mod stats;

pub use config::{ExporterConfig, ExporterConfigBuilder};
pub use error::ScanError;
pub use metrics::{MetricDesc, MetricKind, MetricsSink, DEFAULT_BUCKETS, METRICS};
pub use registry::{HistogramSnapshot, MetricsRegistry, RegistrySnapshot};
pub use stats::{CycleReport, DiskSample, FileObservation, SubfolderStat, SubfolderTally};

/// Metric names published by the scan engine.
pub mod names {
    pub use crate::metrics::{
        DISK_FREE_PERCENT, DISK_TOTAL_BYTES, DISK_USED_BYTES, FILE_SIZE_BYTES,
        SCAN_DURATION_SECONDS, SCAN_ERRORS_TOTAL, SCAN_TOTAL, SUBFOLDER_FILE_COUNT,
        SUBFOLDER_NEWEST_MTIME, SUBFOLDER_OLDEST_MTIME, SUBFOLDER_TOTAL_SIZE,
    };
}
