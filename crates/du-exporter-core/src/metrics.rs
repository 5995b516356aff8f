//! Metric descriptors and the sink the scan engine writes into.

use serde::Serialize;

pub const SUBFOLDER_FILE_COUNT: &str = "du_subfolder_file_count";
pub const SUBFOLDER_TOTAL_SIZE: &str = "du_subfolder_total_size_bytes";
pub const SUBFOLDER_NEWEST_MTIME: &str = "du_subfolder_newest_mtime_seconds";
pub const SUBFOLDER_OLDEST_MTIME: &str = "du_subfolder_oldest_mtime_seconds";
pub const FILE_SIZE_BYTES: &str = "du_file_size_bytes";
pub const DISK_TOTAL_BYTES: &str = "du_disk_total_bytes";
pub const DISK_USED_BYTES: &str = "du_disk_used_bytes";
pub const DISK_FREE_PERCENT: &str = "du_disk_free_percent";
pub const SCAN_DURATION_SECONDS: &str = "du_scan_duration_seconds";
pub const SCAN_TOTAL: &str = "du_scan_total";
pub const SCAN_ERRORS_TOTAL: &str = "du_scan_errors_total";

/// Histogram bucket upper bounds, in seconds.
pub const DEFAULT_BUCKETS: [f64; 11] = [0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

/// Kind of a metric family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Gauge,
    Counter,
    Histogram,
}

impl MetricKind {
    /// Name used on `# TYPE` lines.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gauge => "gauge",
            Self::Counter => "counter",
            Self::Histogram => "histogram",
        }
    }
}

/// Static description of a metric family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricDesc {
    pub name: &'static str,
    pub help: &'static str,
    pub kind: MetricKind,
    /// Label key for labeled gauges.
    pub label: Option<&'static str>,
}

/// Every family the exporter publishes.
pub const METRICS: &[MetricDesc] = &[
    MetricDesc {
        name: SUBFOLDER_FILE_COUNT,
        help: "Number of files in a subfolder",
        kind: MetricKind::Gauge,
        label: Some("folder"),
    },
    MetricDesc {
        name: SUBFOLDER_TOTAL_SIZE,
        help: "Total size of files in a subfolder (bytes)",
        kind: MetricKind::Gauge,
        label: Some("folder"),
    },
    MetricDesc {
        name: SUBFOLDER_NEWEST_MTIME,
        help: "Modification time of the newest file in a subfolder (epoch seconds)",
        kind: MetricKind::Gauge,
        label: Some("folder"),
    },
    MetricDesc {
        name: SUBFOLDER_OLDEST_MTIME,
        help: "Modification time of the oldest file in a subfolder (epoch seconds)",
        kind: MetricKind::Gauge,
        label: Some("folder"),
    },
    MetricDesc {
        name: FILE_SIZE_BYTES,
        help: "Size of a file matched by the configured globs (bytes)",
        kind: MetricKind::Gauge,
        label: Some("path"),
    },
    MetricDesc {
        name: DISK_TOTAL_BYTES,
        help: "Total bytes on the filesystem of a path",
        kind: MetricKind::Gauge,
        label: Some("path"),
    },
    MetricDesc {
        name: DISK_USED_BYTES,
        help: "Used bytes on the filesystem of a path",
        kind: MetricKind::Gauge,
        label: Some("path"),
    },
    MetricDesc {
        name: DISK_FREE_PERCENT,
        help: "Percentage of free space on the filesystem of a path",
        kind: MetricKind::Gauge,
        label: Some("path"),
    },
    MetricDesc {
        name: SCAN_DURATION_SECONDS,
        help: "Duration of the folder scan in seconds",
        kind: MetricKind::Histogram,
        label: None,
    },
    MetricDesc {
        name: SCAN_TOTAL,
        help: "Total number of folder scans performed",
        kind: MetricKind::Counter,
        label: None,
    },
    MetricDesc {
        name: SCAN_ERRORS_TOTAL,
        help: "Total number of folder scan errors",
        kind: MetricKind::Counter,
        label: None,
    },
];

impl MetricDesc {
    /// Look up a family by name.
    pub fn find(name: &str) -> Option<&'static MetricDesc> {
        METRICS.iter().find(|desc| desc.name == name)
    }
}

/// Destination for named, labeled numeric observations.
///
/// Writes are last-write-wins per series. Implementations must allow
/// concurrent reads while a scan cycle is writing.
pub trait MetricsSink: Send + Sync {
    /// Set one labeled gauge series.
    fn set_gauge(&self, name: &str, label: &str, value: f64);

    /// Drop every series of a gauge family.
    fn reset_gauge(&self, name: &str);

    /// Drop one labeled gauge series.
    fn remove_gauge(&self, name: &str, label: &str);

    /// Add one to a counter.
    fn inc_counter(&self, name: &str);

    /// Record a value into a histogram.
    fn observe_histogram(&self, name: &str, value: f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_lookup() {
        let desc = MetricDesc::find(SUBFOLDER_FILE_COUNT).unwrap();
        assert_eq!(desc.kind, MetricKind::Gauge);
        assert_eq!(desc.label, Some("folder"));

        assert_eq!(MetricDesc::find(SCAN_TOTAL).unwrap().kind.as_str(), "counter");
        assert!(MetricDesc::find("du_nope").is_none());
    }

    #[test]
    fn test_names_unique() {
        for (i, a) in METRICS.iter().enumerate() {
            assert!(METRICS[i + 1..].iter().all(|b| b.name != a.name), "{}", a.name);
        }
    }
}
