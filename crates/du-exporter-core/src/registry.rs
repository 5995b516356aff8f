//! In-memory metrics registry with text exposition.

use std::collections::BTreeMap;
use std::fmt::Write;

use dashmap::DashMap;
use serde::Serialize;

use crate::metrics::{DEFAULT_BUCKETS, METRICS, MetricDesc, MetricKind, MetricsSink};

/// Thread-safe store for gauges, counters and histograms.
///
/// Scan cycles write through [`MetricsSink`]; the HTTP responder reads
/// through [`MetricsRegistry::render`]. Readers never block the writer for
/// longer than a single shard lock, so a render taken mid-cycle can see
/// some series already reset and others not yet repopulated.
#[derive(Debug)]
pub struct MetricsRegistry {
    gauges: DashMap<String, DashMap<String, f64>>,
    counters: DashMap<String, u64>,
    histograms: DashMap<String, Histogram>,
}

#[derive(Debug, Clone)]
struct Histogram {
    bounds: Vec<f64>,
    counts: Vec<u64>,
    sum: f64,
    count: u64,
}

impl Histogram {
    fn new(bounds: &[f64]) -> Self {
        Self {
            bounds: bounds.to_vec(),
            counts: vec![0; bounds.len()],
            sum: 0.0,
            count: 0,
        }
    }

    fn observe(&mut self, value: f64) {
        if let Some(idx) = self.bounds.iter().position(|b| value <= *b) {
            self.counts[idx] += 1;
        }
        self.sum += value;
        self.count += 1;
    }

    fn snapshot(&self) -> HistogramSnapshot {
        let mut cumulative = 0;
        let buckets = self
            .bounds
            .iter()
            .zip(&self.counts)
            .map(|(bound, n)| {
                cumulative += n;
                (*bound, cumulative)
            })
            .collect();
        HistogramSnapshot {
            buckets,
            sum: self.sum,
            count: self.count,
        }
    }
}

/// Point-in-time copy of a histogram.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramSnapshot {
    /// `(upper bound, cumulative count)` pairs, excluding `+Inf`.
    pub buckets: Vec<(f64, u64)>,
    pub sum: f64,
    pub count: u64,
}

/// Point-in-time copy of the whole registry.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RegistrySnapshot {
    pub gauges: BTreeMap<String, BTreeMap<String, f64>>,
    pub counters: BTreeMap<String, u64>,
    pub histograms: BTreeMap<String, HistogramSnapshot>,
}

impl MetricsRegistry {
    /// Create a registry with every known counter and histogram at zero.
    pub fn new() -> Self {
        let registry = Self {
            gauges: DashMap::new(),
            counters: DashMap::new(),
            histograms: DashMap::new(),
        };
        for desc in METRICS {
            match desc.kind {
                MetricKind::Gauge => {}
                MetricKind::Counter => {
                    registry.counters.insert(desc.name.to_string(), 0);
                }
                MetricKind::Histogram => {
                    registry
                        .histograms
                        .insert(desc.name.to_string(), Histogram::new(&DEFAULT_BUCKETS));
                }
            }
        }
        registry
    }

    /// Current value of a labeled gauge.
    pub fn gauge(&self, name: &str, label: &str) -> Option<f64> {
        self.gauges
            .get(name)
            .and_then(|family| family.get(label).map(|v| *v))
    }

    /// Sorted labels currently present for a gauge family.
    pub fn labels(&self, name: &str) -> Vec<String> {
        let mut labels: Vec<String> = self
            .gauges
            .get(name)
            .map(|family| family.iter().map(|e| e.key().clone()).collect())
            .unwrap_or_default();
        labels.sort();
        labels
    }

    /// Current value of a counter.
    pub fn counter(&self, name: &str) -> u64 {
        self.counters.get(name).map(|v| *v).unwrap_or(0)
    }

    /// Snapshot of a histogram, if it has been registered or observed.
    pub fn histogram(&self, name: &str) -> Option<HistogramSnapshot> {
        self.histograms.get(name).map(|h| h.snapshot())
    }

    /// Number of observations recorded in a histogram.
    pub fn histogram_count(&self, name: &str) -> u64 {
        self.histograms.get(name).map(|h| h.count).unwrap_or(0)
    }

    /// Copy every series into ordered maps.
    pub fn snapshot(&self) -> RegistrySnapshot {
        let gauges = self
            .gauges
            .iter()
            .filter(|family| !family.is_empty())
            .map(|family| {
                let series = family
                    .iter()
                    .map(|e| (e.key().clone(), *e.value()))
                    .collect();
                (family.key().clone(), series)
            })
            .collect();
        let counters = self
            .counters
            .iter()
            .map(|e| (e.key().clone(), *e.value()))
            .collect();
        let histograms = self
            .histograms
            .iter()
            .map(|e| (e.key().clone(), e.value().snapshot()))
            .collect();

        RegistrySnapshot {
            gauges,
            counters,
            histograms,
        }
    }

    /// Render every family in the Prometheus text exposition format.
    pub fn render(&self) -> String {
        let snapshot = self.snapshot();
        let mut out = String::new();

        let mut unknown: Vec<&str> = snapshot
            .gauges
            .keys()
            .chain(snapshot.counters.keys())
            .chain(snapshot.histograms.keys())
            .map(String::as_str)
            .filter(|name| MetricDesc::find(name).is_none())
            .collect();
        unknown.sort_unstable();
        unknown.dedup();

        let mut names: Vec<&str> = METRICS.iter().map(|d| d.name).collect();
        names.extend(unknown);

        for name in names {
            let desc = MetricDesc::find(name);
            if let Some(series) = snapshot.gauges.get(name) {
                let label_key = desc.and_then(|d| d.label).unwrap_or("label");
                write_header(&mut out, name, desc, MetricKind::Gauge);
                for (label, value) in series {
                    let _ = writeln!(
                        out,
                        "{name}{{{label_key}=\"{}\"}} {}",
                        escape_label(label),
                        format_value(*value)
                    );
                }
            } else if let Some(value) = snapshot.counters.get(name) {
                write_header(&mut out, name, desc, MetricKind::Counter);
                let _ = writeln!(out, "{name} {value}");
            } else if let Some(hist) = snapshot.histograms.get(name) {
                write_header(&mut out, name, desc, MetricKind::Histogram);
                for (bound, count) in &hist.buckets {
                    let _ = writeln!(out, "{name}_bucket{{le=\"{}\"}} {count}", format_value(*bound));
                }
                let _ = writeln!(out, "{name}_bucket{{le=\"+Inf\"}} {}", hist.count);
                let _ = writeln!(out, "{name}_sum {}", format_value(hist.sum));
                let _ = writeln!(out, "{name}_count {}", hist.count);
            }
        }

        out
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsSink for MetricsRegistry {
    fn set_gauge(&self, name: &str, label: &str, value: f64) {
        self.gauges
            .entry(name.to_string())
            .or_default()
            .insert(label.to_string(), value);
    }

    fn reset_gauge(&self, name: &str) {
        if let Some(family) = self.gauges.get(name) {
            family.clear();
        }
    }

    fn remove_gauge(&self, name: &str, label: &str) {
        if let Some(family) = self.gauges.get(name) {
            family.remove(label);
        }
    }

    fn inc_counter(&self, name: &str) {
        *self.counters.entry(name.to_string()).or_insert(0) += 1;
    }

    fn observe_histogram(&self, name: &str, value: f64) {
        self.histograms
            .entry(name.to_string())
            .or_insert_with(|| Histogram::new(&DEFAULT_BUCKETS))
            .observe(value);
    }
}

fn write_header(out: &mut String, name: &str, desc: Option<&MetricDesc>, fallback: MetricKind) {
    let (help, kind) = desc.map_or(("", fallback), |d| (d.help, d.kind));
    let _ = writeln!(out, "# HELP {name} {help}");
    let _ = writeln!(out, "# TYPE {name} {}", kind.as_str());
}

fn escape_label(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            c => escaped.push(c),
        }
    }
    escaped
}

fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value == f64::INFINITY {
        "+Inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{
        DISK_FREE_PERCENT, FILE_SIZE_BYTES, SCAN_DURATION_SECONDS, SCAN_ERRORS_TOTAL, SCAN_TOTAL,
        SUBFOLDER_FILE_COUNT,
    };

    #[test]
    fn test_gauge_set_and_reset() {
        let registry = MetricsRegistry::new();
        registry.set_gauge(SUBFOLDER_FILE_COUNT, "a", 2.0);
        registry.set_gauge(SUBFOLDER_FILE_COUNT, "b", 0.0);
        registry.set_gauge(SUBFOLDER_FILE_COUNT, "a", 3.0);

        assert_eq!(registry.gauge(SUBFOLDER_FILE_COUNT, "a"), Some(3.0));
        assert_eq!(registry.labels(SUBFOLDER_FILE_COUNT), vec!["a", "b"]);

        registry.reset_gauge(SUBFOLDER_FILE_COUNT);
        assert!(registry.labels(SUBFOLDER_FILE_COUNT).is_empty());
        assert_eq!(registry.gauge(SUBFOLDER_FILE_COUNT, "a"), None);
    }

    #[test]
    fn test_remove_gauge() {
        let registry = MetricsRegistry::new();
        registry.set_gauge(FILE_SIZE_BYTES, "x/y.db", 5.0);
        registry.set_gauge(FILE_SIZE_BYTES, "x/z.db", 7.0);
        registry.remove_gauge(FILE_SIZE_BYTES, "x/y.db");
        registry.remove_gauge("du_missing", "x");

        assert_eq!(registry.labels(FILE_SIZE_BYTES), vec!["x/z.db"]);
    }

    #[test]
    fn test_counters_start_at_zero() {
        let registry = MetricsRegistry::new();
        assert_eq!(registry.counter(SCAN_TOTAL), 0);

        registry.inc_counter(SCAN_TOTAL);
        registry.inc_counter(SCAN_TOTAL);
        registry.inc_counter(SCAN_ERRORS_TOTAL);

        assert_eq!(registry.counter(SCAN_TOTAL), 2);
        assert_eq!(registry.counter(SCAN_ERRORS_TOTAL), 1);
    }

    #[test]
    fn test_histogram_buckets_are_cumulative() {
        let registry = MetricsRegistry::new();
        registry.observe_histogram(SCAN_DURATION_SECONDS, 0.003);
        registry.observe_histogram(SCAN_DURATION_SECONDS, 0.2);
        registry.observe_histogram(SCAN_DURATION_SECONDS, 42.0);

        let hist = registry.histogram(SCAN_DURATION_SECONDS).unwrap();
        assert_eq!(hist.count, 3);
        assert_eq!(hist.buckets[0], (0.005, 1));
        assert_eq!(hist.buckets[5], (0.25, 2));
        assert_eq!(hist.buckets.last(), Some(&(10.0, 2)));
    }

    #[test]
    fn test_render_exposition() {
        let registry = MetricsRegistry::new();
        registry.set_gauge(SUBFOLDER_FILE_COUNT, "a", 2.0);
        registry.set_gauge(DISK_FREE_PERCENT, "/data", 25.0);
        registry.inc_counter(SCAN_TOTAL);
        registry.observe_histogram(SCAN_DURATION_SECONDS, 0.5);

        let text = registry.render();
        assert!(text.contains("# TYPE du_subfolder_file_count gauge"));
        assert!(text.contains("du_subfolder_file_count{folder=\"a\"} 2\n"));
        assert!(text.contains("du_disk_free_percent{path=\"/data\"} 25\n"));
        assert!(text.contains("du_scan_total 1\n"));
        assert!(text.contains("du_scan_errors_total 0\n"));
        assert!(text.contains("du_scan_duration_seconds_bucket{le=\"0.5\"} 1\n"));
        assert!(text.contains("du_scan_duration_seconds_bucket{le=\"+Inf\"} 1\n"));
        assert!(text.contains("du_scan_duration_seconds_count 1\n"));

        // Empty gauge families are not rendered.
        assert!(!text.contains("du_file_size_bytes"));
    }

    #[test]
    fn test_label_escaping() {
        let registry = MetricsRegistry::new();
        registry.set_gauge(FILE_SIZE_BYTES, "we\"ird\\na\nme", 1.0);

        let text = registry.render();
        assert!(text.contains(r#"du_file_size_bytes{path="we\"ird\\na\nme"} 1"#));
    }

    #[test]
    fn test_concurrent_reads_during_writes() {
        let registry = std::sync::Arc::new(MetricsRegistry::new());
        let writer = {
            let registry = registry.clone();
            std::thread::spawn(move || {
                for i in 0..500 {
                    registry.reset_gauge(SUBFOLDER_FILE_COUNT);
                    registry.set_gauge(SUBFOLDER_FILE_COUNT, &format!("d{}", i % 7), i as f64);
                }
            })
        };
        for _ in 0..100 {
            let _ = registry.render();
        }
        writer.join().unwrap();
        assert!(registry.labels(SUBFOLDER_FILE_COUNT).len() <= 1);
    }
}
