//! Exporter configuration types.

use std::path::{Path, PathBuf};
use std::time::Duration;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::error::ScanError;

/// Configuration for the exporter and its scan cycles.
#[derive(Debug, Clone, PartialEq, Eq, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct ExporterConfig {
    /// Root folder whose immediate subfolders are aggregated.
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Path whose filesystem is sampled for capacity (None = root).
    #[builder(default)]
    #[serde(default)]
    pub disk_path: Option<PathBuf>,

    /// Glob patterns selecting files to report individually.
    #[builder(default)]
    #[serde(default)]
    pub globs: Vec<String>,

    /// Seconds to wait between the end of one cycle and the next.
    #[builder(default = "300")]
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Address the HTTP responder binds to.
    #[builder(default = "default_listen()")]
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Port the HTTP responder binds to.
    #[builder(default = "8080")]
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_root() -> PathBuf {
    PathBuf::from("./watched")
}

fn default_interval_secs() -> u64 {
    300
}

fn default_listen() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl ExporterConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        match self.root {
            Some(ref root) if root.as_os_str().is_empty() => {
                return Err("Root path cannot be empty".to_string());
            }
            Some(_) => {}
            None => return Err("Root path is required".to_string()),
        }
        if self.interval_secs == Some(0) {
            return Err("Scan interval must be at least one second".to_string());
        }
        Ok(())
    }
}

impl ExporterConfig {
    /// Create a new config builder.
    pub fn builder() -> ExporterConfigBuilder {
        ExporterConfigBuilder::default()
    }

    /// Create a config watching `root` with default settings.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            disk_path: None,
            globs: Vec::new(),
            interval_secs: default_interval_secs(),
            listen: default_listen(),
            port: default_port(),
        }
    }

    /// Load a config from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ScanError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| ScanError::io(path, e))?;
        let config: Self = serde_json::from_str(&raw).map_err(|e| ScanError::InvalidConfig {
            message: format!("{}: {e}", path.display()),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check the invariants the builder enforces.
    pub fn validate(&self) -> Result<(), ScanError> {
        if self.root.as_os_str().is_empty() {
            return Err(ScanError::InvalidConfig {
                message: "Root path cannot be empty".to_string(),
            });
        }
        if self.interval_secs == 0 {
            return Err(ScanError::InvalidConfig {
                message: "Scan interval must be at least one second".to_string(),
            });
        }
        Ok(())
    }

    /// Path whose filesystem is sampled for capacity.
    pub fn disk_path(&self) -> &Path {
        self.disk_path.as_deref().unwrap_or(&self.root)
    }

    /// Delay between cycles.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// `listen:port` socket address string.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.listen, self.port)
    }
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self::new(default_root())
    }
}
