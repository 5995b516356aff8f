//! du-exporter - Expose disk usage metrics for a watched directory.
//!
//! Usage:
//!   du-exporter [OPTIONS]            Serve /metrics and /healthz, scanning on an interval
//!   du-exporter [OPTIONS] scan       Run a single scan cycle and print the metrics
//!   du-exporter --help               Show help

mod server;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Context, Result, eyre};
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use du_exporter_scan::{CycleReport, ExporterConfig, MetricsRegistry, ScanOrchestrator};

#[derive(Parser)]
#[command(
    name = "du-exporter",
    version,
    about = "Expose Prometheus metrics for files in subfolders",
    long_about = "du-exporter periodically walks a watched folder and publishes, per \
                  immediate subfolder, the file count, total size and newest/oldest \
                  modification times, plus the sizes of files matching the configured \
                  globs and the capacity of the underlying filesystem."
)]
struct Cli {
    /// Root folder to watch for files [default: ./watched]
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Scan interval in seconds [default: 300]
    #[arg(long, global = true)]
    interval: Option<u64>,

    /// Port to start the server on [default: 8080]
    #[arg(long, global = true)]
    port: Option<u16>,

    /// Address to bind the server to [default: 0.0.0.0]
    #[arg(long, global = true)]
    listen: Option<String>,

    /// Glob selecting files whose size is reported (repeatable)
    #[arg(long = "glob", global = true)]
    globs: Vec<String>,

    /// Path whose filesystem capacity is reported [default: root]
    #[arg(long, global = true)]
    disk_path: Option<PathBuf>,

    /// JSON config file; command line flags override its values
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log filter, e.g. "info" or "du_exporter_scan=debug" [default: $RUST_LOG or info]
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve metrics over HTTP, scanning on an interval (default)
    Serve,

    /// Run one scan cycle and print the resulting metrics
    Scan {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref())?;

    let config = build_config(&cli)?;

    match cli.command {
        Some(Command::Scan { format }) => run_scan(&config, format),
        Some(Command::Serve) | None => {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("Failed to start async runtime")?;
            runtime.block_on(run_service(config))
        }
    }
}

/// Install the tracing subscriber.
fn init_logging(level: Option<&str>) -> Result<()> {
    let filter = match level {
        Some(level) => EnvFilter::try_new(level).context("Invalid log filter")?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

/// Merge the optional config file with command line overrides.
fn build_config(cli: &Cli) -> Result<ExporterConfig> {
    let mut config = match &cli.config {
        Some(path) => ExporterConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ExporterConfig::default(),
    };

    if let Some(root) = &cli.root {
        config.root = root.clone();
    }
    if let Some(interval) = cli.interval {
        config.interval_secs = interval;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(listen) = &cli.listen {
        config.listen = listen.clone();
    }
    if !cli.globs.is_empty() {
        config.globs = cli.globs.clone();
    }
    if let Some(disk_path) = &cli.disk_path {
        config.disk_path = Some(disk_path.clone());
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Run the scan scheduler and the HTTP responder until Ctrl-C.
async fn run_service(config: ExporterConfig) -> Result<()> {
    info!(
        root = %config.root.display(),
        interval_secs = config.interval_secs,
        globs = ?config.globs,
        "Starting service"
    );

    let registry = Arc::new(MetricsRegistry::new());
    let listener = TcpListener::bind(config.bind_addr())
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr()))?;
    info!(addr = %listener.local_addr()?, "Started HTTP server");

    let orchestrator = ScanOrchestrator::from_config(&config);
    let scheduler = tokio::spawn(run_scheduler(orchestrator, registry.clone(), config.interval()));

    tokio::select! {
        res = server::serve(listener, registry) => {
            res.context("HTTP server failed")?;
        }
        _ = scheduler => {
            return Err(eyre!("Scan scheduler stopped"));
        }
        res = tokio::signal::ctrl_c() => {
            res.context("Failed to listen for Ctrl-C")?;
            info!("Shutting down");
        }
    }

    Ok(())
}

/// Run cycles back to back, sleeping `interval` after each one returns.
async fn run_scheduler(
    mut orchestrator: ScanOrchestrator,
    registry: Arc<MetricsRegistry>,
    interval: Duration,
) {
    loop {
        let sink = registry.clone();
        let cycle = tokio::task::spawn_blocking(move || {
            let report = orchestrator.run_cycle(sink.as_ref());
            (orchestrator, report)
        });

        orchestrator = match cycle.await {
            Ok((orchestrator, report)) => {
                log_cycle(&report);
                orchestrator
            }
            Err(err) => {
                error!(error = %err, "Scan cycle aborted");
                return;
            }
        };

        tokio::time::sleep(interval).await;
    }
}

fn log_cycle(report: &CycleReport) {
    let disk = report.disk.as_ref().map(|d| {
        format!(
            "{} free of {} ({:.1}%)",
            format_size(d.free()),
            format_size(d.total),
            d.free_percent
        )
    });
    info!(
        elapsed_ms = report.duration.as_millis() as u64,
        subfolders = report.subfolders_published,
        failed = report.subfolders_failed,
        files = report.files_observed,
        errors = report.errors,
        disk = disk.as_deref().unwrap_or("unavailable"),
        "Scan cycle complete"
    );
}

/// Run a single cycle and print the metrics.
fn run_scan(config: &ExporterConfig, format: OutputFormat) -> Result<()> {
    eprintln!("Scanning {}...", config.root.display());

    let registry = MetricsRegistry::new();
    let mut orchestrator = ScanOrchestrator::from_config(config);
    let report = orchestrator.run_cycle(&registry);

    match format {
        OutputFormat::Text => {
            print!("{}", registry.render());
            eprintln!(
                "Scanned {} subfolders, {} matched files in {:.2}s ({} errors)",
                report.subfolders_published,
                report.files_observed,
                report.duration.as_secs_f64(),
                report.errors
            );
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "report": report,
                "metrics": registry.snapshot(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    if report.root_listed {
        Ok(())
    } else {
        Err(eyre!("Could not read root folder {}", config.root.display()))
    }
}

/// Format size in human-readable form.
fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}
