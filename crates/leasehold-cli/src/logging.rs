//! Logging setup for the CLI
//!
//! Console output goes to stderr so command output on stdout stays
//! machine-readable. Setting `LEASEHOLD_LOG_DIR` adds a daily rolling
//! `leasehold.log` file in that directory.

use std::path::PathBuf;

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

/// Environment variable enabling file logging
pub const LOG_DIR_ENV: &str = "LEASEHOLD_LOG_DIR";

/// Name of the rolling log file
pub const LOG_FILE_NAME: &str = "leasehold.log";

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Level used when `RUST_LOG` is unset
    pub level: Level,
    /// Directory for the rolling log file; no file logging when unset
    pub log_dir: Option<PathBuf>,
}

impl LoggingConfig {
    /// Build from the `--log-level` flag and `LEASEHOLD_LOG_DIR`
    pub fn from_env(level: &str) -> Self {
        Self {
            level: level.parse().unwrap_or(Level::WARN),
            log_dir: std::env::var_os(LOG_DIR_ENV).map(PathBuf::from),
        }
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.level.to_string()))
    }
}

/// Keeps the file writer alive; buffered lines are flushed on drop
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<LoggingGuard> {
    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_filter(config.filter());
    layers.push(Box::new(console_layer));

    let mut file_guard = None;
    if let Some(log_dir) = &config.log_dir {
        std::fs::create_dir_all(log_dir)?;
        let appender = RollingFileAppender::new(Rotation::DAILY, log_dir, LOG_FILE_NAME);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        file_guard = Some(guard);

        let file_layer = fmt::layer()
            .with_writer(writer)
            .with_target(true)
            .with_thread_names(true)
            .with_ansi(false)
            .with_filter(config.filter());
        layers.push(Box::new(file_layer));
    }

    Registry::default()
        .with(layers)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {e}"))?;

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}
