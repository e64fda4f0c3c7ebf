use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use std::fs;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

/// How and where to log
#[derive(Debug, Clone)]
pub struct LoggingOptions {
    /// Directory for log files (e.g., "logs")
    pub log_dir: Utf8PathBuf,
    /// Prefix for log files (e.g., "pagesmith")
    pub prefix: String,
    /// Use debug level instead of info
    pub debug: bool,
    /// Also log to stderr
    pub console: bool,
    /// Write the file log as JSON lines
    pub json: bool,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            log_dir: Utf8PathBuf::from("logs"),
            prefix: "pagesmith".to_string(),
            debug: false,
            console: true,
            json: false,
        }
    }
}

impl LoggingOptions {
    /// Default filter when `RUST_LOG` is not set
    fn default_directive(&self) -> &'static str {
        if self.debug { "debug" } else { "info" }
    }
}

/// Setup logging with a daily rotating file appender and optional console
/// output.
///
/// `RUST_LOG` takes precedence over the debug flag.
///
/// # Returns
/// A guard that must be held for the duration of the program to keep logging active
pub fn setup_logging(options: &LoggingOptions) -> Result<WorkerGuard> {
    ensure_log_dir(options)?;

    let file_appender = rolling::daily(&options.log_dir, &options.prefix);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(options.default_directive()));

    let file_layer = if options.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(non_blocking)
            .with_target(true)
            .with_thread_ids(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false) // No ANSI codes in log files
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed()
    };

    let console_layer = options.console.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .with_target(false)
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .context("Failed to install the global tracing subscriber")?;

    tracing::info!(
        "Logging initialized: dir={}, prefix={}, debug={}, console={}, json={}",
        options.log_dir,
        options.prefix,
        options.debug,
        options.console,
        options.json
    );

    Ok(guard)
}

fn ensure_log_dir(options: &LoggingOptions) -> Result<()> {
    if !options.log_dir.exists() {
        fs::create_dir_all(&options.log_dir)
            .with_context(|| format!("Failed to create log directory: {}", options.log_dir))?;
    }
    Ok(())
}
