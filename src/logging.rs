//! Console and rolling-file logging for sheetstore.
//!
//! Call [`init`] once at startup, then use the `tracing` macros anywhere.
//! Three outputs are installed:
//!
//! - a pretty console layer,
//! - `sheetstore.<date>.log` with everything the filter lets through,
//! - `error.<date>.log` with warnings and errors only.
//!
//! Files rotate daily under the platform data directory and the ten most
//! recent are kept.
//!
//! ```no_run
//! sheetstore::logging::init("info").expect("Failed to initialize logging");
//! tracing::info!("Store ready");
//! ```

use anyhow::{Context as _, Result};
use std::path::{Path, PathBuf};
use tracing::Subscriber;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    EnvFilter, Layer, fmt, layer::SubscriberExt as _, registry::LookupSpan,
    util::SubscriberInitExt as _,
};

const APP_DIR: &str = "sheetstore";
const MAX_LOG_FILES: usize = 10;

/// Log directory, created on first use.
///
/// - Linux: `~/.local/share/sheetstore/logs`
/// - macOS: `~/Library/Application Support/sheetstore/logs`
/// - Windows: `%APPDATA%/sheetstore/logs`
pub fn get_log_dir() -> Result<PathBuf> {
    let base_dir = dirs::data_dir().context("Failed to determine data directory")?;
    let log_dir = base_dir.join(APP_DIR).join("logs");

    if !log_dir.exists() {
        std::fs::create_dir_all(&log_dir)
            .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;
    }

    Ok(log_dir)
}

fn daily_appender(log_dir: &Path, prefix: &str) -> Result<RollingFileAppender> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .max_log_files(MAX_LOG_FILES)
        .filename_prefix(prefix)
        .filename_suffix("log")
        .build(log_dir)
        .with_context(|| format!("Failed to create '{prefix}' file appender"))
}

fn env_filter(default_level: &str) -> Result<EnvFilter> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .context("Failed to create env filter")
}

// Console output goes to stderr so JSON printed on stdout stays parseable.
fn console_layer<S>() -> impl Layer<S>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fmt::layer()
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_writer(std::io::stderr)
        .pretty()
}

/// Installs the global subscriber.
///
/// `default_level` applies when `RUST_LOG` is unset.
///
/// # Errors
///
/// Fails when the log directory or an appender cannot be created. Nothing is
/// installed in that case, so callers can fall back to [`init_console`].
pub fn init(default_level: &str) -> Result<()> {
    let log_dir = get_log_dir()?;
    let all_logs_appender = daily_appender(&log_dir, APP_DIR)?;
    let error_logs_appender = daily_appender(&log_dir, "error")?;

    let all_logs_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_ansi(false)
        .with_writer(all_logs_appender);

    let error_logs_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(false)
        .with_writer(error_logs_appender)
        .with_filter(EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(env_filter(default_level)?)
        .with(console_layer())
        .with(all_logs_layer)
        .with(error_logs_layer)
        .try_init()
        .context("Logging already initialized")?;

    tracing::debug!("Logging initialized, log directory: {}", log_dir.display());
    Ok(())
}

/// Installs only the console layer. Used when the log files are unavailable.
pub fn init_console(default_level: &str) -> Result<()> {
    tracing_subscriber::registry()
        .with(env_filter(default_level)?)
        .with(console_layer())
        .try_init()
        .context("Logging already initialized")
}
