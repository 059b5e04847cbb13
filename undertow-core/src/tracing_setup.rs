//! Tracing setup for Undertow
//!
//! Console output stays at a user-chosen level for Undertow's own crates and
//! at `warn` for everything else. A per-run file captures every event at
//! `trace`, so short reads and readiness timeouts can be diagnosed after the
//! fact.

use std::fs::{File, create_dir_all};
use std::path::Path;

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

/// Name of the per-run debug log inside the logs directory.
pub const LOG_FILE_NAME: &str = "undertow-last-run.log";

/// Tracing targets emitted by this workspace.
const UNDERTOW_TARGETS: [&str; 3] = ["undertow_core", "undertow_sim", "undertow"];

/// Builds the console filter directive for `level`.
pub fn console_directive(level: Level) -> String {
    let level = level.as_str().to_ascii_lowercase();
    let mut directive = String::from("warn");
    for target in UNDERTOW_TARGETS {
        directive.push_str(&format!(",{target}={level}"));
    }
    directive
}

/// Installs the global subscriber: console on stderr plus a trace file.
///
/// The file is `<logs_dir>/undertow-last-run.log` (default `./logs`) and is
/// truncated on every run. `RUST_LOG` replaces the console directive.
///
/// # Errors
///
/// - `Box<dyn std::error::Error>` - Logs directory or file unavailable, or a global subscriber is already installed
pub fn init_tracing(
    console_level: Level,
    logs_dir: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let logs_path = logs_dir.unwrap_or_else(|| Path::new("logs"));
    create_dir_all(logs_path)?;

    let log_file_path = logs_path.join(LOG_FILE_NAME);
    let log_file = File::create(&log_file_path)?;

    let console_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(console_directive(console_level))?,
    };

    let console_layer = fmt::layer()
        .compact()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(console_filter);

    let file_layer = fmt::layer()
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false)
        .with_writer(log_file)
        .with_filter(EnvFilter::new("trace"));

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    tracing::debug!(
        console = %console_level,
        log_file = %log_file_path.display(),
        "Tracing initialized"
    );
    Ok(())
}

/// Console verbosity accepted by `--log-level`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CliLogLevel {
    Error,
    Warn,
    /// Opens, closes and gate transitions
    Info,
    /// Resolution, selection and short reads
    Debug,
    /// Every stream chunk
    Trace,
}

impl From<CliLogLevel> for Level {
    fn from(level: CliLogLevel) -> Self {
        match level {
            CliLogLevel::Error => Level::ERROR,
            CliLogLevel::Warn => Level::WARN,
            CliLogLevel::Info => Level::INFO,
            CliLogLevel::Debug => Level::DEBUG,
            CliLogLevel::Trace => Level::TRACE,
        }
    }
}

impl std::fmt::Display for CliLogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&Level::from(*self).as_str().to_ascii_lowercase())
    }
}
