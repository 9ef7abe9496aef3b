//! Logging setup for the batch binaries and the structured run events they emit.

use std::env;

use chrono::NaiveDate;
use thiserror::Error;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::source::SeasonWindow;

/// Output encoding for the batch binaries; JSON for the scheduler, pretty for a terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "pretty" => Some(Self::Pretty),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `info` or `gridiron=debug`.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Json,
        }
    }
}

#[derive(Debug, Error)]
pub enum LoggingInitError {
    #[error("logging already initialized: {0}")]
    AlreadyInitialized(#[from] tracing::subscriber::SetGlobalDefaultError),
}

pub fn logging_config_from_env() -> LoggingConfig {
    logging_config_from_lookup(|name| env::var(name).ok())
}

/// Reads `GRIDIRON_LOG_LEVEL` and `GRIDIRON_LOG_FORMAT` through `lookup`; blank or
/// unknown values keep the default.
pub fn logging_config_from_lookup(lookup: impl Fn(&str) -> Option<String>) -> LoggingConfig {
    let default = LoggingConfig::default();
    let level = lookup("GRIDIRON_LOG_LEVEL")
        .map(|raw| raw.trim().to_string())
        .filter(|level| !level.is_empty())
        .unwrap_or(default.level);
    let format = lookup("GRIDIRON_LOG_FORMAT")
        .and_then(|raw| LogFormat::parse(&raw))
        .unwrap_or(default.format);
    LoggingConfig { level, format }
}

pub fn init_logging(config: &LoggingConfig) -> Result<(), LoggingInitError> {
    let env_filter =
        EnvFilter::try_new(config.level.clone()).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(env_filter);

    match config.format {
        LogFormat::Json => {
            tracing::subscriber::set_global_default(builder.with_ansi(false).json().finish())?
        }
        LogFormat::Pretty => tracing::subscriber::set_global_default(builder.pretty().finish())?,
    }

    Ok(())
}

pub fn log_app_start(app: &str, config: &LoggingConfig) {
    info!(
        component = "pipeline",
        event = "app.start",
        app,
        log_level = %config.level,
        log_format = ?config.format
    );
}

pub fn log_run_start(run_date: NaiveDate, seasons: &SeasonWindow) {
    info!(
        component = "pipeline",
        event = "run.start",
        run_date = %run_date,
        first_season = seasons.first,
        end_season_exclusive = seasons.end_exclusive
    );
}

pub fn log_source_selected(source: &str, bucket: &str) {
    info!(
        component = "pipeline",
        event = "source.selected",
        source,
        bucket
    );
}

pub fn log_artifact_written(bucket: &str, key: &str, rows: usize, bytes: usize) {
    if rows == 0 {
        warn!(
            component = "pipeline",
            event = "artifact.written",
            bucket,
            key,
            rows,
            bytes,
            empty = true
        );
    } else {
        info!(
            component = "pipeline",
            event = "artifact.written",
            bucket,
            key,
            rows,
            bytes
        );
    }
}
