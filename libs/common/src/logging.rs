//! Unified logging module for the city sensor services
//!
//! Console output uses the bracketed-level format
//! `2025-12-02T00:50:44.809Z [INFO] message`; an optional daily-rolling file
//! layer writes the same format (or JSON) through a non-blocking appender.
//! The global filter is wrapped in a reload layer so the level can be changed
//! at runtime via [`set_log_level`].

use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};

use errors::{CityError, CityResult};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, format::Writer, FmtContext, FormatEvent, FormatFields},
    layer::SubscriberExt,
    registry::LookupSpan,
    reload,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// Custom format for log level with brackets: `[INFO]`, `[WARN]`, etc.
fn format_level(level: &Level) -> &'static str {
    match *level {
        Level::TRACE => "[TRACE]",
        Level::DEBUG => "[DEBUG]",
        Level::INFO => "[INFO]",
        Level::WARN => "[WARN]",
        Level::ERROR => "[ERROR]",
    }
}

/// Event formatter that outputs: `timestamp [LEVEL] message fields`
struct BracketedLevelFormat;

impl<S, N> FormatEvent<S, N> for BracketedLevelFormat
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let now = chrono::Utc::now();
        write!(writer, "{} ", now.format("%Y-%m-%dT%H:%M:%S%.3fZ"))?;

        let level = *event.metadata().level();
        if writer.has_ansi_escapes() {
            let color = match level {
                Level::TRACE => "\x1b[35m",
                Level::DEBUG => "\x1b[34m",
                Level::INFO => "\x1b[32m",
                Level::WARN => "\x1b[33m",
                Level::ERROR => "\x1b[31m",
            };
            write!(writer, "{}{}\x1b[0m ", color, format_level(&level))?;
        } else {
            write!(writer, "{} ", format_level(&level))?;
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

type EnvFilterReloadHandle = reload::Handle<EnvFilter, tracing_subscriber::Registry>;

// Keeps the non-blocking file writer flushing for the life of the process
static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();
static LOG_FILTER_HANDLE: OnceLock<EnvFilterReloadHandle> = OnceLock::new();
static CURRENT_LOG_LEVEL: OnceLock<Mutex<String>> = OnceLock::new();

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Service name, used as default filter target and file prefix
    pub service_name: String,
    /// Directory for rolling log files
    pub log_dir: PathBuf,
    /// Default level when neither `filter` nor `RUST_LOG` is set
    pub console_level: Level,
    /// Explicit filter directive (e.g. from `--log-level`), wins over `RUST_LOG`
    pub filter: Option<String>,
    /// Write a daily-rolling log file next to console output
    pub enable_file: bool,
    /// Use JSON lines for the file layer
    pub enable_json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "sensorsrv".to_string(),
            log_dir: PathBuf::from("logs"),
            console_level: Level::INFO,
            filter: None,
            enable_file: false,
            enable_json: false,
        }
    }
}

impl LogConfig {
    pub fn for_service(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            ..Default::default()
        }
    }

    /// Filter used when `RUST_LOG` is absent: `<level>,<service>=debug`
    pub fn default_filter(&self) -> String {
        let base = self.console_level.as_str().to_lowercase();
        if self.console_level < Level::DEBUG {
            // Level ordering: TRACE > DEBUG > INFO; only lift quieter levels
            format!("{},{}=debug", base, self.service_name)
        } else {
            base
        }
    }
}

/// Install the global subscriber
///
/// Fails if a global subscriber is already set or the log directory cannot
/// be created.
pub fn init_with_config(config: LogConfig) -> CityResult<()> {
    let initial_filter = match &config.filter {
        Some(filter) => filter.clone(),
        None => std::env::var("RUST_LOG").unwrap_or_else(|_| config.default_filter()),
    };
    let env_filter = EnvFilter::try_new(&initial_filter).map_err(|e| CityError::InvalidConfig {
        field: "log_level".to_string(),
        reason: e.to_string(),
    })?;

    let (reload_filter, reload_handle) = reload::Layer::new(env_filter);

    let console_layer = fmt::layer()
        .with_ansi(true)
        .event_format(BracketedLevelFormat)
        .boxed();

    let file_layer = if config.enable_file {
        std::fs::create_dir_all(&config.log_dir)?;
        let appender = tracing_appender::rolling::daily(
            &config.log_dir,
            format!("{}.log", config.service_name),
        );
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);

        let layer = if config.enable_json {
            fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_target(true)
                .boxed()
        } else {
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .event_format(BracketedLevelFormat)
                .boxed()
        };
        Some(layer)
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(reload_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| CityError::Internal(format!("logging already initialized: {}", e)))?;

    let _ = LOG_FILTER_HANDLE.set(reload_handle);
    let _ = CURRENT_LOG_LEVEL.set(Mutex::new(initial_filter));

    tracing::info!(
        "Logging: {} (file: {})",
        config.service_name,
        if config.enable_file {
            config.log_dir.display().to_string()
        } else {
            "off".to_string()
        }
    );
    Ok(())
}

/// Replace the active filter, e.g. `"debug"` or `"info,sensorsrv=trace"`
pub fn set_log_level(level: &str) -> CityResult<()> {
    let new_filter = EnvFilter::try_new(level).map_err(|e| CityError::InvalidParameter {
        param: "level".to_string(),
        reason: format!("invalid log filter '{}': {}", level, e),
    })?;

    let handle = LOG_FILTER_HANDLE
        .get()
        .ok_or_else(|| CityError::ServiceUnavailable("logging not initialized".to_string()))?;

    handle
        .reload(new_filter)
        .map_err(|e| CityError::Internal(format!("failed to reload log filter: {}", e)))?;

    if let Some(current) = CURRENT_LOG_LEVEL.get() {
        if let Ok(mut guard) = current.lock() {
            *guard = level.to_string();
        }
    }

    tracing::info!("Log level changed to: {}", level);
    Ok(())
}

/// Active filter string, or `"unknown"` before initialization
pub fn get_log_level() -> String {
    CURRENT_LOG_LEVEL
        .get()
        .and_then(|m| m.lock().ok())
        .map(|guard| guard.clone())
        .unwrap_or_else(|| "unknown".to_string())
}
