//! Unified logging module for the master-station services
//!
//! Console output with a bracketed level prefix, plus an optional daily
//! rolling file layer. Worker guards are retained for the process lifetime
//! so buffered log lines are flushed on exit.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, OnceLock};

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{format::Writer, FmtContext, FormatEvent, FormatFields},
    layer::SubscriberExt,
    registry::LookupSpan,
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

/// Custom event formatter that outputs: `timestamp [LEVEL] message`
///
/// Example output: `2026-08-08T10:15:44.809Z [INFO] Service started`
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
        write!(writer, "{} ", now.format("%Y-%m-%dT%H:%M:%S%.6fZ"))?;

        let level = *event.metadata().level();
        if writer.has_ansi_escapes() {
            let color = match level {
                Level::TRACE => "\x1b[35m", // magenta
                Level::DEBUG => "\x1b[34m", // blue
                Level::INFO => "\x1b[32m",  // green
                Level::WARN => "\x1b[33m",  // yellow
                Level::ERROR => "\x1b[31m", // red
            };
            write!(writer, "{}{}\x1b[0m ", color, format_level(&level))?;
        } else {
            write!(writer, "{} ", format_level(&level))?;
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}

// Global guards for keeping non-blocking writers alive
static GUARDS: OnceLock<Arc<Mutex<Vec<WorkerGuard>>>> = OnceLock::new();

fn guards() -> &'static Arc<Mutex<Vec<WorkerGuard>>> {
    GUARDS.get_or_init(|| Arc::new(Mutex::new(Vec::new())))
}

/// Logging configuration for a service
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Service name, used as the log file stem
    pub service_name: String,
    /// Console log level (overridden by RUST_LOG when set)
    pub console_level: Level,
    /// Log directory; `None` disables the file layer
    pub log_dir: Option<PathBuf>,
    /// File log level
    pub file_level: Level,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "service".to_string(),
            console_level: Level::INFO,
            log_dir: None,
            file_level: Level::DEBUG,
        }
    }
}

/// Initialize the global tracing subscriber.
///
/// Fails if a subscriber was already installed for this process, which is
/// why tests never call this and binaries call it exactly once.
pub fn init_with_config(config: LogConfig) -> anyhow::Result<()> {
    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.console_level.to_string()));

    let console_layer = tracing_subscriber::fmt::layer()
        .event_format(BracketedLevelFormat)
        .with_filter(console_filter);

    let file_layer = match &config.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::daily(
                dir,
                format!("{}.log", config.service_name),
            );
            let (writer, guard) = tracing_appender::non_blocking(appender);
            guards()
                .lock()
                .expect("logging guard mutex poisoned")
                .push(guard);
            Some(
                tracing_subscriber::fmt::layer()
                    .event_format(BracketedLevelFormat)
                    .with_ansi(false)
                    .with_writer(writer)
                    .with_filter(EnvFilter::new(config.file_level.to_string())),
            )
        },
        None => None,
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))?;

    Ok(())
}
