// Logging System for Drover
//
// This module provides a unified logging interface for the worker pool.
// It's built on top of the `tracing` ecosystem; the pool emits structured
// events for unit lifecycle changes, scheduling decisions and shutdown.
//
// # Usage Examples
//
// ## Basic Initialization
//
// ```rust
// use drover::logging;
//
// // INFO level, console output
// logging::init_default();
//
// // Or with custom settings
// let config = logging::LogConfig {
//     level: tracing::Level::DEBUG,
//     json_format: false,
//     ..Default::default()
// };
// logging::init(config);
// ```
//
// ## Development and Production
//
// ```rust
// use drover::logging;
//
// // DEBUG level, scheduler decisions at TRACE, file/line info
// logging::init_development();
//
// // INFO level, JSON lines for log aggregators
// logging::init_production();
// ```
//
// ## Pool Event Macros
//
// ```rust
// use drover::{log_pool, log_scheduler, log_unit};
//
// log_unit!(3, "created", live_units = 2);
// log_scheduler!("task_queued", task_id = 17, queue_depth = 4);
// log_pool!("terminate_all", "completed", units = 4);
// ```

use std::io;
use std::sync::Once;

use tracing::{Level, Subscriber};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub use tracing::{debug, error, info, trace, warn};

#[doc(hidden)]
pub use tracing as __tracing;

/// Configuration for the logging system.
///
/// ```rust
/// use drover::logging::LogConfig;
/// use tracing::Level;
///
/// let config = LogConfig {
///     level: Level::DEBUG,
///     json_format: true,
///     target_filters: Some("drover=debug,drover::pool=trace".to_string()),
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum log level to display
    pub level: Level,
    /// Whether to use JSON format for logs
    pub json_format: bool,
    /// Whether to include file and line information
    pub show_file_line: bool,
    /// Whether to include thread name/id
    pub show_thread_info: bool,
    /// Whether to include timestamps
    pub show_time: bool,
    /// Target filter expressions (format: "target=level,target2=level2,...")
    pub target_filters: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            json_format: false,
            show_file_line: true,
            show_thread_info: true,
            show_time: true,
            target_filters: None,
        }
    }
}

// Only the first initializer wins
static INIT: Once = Once::new();

fn env_filter(config: &LogConfig) -> EnvFilter {
    let mut filter = EnvFilter::from_default_env().add_directive(config.level.into());
    if let Some(filters) = &config.target_filters {
        for directive in filters.split(',') {
            if let Ok(directive) = directive.trim().parse() {
                filter = filter.add_directive(directive);
            }
        }
    }
    filter
}

/// Installs the global subscriber described by `config`.
///
/// Safe to call multiple times; only the first call takes effect.
pub fn init(config: LogConfig) {
    INIT.call_once(|| {
        let registry = tracing_subscriber::registry().with(env_filter(&config));

        let subscriber: Box<dyn Subscriber + Send + Sync> = match (config.json_format, config.show_time) {
            (true, _) => Box::new(registry.with(fmt::layer().json().flatten_event(true))),
            (false, true) => Box::new(registry.with(console_layer(&config))),
            (false, false) => Box::new(registry.with(console_layer(&config).without_time())),
        };

        set_global_subscriber(subscriber);
    });
}

fn console_layer<S>(config: &LogConfig) -> fmt::Layer<S>
where
    S: Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fmt::layer()
        .with_ansi(atty::is(atty::Stream::Stdout))
        .with_file(config.show_file_line)
        .with_line_number(config.show_file_line)
        .with_thread_names(config.show_thread_info)
        .with_thread_ids(config.show_thread_info)
}

fn set_global_subscriber<S>(subscriber: S)
where
    S: Subscriber + Send + Sync + 'static,
{
    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Error setting global tracing subscriber: {}", err);
    }
}

/// Opens `path` for appending, creating it if needed.
pub fn file_writer(path: &str) -> io::Result<Box<dyn io::Write + Send + Sync + 'static>> {
    use std::fs::OpenOptions;

    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(Box::new(file))
}

/// Logs to the console and appends plain-text lines to `log_file`.
///
/// Fails if the file cannot be opened; nothing is installed in that case.
pub fn init_with_file(config: LogConfig, log_file: &str) -> io::Result<()> {
    // Surface a bad path to the caller instead of inside the writer.
    file_writer(log_file)?;

    INIT.call_once(|| {
        let log_file_path = log_file.to_string();
        let file_layer = fmt::layer()
            .with_ansi(false)
            .with_writer(move || match file_writer(&log_file_path) {
                Ok(writer) => writer,
                Err(_) => Box::new(io::stderr()),
            })
            .with_file(true)
            .with_line_number(true)
            .with_thread_names(true)
            .with_thread_ids(true);

        let subscriber = tracing_subscriber::registry()
            .with(env_filter(&config))
            .with(console_layer(&config))
            .with(file_layer);

        set_global_subscriber(subscriber);
    });

    Ok(())
}

/// INFO level, human-readable console output.
pub fn init_default() {
    init(LogConfig::default());
}

/// DEBUG level with scheduler decisions at TRACE.
pub fn init_development() {
    init(LogConfig {
        level: Level::DEBUG,
        json_format: false,
        show_file_line: true,
        show_thread_info: true,
        show_time: true,
        target_filters: Some("drover=debug,drover::pool=trace".to_string()),
    });
}

/// INFO level JSON lines without file/line information.
pub fn init_production() {
    init(LogConfig {
        level: Level::INFO,
        json_format: true,
        show_file_line: false,
        show_thread_info: true,
        show_time: true,
        target_filters: None,
    });
}

/// Warnings and errors only, compact, for test binaries.
pub fn init_test() {
    init(LogConfig {
        level: Level::WARN,
        json_format: false,
        show_file_line: true,
        show_thread_info: false,
        show_time: false,
        target_filters: None,
    });
}

/// Log an execution-unit lifecycle event: creation, replacement, eviction.
///
/// ```rust
/// use drover::log_unit;
///
/// log_unit!(4, "evicted", reason = "idle_timeout");
/// ```
#[macro_export]
macro_rules! log_unit {
    ($unit_id:expr, $event:expr) => {
        $crate::logging::__tracing::info!(unit_id = $unit_id, event = $event)
    };
    ($unit_id:expr, $event:expr, $($fields:tt)*) => {
        $crate::logging::__tracing::info!(unit_id = $unit_id, event = $event, $($fields)*)
    };
}

/// Log a scheduling decision. Emitted at DEBUG since it fires per task.
#[macro_export]
macro_rules! log_scheduler {
    ($event:expr) => {
        $crate::logging::__tracing::debug!(component = "scheduler", event = $event)
    };
    ($event:expr, $($fields:tt)*) => {
        $crate::logging::__tracing::debug!(component = "scheduler", event = $event, $($fields)*)
    };
}

/// Log a pool-wide operation and its outcome.
///
/// ```rust
/// use drover::log_pool;
///
/// log_pool!("build", "completed", max_units = 8);
/// ```
#[macro_export]
macro_rules! log_pool {
    ($operation:expr, $status:expr) => {
        $crate::logging::__tracing::info!(operation = $operation, status = $status)
    };
    ($operation:expr, $status:expr, $($fields:tt)*) => {
        $crate::logging::__tracing::info!(operation = $operation, status = $status, $($fields)*)
    };
}
