/*!
 * Logging Module
 * Console plus daily-rolling file output; JSON in production.
 */
pub mod config;
pub mod middleware;

use std::io;
use tracing_appender::{non_blocking, non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{
    filter::LevelFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
};

pub use config::{LogLevel, LogSettings};

/// Writer guards; dropping them flushes and stops the background writers.
pub type LogGuards = Vec<WorkerGuard>;

/// Initialize the logging system. Keep the returned guards alive for the
/// lifetime of the process.
pub fn init() -> LogGuards {
    let settings = LogSettings::from_env();

    if let Err(e) = std::fs::create_dir_all(&settings.dir) {
        eprintln!("Cannot create log directory {}: {}", settings.dir.display(), e);
    }

    // All logs
    let (file_writer, file_guard) = non_blocking(rolling::daily(&settings.dir, "app.log"));
    // Errors only
    let (error_writer, error_guard) = non_blocking(rolling::daily(&settings.dir, "error.log"));
    let (console_writer, console_guard) = non_blocking(io::stdout());

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.filter_directive()));

    let subscriber = tracing_subscriber::registry().with(env_filter);

    if settings.is_production {
        let file_layer = fmt::layer()
            .json()
            .with_writer(file_writer)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true);

        let console_layer = fmt::layer()
            .json()
            .with_writer(console_writer)
            .with_target(false);

        let error_layer = fmt::layer()
            .json()
            .with_writer(error_writer)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_filter(LevelFilter::ERROR);

        subscriber
            .with(file_layer)
            .with(error_layer)
            .with(console_layer)
            .init();
    } else {
        let file_layer = fmt::layer()
            .with_writer(file_writer)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(false);

        let console_layer = fmt::layer()
            .with_writer(console_writer)
            .with_target(true)
            .pretty();

        let error_layer = fmt::layer()
            .json()
            .with_writer(error_writer)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_filter(LevelFilter::ERROR);

        subscriber
            .with(file_layer)
            .with(error_layer)
            .with(console_layer)
            .init();
    }

    tracing::info!(
        level = %settings.level,
        dir = %settings.dir.display(),
        production = settings.is_production,
        "Logging initialized"
    );

    vec![file_guard, error_guard, console_guard]
}
