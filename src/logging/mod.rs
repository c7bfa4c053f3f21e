/*!
 * Logging Module
 * Tracing subscriber setup: rolling files plus console, JSON in production
 */
pub mod config;
pub mod middleware;

use std::io;
use tracing_appender::{non_blocking, non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub const LOG_DIR: &str = "logs";

/// Background writer handles. Dropping them flushes and stops the writers,
/// so the caller keeps this alive for the whole process.
pub struct LogGuards {
    _guards: Vec<WorkerGuard>,
}

/// Initialize the logging system
pub fn init(is_production: bool) -> LogGuards {
    std::fs::create_dir_all(LOG_DIR).ok();

    let (file_writer, file_guard) = non_blocking(rolling::daily(LOG_DIR, "app.log"));
    let (error_writer, error_guard) = non_blocking(rolling::daily(LOG_DIR, "error.log"));
    let (console_writer, console_guard) = non_blocking(io::stdout());

    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| {
        if is_production {
            "info".to_string()
        } else {
            "debug".to_string()
        }
    });

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "nonprofit_cms={},tower_http=info,sqlx=warn",
            log_level
        ))
    });

    let subscriber = tracing_subscriber::registry().with(env_filter);

    if is_production {
        let file_layer = fmt::layer()
            .json()
            .with_writer(file_writer)
            .with_target(true)
            .with_file(true)
            .with_line_number(true);

        let error_layer = fmt::layer()
            .json()
            .with_writer(error_writer)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_filter(tracing_subscriber::filter::LevelFilter::ERROR);

        let console_layer = fmt::layer()
            .json()
            .with_writer(console_writer)
            .with_target(false);

        subscriber
            .with(file_layer)
            .with(error_layer)
            .with(console_layer)
            .init();
    } else {
        let file_layer = fmt::layer()
            .with_writer(file_writer)
            .with_target(true)
            .with_ansi(false);

        let error_layer = fmt::layer()
            .with_writer(error_writer)
            .with_ansi(false)
            .with_filter(tracing_subscriber::filter::LevelFilter::ERROR);

        let console_layer = fmt::layer()
            .with_writer(console_writer)
            .with_target(true)
            .pretty();

        subscriber
            .with(file_layer)
            .with(error_layer)
            .with(console_layer)
            .init();
    }

    tracing::info!(production = is_production, "logging initialized");

    LogGuards {
        _guards: vec![file_guard, error_guard, console_guard],
    }
}
