//! Logging framework for the registration pipeline
//!
//! Structured `tracing` output with per-frame spans, correlation ids and a
//! bounded history of stage timings.

pub mod config;
pub mod metrics;
pub mod spans;

use anyhow::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};
use uuid::Uuid;

pub use config::LoggingConfig;
pub use metrics::{MetricsCollector, PerformanceMeasurement, PerformanceStats, Timer};
pub use spans::{FrameSpan, TemplateSpan};

thread_local! {
    static CORRELATION_ID: std::cell::RefCell<Option<Uuid>> = const { std::cell::RefCell::new(None) };
}

/// Keeps the background file writer alive; drop it only at shutdown
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Install the global subscriber. `RUST_LOG` overrides the configured levels.
pub fn init_logging(config: &LoggingConfig) -> Result<LoggingGuard> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.filter_directive()));

    let mut layers = Vec::new();

    if config.console_output {
        let console_layer = fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_line_number(config.include_file_location)
            .with_file(config.include_file_location);
        layers.push(console_layer.boxed());
    }

    let mut file_guard = None;
    if let Some(ref log_dir) = config.log_directory {
        let file_appender = tracing_appender::rolling::daily(log_dir, "recapture.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        file_guard = Some(guard);

        let file_layer = fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .json();
        layers.push(file_layer.boxed());
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(layers)
        .try_init()?;

    tracing::debug!(?config, "Logging system initialized");
    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

pub fn set_correlation_id(id: Uuid) {
    CORRELATION_ID.with(|correlation_id| {
        *correlation_id.borrow_mut() = Some(id);
    });
}

pub fn get_correlation_id() -> Option<Uuid> {
    CORRELATION_ID.with(|correlation_id| *correlation_id.borrow())
}

/// Generate a new correlation id and make it current for this thread
pub fn new_correlation_id() -> Uuid {
    let id = Uuid::new_v4();
    set_correlation_id(id);
    id
}

pub fn clear_correlation_id() {
    CORRELATION_ID.with(|correlation_id| {
        *correlation_id.borrow_mut() = None;
    });
}
