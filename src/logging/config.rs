//! Logging configuration
//!
//! Log level, console output and the optional JSON log directory used by
//! [`super::init_logging`].

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const VALID_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Global log level (trace, debug, info, warn, error)
    pub global_level: String,

    /// Log level for per-frame pipeline events
    pub pipeline_level: String,

    /// Enable console output
    pub console_output: bool,

    /// Directory for daily-rolling JSON log files (None = no file logging)
    pub log_directory: Option<PathBuf>,

    /// Include file location in logs (impacts performance)
    pub include_file_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            global_level: "info".to_string(),
            pipeline_level: "info".to_string(),
            console_output: true,
            log_directory: None,
            include_file_location: false,
        }
    }
}

impl LoggingConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !VALID_LEVELS.contains(&self.global_level.as_str()) {
            return Err(format!(
                "Invalid global_level: {}. Must be one of: {:?}",
                self.global_level, VALID_LEVELS
            ));
        }

        if !VALID_LEVELS.contains(&self.pipeline_level.as_str()) {
            return Err(format!(
                "Invalid pipeline_level: {}. Must be one of: {:?}",
                self.pipeline_level, VALID_LEVELS
            ));
        }

        if let Some(ref log_dir) = self.log_directory {
            if let Some(parent) = log_dir.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    return Err(format!("Log directory parent does not exist: {:?}", parent));
                }
            }
        }

        Ok(())
    }

    /// Filter directive string understood by `tracing_subscriber::EnvFilter`
    pub fn filter_directive(&self) -> String {
        let crate_target = env!("CARGO_PKG_NAME").replace('-', "_");
        format!(
            "{crate_target}={global},{crate_target}::pipeline={pipeline}",
            global = self.global_level,
            pipeline = self.pipeline_level
        )
    }
}
