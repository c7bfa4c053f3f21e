//! Wire types for browser-side log intake.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        };
        f.write_str(name)
    }
}

/// One entry from a visitor's or admin's browser.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientLogEntry {
    pub timestamp: String,
    pub level: LogLevel,
    pub message: String,
    /// Page the browser was on, e.g. `/campaigns/clean-water`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct ClientLogBatch {
    pub logs: Vec<ClientLogEntry>,
}

#[derive(Debug, Serialize)]
pub struct LogResponse {
    pub success: bool,
    pub received: usize,
    pub processed: usize,
}

/// Upper bound on entries accepted from one batch.
pub const MAX_BATCH_SIZE: usize = 100;
