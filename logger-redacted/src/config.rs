// Logger configuration
use crate::delegate::LogLevel;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggerConfig {
    pub redaction_enabled: bool,
    pub log_level: LogLevel,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            redaction_enabled: true,
            log_level: LogLevel::Info,
            json: false,
        }
    }
}
