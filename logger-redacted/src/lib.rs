//! Logging for the Information Protection SDK
//!
//! Hosts plug their own log sink in through [`LoggerDelegate`]. SDK code keeps
//! using plain `tracing` macros; [`DelegateLayer`] bridges those events into
//! the delegate after running them through [`TokenRedactor`], so bearer
//! tokens, client secrets and user e-mail addresses never reach host logs.
//!
//! # Example
//!
//! ```rust
//! use logger_redacted::{DelegateLayer, LogLevel, MemoryLoggerDelegate};
//! use std::sync::Arc;
//!
//! let delegate = Arc::new(MemoryLoggerDelegate::new(LogLevel::Info));
//! let dispatch = DelegateLayer::new(delegate.clone()).into_dispatch();
//!
//! tracing::dispatcher::with_default(&dispatch, || {
//!     tracing::info!("acquired token for alice@contoso.com");
//! });
//!
//! assert!(!delegate.records()[0].message.contains("alice@contoso.com"));
//! ```

pub mod config;
pub mod delegate;
pub mod file_logger;
pub mod layer;
pub mod macros;
pub mod memory;
pub mod redactor;

pub use config::LoggerConfig;
pub use delegate::{LogLevel, LoggerDelegate, LoggerError, LoggerResult};
pub use file_logger::FileLoggerDelegate;
pub use layer::DelegateLayer;
pub use memory::{LogRecord, MemoryLoggerDelegate};
pub use redactor::{hash_value, RedactionConfig, TokenRedactor};

use tracing_subscriber::EnvFilter;

/// Installs a global `fmt` subscriber; `RUST_LOG` wins over `config.log_level`.
///
/// Returns `false` when a global subscriber was already installed.
pub fn init_tracing(config: &LoggerConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(tracing_level_directive(config.log_level)));

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    if config.json {
        builder.json().try_init().is_ok()
    } else {
        builder.try_init().is_ok()
    }
}

fn tracing_level_directive(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Trace => "trace",
        LogLevel::Info => "info",
        LogLevel::Warning => "warn",
        LogLevel::Error => "error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_delegate_log_macro_respects_level() {
        let delegate = Arc::new(MemoryLoggerDelegate::new(LogLevel::Warning));

        delegate_log!(delegate, LogLevel::Info, "skipped {}", 1);
        delegate_log!(delegate, LogLevel::Error, "commit failed for {}", "doc.docx");

        let records = delegate.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].message, "commit failed for doc.docx");
        assert!(records[0].function.contains("logger_redacted"));
    }

    #[test]
    fn test_level_directive() {
        assert_eq!(tracing_level_directive(LogLevel::Warning), "warn");
    }
}
