use crate::delegate::{LogLevel, LoggerDelegate, LoggerError, LoggerResult};
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use std::io::Write;
use std::path::Path;
use tracing_appender::rolling::{RollingFileAppender, Rotation};

pub const DEFAULT_LOG_FILE: &str = "ip_sdk.log";

/// Writes SDK log lines to `<storage path>/logs/<file name>`
pub struct FileLoggerDelegate {
    file_name: String,
    rotation: Rotation,
    level: RwLock<LogLevel>,
    writer: Mutex<Option<RollingFileAppender>>,
}

impl FileLoggerDelegate {
    pub fn new() -> Self {
        Self {
            file_name: DEFAULT_LOG_FILE.to_string(),
            rotation: Rotation::NEVER,
            level: RwLock::new(LogLevel::Info),
            writer: Mutex::new(None),
        }
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = file_name.into();
        self
    }

    pub fn with_daily_rotation(mut self) -> Self {
        self.rotation = Rotation::DAILY;
        self
    }
}

impl Default for FileLoggerDelegate {
    fn default() -> Self {
        Self::new()
    }
}

impl LoggerDelegate for FileLoggerDelegate {
    fn init(&self, storage_path: &Path, level: LogLevel) -> LoggerResult<()> {
        let directory = storage_path.join("logs");
        std::fs::create_dir_all(&directory)?;

        let appender = RollingFileAppender::builder()
            .rotation(self.rotation.clone())
            .filename_prefix(&self.file_name)
            .build(&directory)
            .map_err(|e| LoggerError::Appender(e.to_string()))?;

        *self.writer.lock() = Some(appender);
        *self.level.write() = level;
        Ok(())
    }

    fn write_to_log(&self, level: LogLevel, message: &str, function: &str, file: &str, line: u32) {
        let mut guard = self.writer.lock();
        if let Some(writer) = guard.as_mut() {
            let _ = writeln!(
                writer,
                "{} {:<7} [{}:{}] {} {}",
                Utc::now().to_rfc3339(),
                level.as_str().to_uppercase(),
                file,
                line,
                function,
                message
            );
        }
    }

    fn flush(&self) {
        if let Some(writer) = self.writer.lock().as_mut() {
            let _ = writer.flush();
        }
    }

    fn log_level(&self) -> LogLevel {
        *self.level.read()
    }
}
