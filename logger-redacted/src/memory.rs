use crate::delegate::{LogLevel, LoggerDelegate, LoggerResult};
use parking_lot::{Mutex, RwLock};
use std::path::{Path, PathBuf};

/// One line captured by [`MemoryLoggerDelegate`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub level: LogLevel,
    pub message: String,
    pub function: String,
    pub file: String,
    pub line: u32,
}

/// Keeps log lines in memory; useful for hosts that ship logs themselves and for tests
#[derive(Debug)]
pub struct MemoryLoggerDelegate {
    level: RwLock<LogLevel>,
    storage_path: RwLock<Option<PathBuf>>,
    records: Mutex<Vec<LogRecord>>,
    flushes: Mutex<usize>,
}

impl MemoryLoggerDelegate {
    pub fn new(level: LogLevel) -> Self {
        Self {
            level: RwLock::new(level),
            storage_path: RwLock::new(None),
            records: Mutex::new(Vec::new()),
            flushes: Mutex::new(0),
        }
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().clone()
    }

    pub fn storage_path(&self) -> Option<PathBuf> {
        self.storage_path.read().clone()
    }

    pub fn flush_count(&self) -> usize {
        *self.flushes.lock()
    }
}

impl LoggerDelegate for MemoryLoggerDelegate {
    fn init(&self, storage_path: &Path, level: LogLevel) -> LoggerResult<()> {
        *self.storage_path.write() = Some(storage_path.to_path_buf());
        *self.level.write() = level;
        Ok(())
    }

    fn write_to_log(&self, level: LogLevel, message: &str, function: &str, file: &str, line: u32) {
        self.records.lock().push(LogRecord {
            level,
            message: message.to_string(),
            function: function.to_string(),
            file: file.to_string(),
            line,
        });
    }

    fn flush(&self) {
        *self.flushes.lock() += 1;
    }

    fn log_level(&self) -> LogLevel {
        *self.level.read()
    }
}
