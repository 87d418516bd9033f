use crate::entry::{AuditEntry, AuditEventType};
use crate::error::Result;
use parking_lot::Mutex;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// Destination for audit entries
pub trait AuditSink: Send + Sync {
    fn record(&self, entry: &AuditEntry) -> Result<()>;
}

/// Keeps entries in memory, in arrival order
#[derive(Debug, Default)]
pub struct InMemoryAuditSink {
    entries: Mutex<Vec<AuditEntry>>,
}

impl InMemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().clone()
    }

    pub fn entries_of(&self, event_type: AuditEventType) -> Vec<AuditEntry> {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.event_type == event_type)
            .cloned()
            .collect()
    }

    pub fn entries_for_content(&self, content_id: &str) -> Vec<AuditEntry> {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.content_id == content_id)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn record(&self, entry: &AuditEntry) -> Result<()> {
        entry.validate()?;
        self.entries.lock().push(entry.clone());
        Ok(())
    }
}

/// Emits entries as `tracing` events under the `audit` target
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, entry: &AuditEntry) -> Result<()> {
        entry.validate()?;
        info!(
            target: "audit",
            audit_id = %entry.id,
            event_type = %entry.event_type,
            content_id = %entry.content_id,
            action = %entry.action,
            data = %entry.data,
            "audit event"
        );
        Ok(())
    }
}

/// Appends one JSON document per line to a file
#[derive(Debug)]
pub struct JsonLinesAuditSink {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonLinesAuditSink {
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(Self {
            path,
            lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read_all(&self) -> Result<Vec<AuditEntry>> {
        let _guard = self.lock.lock();
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(Into::into))
            .collect()
    }
}

impl AuditSink for JsonLinesAuditSink {
    fn record(&self, entry: &AuditEntry) -> Result<()> {
        entry.validate()?;
        let line = serde_json::to_string(entry)?;

        let _guard = self.lock.lock();
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{line}")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn change(content_id: &str) -> AuditEntry {
        AuditEntry::new(AuditEventType::Change, "bob@contoso.com", content_id, "label_changed")
    }

    #[test]
    fn test_in_memory_filters() {
        let sink = InMemoryAuditSink::new();
        sink.record(&change("a.docx")).unwrap();
        sink.record(&AuditEntry::new(AuditEventType::Discovery, "bob@contoso.com", "b.docx", "discover"))
            .unwrap();

        assert_eq!(sink.len(), 2);
        assert_eq!(sink.entries_of(AuditEventType::Change).len(), 1);
        assert_eq!(sink.entries_for_content("b.docx").len(), 1);
    }

    #[test]
    fn test_in_memory_rejects_invalid_entry() {
        let sink = InMemoryAuditSink::new();
        let invalid = AuditEntry::new(AuditEventType::Change, "", "a.docx", "label_changed");
        assert!(sink.record(&invalid).is_err());
        assert!(sink.is_empty());
    }

    #[test]
    fn test_json_lines_appends() {
        let dir = TempDir::new().unwrap();
        let sink = JsonLinesAuditSink::new(dir.path().join("audit").join("events.jsonl")).unwrap();

        sink.record(&change("one.txt")).unwrap();
        sink.record(&change("two.txt")).unwrap();

        let entries = sink.read_all().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].content_id, "two.txt");
    }
}
