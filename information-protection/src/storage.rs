//! Profile storage: atomic file writes and the engine cache

use crate::delegates::Identity;
use chrono::{DateTime, Utc};
use error_common::{SdkError, SdkResult};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

pub(crate) const ENGINE_CACHE_FILE: &str = "engines.json";

/// Writes `bytes` to a sibling temp file, then renames it over `path`.
///
/// On failure the temp file is removed and `path` is left untouched.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> SdkResult<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)?;

    let file_name = path
        .file_name()
        .ok_or_else(|| SdkError::bad_input(format!("'{}' is not a file path", path.display())))?;
    let temp = parent.join(format!(".{}.{}.tmp", file_name.to_string_lossy(), Uuid::new_v4().simple()));

    let result = (|| -> std::io::Result<()> {
        let mut file = fs::File::create(&temp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&temp, path)
    })();

    if let Err(e) = result {
        if let Err(cleanup) = fs::remove_file(&temp) {
            debug!(path = %temp.display(), "temp file cleanup failed: {cleanup}");
        }
        return Err(SdkError::from(e).with_context("path", path.display().to_string()));
    }
    Ok(())
}

/// Engine remembered by a profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineRecord {
    pub id: String,
    pub identity: Identity,
    pub client_data: String,
    pub locale: String,
    pub created_at: DateTime<Utc>,
}

/// Engine records kept in `engines.json` or only in memory
pub(crate) struct EngineCache {
    file: Option<PathBuf>,
    records: Mutex<Vec<EngineRecord>>,
}

impl EngineCache {
    pub(crate) fn in_memory() -> Self {
        Self {
            file: None,
            records: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn open(dir: &Path) -> SdkResult<Self> {
        let file = dir.join(ENGINE_CACHE_FILE);
        let records = if file.exists() {
            let text = fs::read_to_string(&file)?;
            match serde_json::from_str(&text) {
                Ok(records) => records,
                Err(e) => {
                    warn!(path = %file.display(), "discarding unreadable engine cache: {e}");
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        Ok(Self {
            file: Some(file),
            records: Mutex::new(records),
        })
    }

    pub(crate) fn ids(&self) -> Vec<String> {
        self.records.lock().iter().map(|r| r.id.clone()).collect()
    }

    pub(crate) fn get(&self, id: &str) -> Option<EngineRecord> {
        self.records.lock().iter().find(|r| r.id == id).cloned()
    }

    /// Inserts or replaces the record with the same id, keeping its creation time.
    pub(crate) fn upsert(&self, mut record: EngineRecord) -> SdkResult<()> {
        let mut records = self.records.lock();
        let mut updated = records.clone();
        match updated.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => {
                record.created_at = existing.created_at;
                *existing = record;
            }
            None => updated.push(record),
        }
        self.persist(&updated)?;
        *records = updated;
        Ok(())
    }

    /// Returns whether a record was removed.
    pub(crate) fn remove(&self, id: &str) -> SdkResult<bool> {
        let mut records = self.records.lock();
        let updated: Vec<EngineRecord> = records.iter().filter(|r| r.id != id).cloned().collect();
        if updated.len() == records.len() {
            return Ok(false);
        }
        self.persist(&updated)?;
        *records = updated;
        Ok(true)
    }

    fn persist(&self, records: &[EngineRecord]) -> SdkResult<()> {
        let Some(file) = &self.file else {
            return Ok(());
        };
        let json = serde_json::to_vec_pretty(records)
            .map_err(|e| SdkError::internal(format!("Failed to serialize engine cache: {e}")))?;
        write_atomic(file, &json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str) -> EngineRecord {
        EngineRecord {
            id: id.to_string(),
            identity: Identity::new("alice@contoso.com"),
            client_data: String::new(),
            locale: "en-US".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_write_atomic_replaces_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bin");

        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"second");
        let leftovers = fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn test_write_atomic_rejects_directory_target() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("taken");
        fs::create_dir(&target).unwrap();

        assert!(write_atomic(&target, b"data").is_err());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_cache_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();

        let cache = EngineCache::open(dir.path()).unwrap();
        cache.upsert(record("engine-a")).unwrap();
        cache.upsert(record("engine-b")).unwrap();
        assert!(cache.remove("engine-a").unwrap());
        assert!(!cache.remove("engine-a").unwrap());

        let reopened = EngineCache::open(dir.path()).unwrap();
        assert_eq!(reopened.ids(), vec!["engine-b".to_string()]);
        assert_eq!(reopened.get("engine-b").unwrap().locale, "en-US");
    }

    #[test]
    fn test_upsert_keeps_creation_time() {
        let cache = EngineCache::in_memory();
        let first = record("e");
        let created = first.created_at;
        cache.upsert(first).unwrap();

        let mut again = record("e");
        again.locale = "de-DE".to_string();
        cache.upsert(again).unwrap();

        let stored = cache.get("e").unwrap();
        assert_eq!(stored.created_at, created);
        assert_eq!(stored.locale, "de-DE");
    }

    #[test]
    fn test_failed_persist_leaves_records_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let cache = EngineCache::open(dir.path()).unwrap();
        cache.upsert(record("engine-a")).unwrap();

        let file = dir.path().join(ENGINE_CACHE_FILE);
        fs::remove_file(&file).unwrap();
        fs::create_dir(&file).unwrap();

        assert!(cache.remove("engine-a").is_err());
        assert!(cache.upsert(record("engine-b")).is_err());
        assert_eq!(cache.ids(), vec!["engine-a".to_string()]);
    }
}
