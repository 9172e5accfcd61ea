//! Append-only audit trail of classified changes.
//!
//! The log is a single JSON array. Every append reads the array back,
//! pushes the new entry and rewrites the whole file; entries are never
//! removed or edited.

use crate::digest::FileDigest;
use crate::error::Result;
use crate::persist::write_json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    Created,
    Modified,
    Deleted,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EventKind::Created => "CREATED",
            EventKind::Modified => "MODIFIED",
            EventKind::Deleted => "DELETED",
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub event: EventKind,
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<FileDigest>,
}

pub struct EventLog {
    path: PathBuf,
    last_timestamp: Option<DateTime<Utc>>,
}

impl EventLog {
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let last_timestamp = Self::load(&path).last().map(|e| e.timestamp);
        Self {
            path,
            last_timestamp,
        }
    }

    /// Read every entry, oldest first. A missing or corrupt file reads as empty.
    pub fn load(path: &Path) -> Vec<LogEntry> {
        let raw = match fs::read(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "event log unreadable, treating as empty");
                return Vec::new();
            }
        };
        match serde_json::from_slice(&raw) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "event log corrupt, treating as empty");
                Vec::new()
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        Self::load(&self.path)
    }

    /// Build an entry stamped now (never earlier than the previous entry)
    /// and append it.
    pub fn record(
        &mut self,
        event: EventKind,
        file: &Path,
        hash: Option<FileDigest>,
    ) -> Result<LogEntry> {
        let mut timestamp = Utc::now();
        if let Some(last) = self.last_timestamp {
            if timestamp < last {
                timestamp = last;
            }
        }
        let entry = LogEntry {
            timestamp,
            event,
            file: file.to_string_lossy().into_owned(),
            hash,
        };
        self.append(entry.clone())?;
        Ok(entry)
    }

    pub fn append(&mut self, entry: LogEntry) -> Result<()> {
        let mut entries = Self::load(&self.path);
        let timestamp = entry.timestamp;
        entries.push(entry);
        write_json(&self.path, &entries)?;
        self.last_timestamp = Some(timestamp);
        debug!(path = %self.path.display(), entries = entries.len(), "event appended");
        Ok(())
    }

    /// Read recent events, optionally filtering by `since` timestamp and limiting count.
    pub fn read_recent(
        &self,
        since: Option<DateTime<Utc>>,
        limit: Option<usize>,
    ) -> Vec<LogEntry> {
        let mut entries: Vec<LogEntry> = Self::load(&self.path)
            .into_iter()
            .filter(|e| since.map_or(true, |s| e.timestamp >= s))
            .collect();
        // Return most recent first
        entries.reverse();
        if let Some(lim) = limit {
            entries.truncate(lim);
        }
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::HashAlgorithm;
    use chrono::Duration;
    use tempfile::tempdir;

    #[test]
    fn entries_accumulate_in_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("file_log.json");
        let mut log = EventLog::open(&path);
        let h = FileDigest::of_bytes(HashAlgorithm::Sha256, b"x");
        log.record(EventKind::Created, Path::new("/w/x"), Some(h.clone()))
            .unwrap();
        log.record(EventKind::Deleted, Path::new("/w/x"), None).unwrap();

        let entries = log.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].event, EventKind::Created);
        assert_eq!(entries[0].hash, Some(h));
        assert_eq!(entries[1].event, EventKind::Deleted);
        assert!(entries[0].timestamp <= entries[1].timestamp);
    }

    #[test]
    fn durable_format_omits_hash_for_deletions() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("file_log.json");
        let mut log = EventLog::open(&path);
        log.record(EventKind::Deleted, Path::new("/w/gone"), None).unwrap();

        let raw: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        let first = &raw.as_array().unwrap()[0];
        assert_eq!(first["event"], "DELETED");
        assert_eq!(first["file"], "/w/gone");
        assert!(first.get("hash").is_none());
        assert!(first["timestamp"].as_str().unwrap().contains('T'));
    }

    #[test]
    fn corrupt_log_is_replaced_on_next_append() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("file_log.json");
        fs::write(&path, b"[{\"timestamp\":").unwrap();
        let mut log = EventLog::open(&path);
        assert!(log.entries().is_empty());
        log.record(EventKind::Modified, Path::new("/w/a"), None).unwrap();
        assert_eq!(EventLog::load(&path).len(), 1);
    }

    #[test]
    fn timestamps_never_go_backwards() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("file_log.json");
        let mut log = EventLog::open(&path);
        let future = Utc::now() + Duration::hours(1);
        log.append(LogEntry {
            timestamp: future,
            event: EventKind::Created,
            file: "/w/a".into(),
            hash: None,
        })
        .unwrap();

        let next = log.record(EventKind::Deleted, Path::new("/w/a"), None).unwrap();
        assert_eq!(next.timestamp, future);

        // A fresh handle picks the clamp up from disk.
        let mut reopened = EventLog::open(&path);
        let again = reopened
            .record(EventKind::Created, Path::new("/w/b"), None)
            .unwrap();
        assert!(again.timestamp >= future);
    }

    #[test]
    fn read_recent_is_newest_first() {
        let dir = tempdir().unwrap();
        let mut log = EventLog::open(dir.path().join("file_log.json"));
        for name in ["a", "b", "c"] {
            log.record(EventKind::Created, &Path::new("/w").join(name), None)
                .unwrap();
        }
        let recent = log.read_recent(None, Some(2));
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].file, "/w/c");
        assert_eq!(recent[1].file, "/w/b");

        let later = Utc::now() + Duration::hours(1);
        assert!(log.read_recent(Some(later), None).is_empty());
    }
}
