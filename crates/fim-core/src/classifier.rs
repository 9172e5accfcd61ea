//! Change classification.
//!
//! One notification at a time: hash the file, compare against the state
//! table, record the outcome. The classifier owns the state table and the
//! event log, so callers must feed it from a single consumer.
//!
//! Notifications for the durable files themselves (and the scratch files
//! written while replacing them) are dropped, otherwise every persist would
//! trigger another event.

use crate::digest::{DigestEngine, HashAlgorithm};
use crate::error::Result;
use crate::event_log::{EventKind, EventLog, LogEntry};
use crate::notification::{Notification, NotificationKind};
use crate::persist::is_scratch_for;
use crate::settings::MonitorSettings;
use crate::state_store::StateStore;
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace, warn};

pub struct Classifier {
    digest: DigestEngine,
    state: StateStore,
    log: EventLog,
    durable: [PathBuf; 2],
}

impl Classifier {
    pub fn new(digest: DigestEngine, mut state: StateStore, log: EventLog) -> Self {
        let durable = [state.path().to_path_buf(), log.path().to_path_buf()];
        let dropped = state.retain(|p| !is_durable(&durable, p));
        if dropped > 0 {
            warn!(dropped, "removed durable files from the state table");
        }
        Self {
            digest,
            state,
            log,
            durable,
        }
    }

    pub fn from_settings(settings: &MonitorSettings) -> Self {
        Self::new(
            DigestEngine::new(settings.algorithm),
            StateStore::open(&settings.state_file),
            EventLog::open(&settings.log_file),
        )
    }

    pub fn state(&self) -> &StateStore {
        &self.state
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.digest.algorithm()
    }

    pub fn is_self_referential(&self, path: &Path) -> bool {
        is_durable(&self.durable, path)
    }

    /// Classify one notification. Returns the appended entries in order;
    /// empty when the notification was ignored or changed nothing. Only
    /// persistence failures are errors.
    pub fn handle(&mut self, notification: &Notification) -> Result<Vec<LogEntry>> {
        let path = notification.path.as_path();
        if self.is_self_referential(path) {
            trace!(path = %path.display(), "ignoring notification for durable file");
            return Ok(Vec::new());
        }
        if path.to_str().is_none() {
            warn!(path = %path.display(), "skipping path that is not valid UTF-8");
            return Ok(Vec::new());
        }
        if notification.is_dir {
            return match notification.kind {
                NotificationKind::Deleted => self.on_dir_deleted(path),
                _ => {
                    trace!(path = %path.display(), "ignoring directory notification");
                    Ok(Vec::new())
                }
            };
        }

        match notification.kind {
            NotificationKind::Created => self.on_created(path).map(|e| vec![e]),
            NotificationKind::Deleted => self.on_deleted(path),
            NotificationKind::Modified => self.on_modified(path).map(Vec::from_iter),
        }
    }

    fn on_created(&mut self, path: &Path) -> Result<LogEntry> {
        let digest = self.digest.digest(path);
        self.state.put(path, digest.clone());
        let entry = self.log.record(EventKind::Created, path, digest)?;
        self.state.persist()?;
        info!(path = %path.display(), hash = ?entry.hash.as_ref().map(|h| h.as_str()), "file created");
        Ok(entry)
    }

    fn on_deleted(&mut self, path: &Path) -> Result<Vec<LogEntry>> {
        if self.state.remove(path) {
            self.state.persist()?;
        } else if self.state.has_descendants(path) {
            // Some backends report a removed directory without the folder flag.
            return self.on_dir_deleted(path);
        } else {
            debug!(path = %path.display(), "deleted path was never tracked");
        }
        let entry = self.log.record(EventKind::Deleted, path, None)?;
        info!(path = %path.display(), "file deleted");
        Ok(vec![entry])
    }

    /// A directory left the tree: every tracked file below it is gone too.
    /// The directory itself is never logged.
    fn on_dir_deleted(&mut self, dir: &Path) -> Result<Vec<LogEntry>> {
        let removed = self.state.remove_under(dir);
        if removed.is_empty() {
            trace!(path = %dir.display(), "directory held no tracked files");
            return Ok(Vec::new());
        }
        self.state.persist()?;
        let mut entries = Vec::with_capacity(removed.len());
        for path in &removed {
            entries.push(self.log.record(EventKind::Deleted, path, None)?);
        }
        info!(path = %dir.display(), files = entries.len(), "directory deleted");
        Ok(entries)
    }

    fn on_modified(&mut self, path: &Path) -> Result<Option<LogEntry>> {
        let Some(digest) = self.digest.digest(path) else {
            return Ok(None);
        };
        if self.state.get(path) == Some(&digest) {
            trace!(path = %path.display(), "content unchanged");
            return Ok(None);
        }
        self.state.put(path, Some(digest.clone()));
        let entry = self.log.record(EventKind::Modified, path, Some(digest))?;
        self.state.persist()?;
        info!(path = %path.display(), hash = %entry.hash.as_ref().map(|h| h.as_str()).unwrap_or_default(), "file modified");
        Ok(Some(entry))
    }
}

fn is_durable(durable: &[PathBuf; 2], path: &Path) -> bool {
    durable
        .iter()
        .any(|d| d.as_path() == path || is_scratch_for(path, d))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::FileDigest;
    use std::fs;
    use tempfile::tempdir;

    fn classifier(dir: &Path) -> Classifier {
        Classifier::new(
            DigestEngine::default(),
            StateStore::open(dir.join("file_hashes.json")),
            EventLog::open(dir.join("file_log.json")),
        )
    }

    #[test]
    fn stale_durable_entries_are_dropped_on_start() {
        let dir = tempdir().unwrap();
        let state_path = dir.path().join("file_hashes.json");
        let mut seeded = StateStore::open(&state_path);
        seeded.put(&state_path, None);
        seeded.put(&dir.path().join("file_log.json"), None);
        seeded.put(&dir.path().join("keep.txt"), None);
        seeded.persist().unwrap();

        let c = classifier(dir.path());
        assert_eq!(c.state().len(), 1);
        assert!(c.state().contains(&dir.path().join("keep.txt")));
    }

    #[test]
    fn unreadable_created_file_is_tracked_with_null_digest() {
        let dir = tempdir().unwrap();
        let mut c = classifier(dir.path());
        let ghost = dir.path().join("ghost.txt");

        let entry = c.handle(&Notification::created(&ghost)).unwrap().remove(0);
        assert_eq!(entry.event, EventKind::Created);
        assert!(entry.hash.is_none());
        assert!(c.state().contains(&ghost));
        assert!(c.state().get(&ghost).is_none());
    }

    #[test]
    fn modified_after_null_digest_is_logged() {
        let dir = tempdir().unwrap();
        let mut c = classifier(dir.path());
        let file = dir.path().join("late.txt");
        c.handle(&Notification::created(&file)).unwrap();

        fs::write(&file, b"now readable").unwrap();
        let entry = c.handle(&Notification::modified(&file)).unwrap().remove(0);
        assert_eq!(
            entry.hash,
            Some(FileDigest::of_bytes(HashAlgorithm::Sha256, b"now readable"))
        );
    }

    #[test]
    fn scratch_files_are_self_referential() {
        let dir = tempdir().unwrap();
        let c = classifier(dir.path());
        assert!(c.is_self_referential(&dir.path().join(".fim-persist-Ab12Cd")));
        assert!(c.is_self_referential(&dir.path().join("file_log.json")));
        assert!(!c.is_self_referential(&dir.path().join("notes.txt")));
    }

    #[test]
    fn reports_configured_algorithm() {
        let dir = tempdir().unwrap();
        let c = Classifier::new(
            DigestEngine::new(HashAlgorithm::Blake3),
            StateStore::open(dir.path().join("file_hashes.json")),
            EventLog::open(dir.path().join("file_log.json")),
        );
        assert_eq!(c.algorithm(), HashAlgorithm::Blake3);
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_paths_are_skipped() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = tempdir().unwrap();
        let mut c = classifier(dir.path());
        let odd = dir.path().join(OsStr::from_bytes(b"caf\xe9.txt"));

        for n in [
            Notification::created(&odd),
            Notification::modified(&odd),
            Notification::deleted(&odd),
        ] {
            assert!(c.handle(&n).unwrap().is_empty());
        }
        assert!(c.state().is_empty());
        assert!(c.log().entries().is_empty());
    }
}
