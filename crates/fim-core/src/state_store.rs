//! Durable path → digest table.

use crate::digest::FileDigest;
use crate::error::Result;
use crate::persist::write_json;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Last-known digest per watched path. A `None` value records a file that
/// was seen but could not be hashed.
pub type DigestMap = BTreeMap<String, Option<FileDigest>>;

#[derive(Debug)]
pub struct StateStore {
    path: PathBuf,
    hashes: DigestMap,
}

impl StateStore {
    /// Open the store backed by `path`, recovering to an empty table when
    /// the file is missing or does not parse.
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let hashes = Self::load(&path);
        Self { path, hashes }
    }

    pub fn load(path: &Path) -> DigestMap {
        let raw = match fs::read(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no state file yet, starting empty");
                return DigestMap::new();
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "state file unreadable, starting empty");
                return DigestMap::new();
            }
        };
        match serde_json::from_slice(&raw) {
            Ok(map) => map,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "state file corrupt, starting empty");
                DigestMap::new()
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, path: &Path) -> Option<&FileDigest> {
        self.hashes.get(&key(path)).and_then(|d| d.as_ref())
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.hashes.contains_key(&key(path))
    }

    pub fn put(&mut self, path: &Path, digest: Option<FileDigest>) {
        self.hashes.insert(key(path), digest);
    }

    /// Returns whether an entry was present.
    pub fn remove(&mut self, path: &Path) -> bool {
        self.hashes.remove(&key(path)).is_some()
    }

    /// True when some tracked path lies strictly below `dir`.
    pub fn has_descendants(&self, dir: &Path) -> bool {
        self.hashes.keys().any(|k| is_below(Path::new(k), dir))
    }

    /// Remove every entry strictly below `dir`; returns the removed paths in
    /// key order.
    pub fn remove_under(&mut self, dir: &Path) -> Vec<PathBuf> {
        let removed: Vec<String> = self
            .hashes
            .keys()
            .filter(|k| is_below(Path::new(k), dir))
            .cloned()
            .collect();
        for k in &removed {
            self.hashes.remove(k);
        }
        removed.into_iter().map(PathBuf::from).collect()
    }

    /// Keep only entries for which `keep` holds; returns how many were dropped.
    pub fn retain<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(&Path) -> bool,
    {
        let before = self.hashes.len();
        self.hashes.retain(|k, _| keep(Path::new(k)));
        before - self.hashes.len()
    }

    pub fn persist(&self) -> Result<()> {
        write_json(&self.path, &self.hashes)?;
        debug!(path = %self.path.display(), entries = self.hashes.len(), "state saved");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&FileDigest>)> {
        self.hashes.iter().map(|(k, v)| (k.as_str(), v.as_ref()))
    }
}

// Callers only pass UTF-8 paths; the classifier drops the rest.
fn key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn is_below(candidate: &Path, dir: &Path) -> bool {
    candidate != dir && candidate.starts_with(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::HashAlgorithm;
    use tempfile::tempdir;

    fn digest(data: &[u8]) -> FileDigest {
        FileDigest::of_bytes(HashAlgorithm::Sha256, data)
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempdir().unwrap();
        let store = StateStore::open(dir.path().join("file_hashes.json"));
        assert!(store.is_empty());
    }

    #[test]
    fn corrupt_file_loads_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("file_hashes.json");
        fs::write(&path, b"{\"/a\": \"dead").unwrap();
        let store = StateStore::open(&path);
        assert!(store.is_empty());
    }

    #[test]
    fn persisted_table_reloads() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("file_hashes.json");
        let mut store = StateStore::open(&path);
        store.put(Path::new("/w/a.txt"), Some(digest(b"a")));
        store.put(Path::new("/w/b.txt"), None);
        store.persist().unwrap();

        let reloaded = StateStore::open(&path);
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.get(Path::new("/w/a.txt")), Some(&digest(b"a")));
        assert!(reloaded.contains(Path::new("/w/b.txt")));
        assert_eq!(reloaded.get(Path::new("/w/b.txt")), None);

        let on_disk: serde_json::Value =
            serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert!(on_disk["/w/b.txt"].is_null());
        assert_eq!(on_disk["/w/a.txt"], digest(b"a").as_str());
    }

    #[test]
    fn remove_untracked_is_noop() {
        let dir = tempdir().unwrap();
        let mut store = StateStore::open(dir.path().join("s.json"));
        store.put(Path::new("/w/a"), Some(digest(b"a")));
        assert!(!store.remove(Path::new("/w/zzz")));
        assert!(store.remove(Path::new("/w/a")));
        assert!(store.is_empty());
    }

    #[test]
    fn remove_under_matches_whole_components() {
        let dir = tempdir().unwrap();
        let mut store = StateStore::open(dir.path().join("s.json"));
        store.put(Path::new("/w/sub/a"), None);
        store.put(Path::new("/w/sub/deep/b"), None);
        store.put(Path::new("/w/subway"), None);
        assert!(store.has_descendants(Path::new("/w/sub")));
        assert!(!store.has_descendants(Path::new("/w/subway")));

        let removed = store.remove_under(Path::new("/w/sub"));
        assert_eq!(
            removed,
            vec![PathBuf::from("/w/sub/a"), PathBuf::from("/w/sub/deep/b")]
        );
        assert_eq!(store.len(), 1);
        assert!(store.contains(Path::new("/w/subway")));
    }

    #[test]
    fn retain_reports_dropped_entries() {
        let dir = tempdir().unwrap();
        let mut store = StateStore::open(dir.path().join("s.json"));
        store.put(Path::new("/w/a"), None);
        store.put(Path::new("/w/b"), None);
        let dropped = store.retain(|p| p != Path::new("/w/a"));
        assert_eq!(dropped, 1);
        assert!(!store.contains(Path::new("/w/a")));
    }
}
