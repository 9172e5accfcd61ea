//! Whole-file durable writes.
//!
//! Content is written to a scratch file next to the target and renamed over
//! it, so a crash mid-write leaves the previous complete file in place. The
//! scratch file is removed when the write fails before the rename.

use crate::error::{FimError, Result};
use std::io::Write;
use std::path::Path;
use tempfile::Builder;

/// Name prefix of scratch files created during a durable write.
pub const SCRATCH_PREFIX: &str = ".fim-persist-";

/// Replace the file at `path` with `contents`.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = Builder::new()
        .prefix(SCRATCH_PREFIX)
        .tempfile_in(dir)
        .map_err(|e| FimError::persist(path, e))?;
    tmp.write_all(contents)
        .map_err(|e| FimError::persist(path, e))?;
    tmp.flush().map_err(|e| FimError::persist(path, e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| FimError::persist(path, e))?;
    tmp.persist(path).map_err(|e| FimError::persist(path, e.error))?;
    Ok(())
}

/// Serialize `value` as pretty JSON and write it durably.
pub fn write_json<T: serde::Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_vec_pretty(value)?;
    write_atomic(path, &json)
}

/// True for scratch files that `write_atomic` creates beside `target`.
pub fn is_scratch_for(candidate: &Path, target: &Path) -> bool {
    let named_scratch = candidate
        .file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with(SCRATCH_PREFIX))
        .unwrap_or(false);
    named_scratch && candidate.parent() == target.parent()
}
