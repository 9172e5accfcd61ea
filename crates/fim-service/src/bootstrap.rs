//! Prepare the on-disk layout before monitoring starts.

use anyhow::{Context, Result};
use fim_core::persist::write_atomic;
use fim_core::settings::MonitorSettings;
use std::fs;
use std::path::Path;
use tracing::info;

const EMPTY_STATE: &[u8] = b"{}";
const EMPTY_LOG: &[u8] = b"[]";

/// Create the watched directory and seed missing durable files with empty
/// content. Existing files are left untouched.
pub fn ensure_layout(settings: &MonitorSettings) -> Result<()> {
    fs::create_dir_all(&settings.watched_dir).with_context(|| {
        format!("cannot create watched dir {}", settings.watched_dir.display())
    })?;
    seed(&settings.state_file, EMPTY_STATE)?;
    seed(&settings.log_file, EMPTY_LOG)?;
    Ok(())
}

fn seed(path: &Path, empty: &[u8]) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("cannot create {}", parent.display()))?;
    }
    write_atomic(path, empty)?;
    info!(path = %path.display(), "created durable file");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn seeds_missing_files() {
        let dir = tempdir().unwrap();
        let settings = MonitorSettings::in_data_dir(dir.path().join("nested/data"));
        ensure_layout(&settings).unwrap();

        assert!(settings.watched_dir.is_dir());
        assert_eq!(fs::read(&settings.state_file).unwrap(), b"{}");
        assert_eq!(fs::read(&settings.log_file).unwrap(), b"[]");
    }

    #[test]
    fn keeps_existing_files() {
        let dir = tempdir().unwrap();
        let settings = MonitorSettings::in_data_dir(dir.path());
        fs::write(&settings.log_file, b"[{\"keep\": true}]").unwrap();
        ensure_layout(&settings).unwrap();
        assert_eq!(fs::read(&settings.log_file).unwrap(), b"[{\"keep\": true}]");
    }
}
