use crate::digest::HashAlgorithm;
use crate::error::{FimError, Result};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Where to watch, where to keep durable state, and how to hash.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MonitorSettings {
    pub watched_dir: PathBuf,
    pub state_file: PathBuf,
    pub log_file: PathBuf,
    pub algorithm: HashAlgorithm,
    /// Mirror every classified event to stdout.
    pub echo_events: bool,
    pub recursive: bool,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self::in_data_dir(paths::data_dir().unwrap_or_else(|_| PathBuf::from(".")))
    }
}

impl MonitorSettings {
    /// Defaults rooted at `data_dir`.
    pub fn in_data_dir(data_dir: impl AsRef<Path>) -> Self {
        let data_dir = data_dir.as_ref();
        Self {
            watched_dir: data_dir.join(paths::WATCHED_DIR_NAME),
            state_file: data_dir.join(paths::STATE_FILE_NAME),
            log_file: data_dir.join(paths::LOG_FILE_NAME),
            algorithm: HashAlgorithm::default(),
            echo_events: true,
            recursive: true,
        }
    }

    /// Load settings from a JSON file; absent fields keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read(path).map_err(|e| {
            FimError::Settings(format!("cannot read {}: {e}", path.display()))
        })?;
        let settings: Self = serde_json::from_slice(&raw).map_err(|e| {
            FimError::Settings(format!("cannot parse {}: {e}", path.display()))
        })?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.state_file == self.log_file {
            return Err(FimError::Settings(
                "state file and log file must be different paths".into(),
            ));
        }
        if self.state_file.file_name().is_none() || self.log_file.file_name().is_none() {
            return Err(FimError::Settings("durable file paths must name a file".into()));
        }
        if self.watched_dir.as_os_str().is_empty() {
            return Err(FimError::Settings("watched directory must be set".into()));
        }
        Ok(())
    }

    /// Canonicalize every path so they compare equal to the absolute paths
    /// the watcher reports. The paths must exist; run bootstrap first.
    pub fn resolve(&self) -> Result<Self> {
        let canon = |p: &Path| {
            fs::canonicalize(p).map_err(|e| {
                FimError::Settings(format!("cannot resolve {}: {e}", p.display()))
            })
        };
        Ok(Self {
            watched_dir: canon(&self.watched_dir)?,
            state_file: canon(&self.state_file)?,
            log_file: canon(&self.log_file)?,
            ..self.clone()
        })
    }
}
