use anyhow::{Context, Result};
use clap::Args;
use fim_core::digest::HashAlgorithm;
use fim_core::paths;
use fim_core::settings::MonitorSettings;
use std::path::PathBuf;

/// Flags shared by every subcommand that needs monitor settings.
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// JSON settings file
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Directory tree to monitor
    #[arg(long)]
    pub watch: Option<PathBuf>,
    /// Directory holding the state and log files
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
}

/// Flags that only matter while monitoring.
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Digest algorithm: sha256 or blake3
    #[arg(long)]
    pub algorithm: Option<HashAlgorithm>,
    /// Do not echo events to stdout
    #[arg(long)]
    pub quiet: bool,
    /// Only watch the top-level directory
    #[arg(long)]
    pub non_recursive: bool,
}

impl ConfigArgs {
    /// Settings file (or defaults), then command-line overrides.
    pub fn settings(&self) -> Result<MonitorSettings> {
        let mut settings = match &self.config {
            Some(path) => MonitorSettings::load(path)?,
            None => {
                let data = match &self.data_dir {
                    Some(d) => d.clone(),
                    None => paths::data_dir().context("cannot determine data directory")?,
                };
                MonitorSettings::in_data_dir(data)
            }
        };
        if let Some(data) = &self.data_dir {
            settings.state_file = data.join(paths::STATE_FILE_NAME);
            settings.log_file = data.join(paths::LOG_FILE_NAME);
        }
        if let Some(watch) = &self.watch {
            settings.watched_dir = watch.clone();
        }
        settings.validate()?;
        Ok(settings)
    }
}

impl RunArgs {
    pub fn apply(&self, settings: &mut MonitorSettings) {
        if let Some(algorithm) = self.algorithm {
            settings.algorithm = algorithm;
        }
        if self.quiet {
            settings.echo_events = false;
        }
        if self.non_recursive {
            settings.recursive = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn data_dir_overrides_durable_paths() {
        let dir = tempdir().unwrap();
        let args = ConfigArgs {
            config: None,
            watch: Some(dir.path().join("w")),
            data_dir: Some(dir.path().join("d")),
        };
        let s = args.settings().unwrap();
        assert_eq!(s.watched_dir, dir.path().join("w"));
        assert_eq!(s.state_file, dir.path().join("d").join(paths::STATE_FILE_NAME));
        assert_eq!(s.log_file, dir.path().join("d").join(paths::LOG_FILE_NAME));
    }

    #[test]
    fn flags_override_config_file() {
        let dir = tempdir().unwrap();
        let cfg = dir.path().join("fim.json");
        fs::write(
            &cfg,
            br#"{"watched_dir": "/from/file", "state_file": "/s/h.json", "log_file": "/s/l.json", "echo_events": true}"#,
        )
        .unwrap();
        let args = ConfigArgs {
            config: Some(cfg),
            watch: Some(PathBuf::from("/from/flag")),
            data_dir: None,
        };
        let mut s = args.settings().unwrap();
        assert_eq!(s.watched_dir, PathBuf::from("/from/flag"));
        assert_eq!(s.state_file, PathBuf::from("/s/h.json"));

        RunArgs {
            algorithm: Some(HashAlgorithm::Blake3),
            quiet: true,
            non_recursive: false,
        }
        .apply(&mut s);
        assert_eq!(s.algorithm, HashAlgorithm::Blake3);
        assert!(!s.echo_events);
        assert!(s.recursive);
    }
}
