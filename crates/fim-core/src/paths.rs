use crate::error::{FimError, Result};
use directories::ProjectDirs;
use std::path::PathBuf;

pub const APP_QUALIFIER: &str = "com";
pub const APP_ORG: &str = "fim";
pub const APP_NAME: &str = "fim";

pub const STATE_FILE_NAME: &str = "file_hashes.json";
pub const LOG_FILE_NAME: &str = "file_log.json";
pub const WATCHED_DIR_NAME: &str = "watched";

pub fn data_dir() -> Result<PathBuf> {
    if let Ok(override_path) = std::env::var("FIM_DATA_DIR") {
        if !override_path.is_empty() {
            return Ok(PathBuf::from(override_path));
        }
    }
    let dirs = ProjectDirs::from(APP_QUALIFIER, APP_ORG, APP_NAME).ok_or(FimError::DataDir)?;
    Ok(dirs.data_dir().to_path_buf())
}
