use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Coarse kind of a raw change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Created,
    Modified,
    Deleted,
}

/// A raw change notification from whatever watches the tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub path: PathBuf,
    pub is_dir: bool,
    pub kind: NotificationKind,
}

impl Notification {
    pub fn file(kind: NotificationKind, path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            is_dir: false,
            kind,
        }
    }

    pub fn dir(kind: NotificationKind, path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            is_dir: true,
            kind,
        }
    }

    pub fn created(path: impl Into<PathBuf>) -> Self {
        Self::file(NotificationKind::Created, path)
    }

    pub fn modified(path: impl Into<PathBuf>) -> Self {
        Self::file(NotificationKind::Modified, path)
    }

    pub fn deleted(path: impl Into<PathBuf>) -> Self {
        Self::file(NotificationKind::Deleted, path)
    }
}
