//! Real-time file system watcher using the `notify` crate.
//!
//! The notify callback runs on the backend's own thread. A bridge thread
//! turns raw events into `Notification`s and forwards them, in order, to a
//! single async consumer.
//!
//! A removed or renamed-away path no longer exists, so its type cannot be
//! read back from disk. The bridge remembers which paths it last saw as
//! directories and answers from that instead.

use anyhow::{Context, Result};
use fim_core::notification::{Notification, NotificationKind};
use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tracing::{debug, error, info, trace};
use walkdir::WalkDir;

/// Rename trackers whose paired event never arrived are forgotten past this.
const MAX_PENDING_RENAMES: usize = 4096;

enum BridgeMsg {
    Event(notify::Result<Event>),
    Seed { root: PathBuf, recursive: bool },
}

/// FileWatcher watches the monitored tree for changes. Dropping it stops the
/// subscription and closes the notification channel.
pub struct FileWatcher {
    watcher: RecommendedWatcher,
    bridge: mpsc::Sender<BridgeMsg>,
}

impl FileWatcher {
    pub fn new() -> Result<(Self, UnboundedReceiver<Notification>)> {
        let (change_tx, change_rx) = unbounded_channel();
        let (bridge_tx, bridge_rx) = mpsc::channel::<BridgeMsg>();

        let event_tx = bridge_tx.clone();
        let watcher = RecommendedWatcher::new(
            move |res| {
                let _ = event_tx.send(BridgeMsg::Event(res));
            },
            Config::default(),
        )
        .context("cannot create file watcher")?;

        std::thread::Builder::new()
            .name("fim-watch-bridge".into())
            .spawn(move || {
                let mut mapper = EventMapper::new();
                loop {
                    match bridge_rx.recv() {
                        Ok(BridgeMsg::Seed { root, recursive }) => mapper.seed(&root, recursive),
                        Ok(BridgeMsg::Event(Ok(event))) => {
                            for notification in mapper.map(&event) {
                                if change_tx.send(notification).is_err() {
                                    debug!("monitor dropped, stopping watcher bridge");
                                    return;
                                }
                            }
                        }
                        Ok(BridgeMsg::Event(Err(e))) => {
                            error!("File watcher error: {}", e);
                        }
                        Err(_) => {
                            debug!("Watcher channel closed");
                            return;
                        }
                    }
                }
            })
            .context("cannot spawn watcher bridge thread")?;

        Ok((
            Self {
                watcher,
                bridge: bridge_tx,
            },
            change_rx,
        ))
    }

    pub fn watch(&mut self, root: &Path, recursive: bool) -> Result<()> {
        // Queued ahead of any event from the new watch.
        self.bridge
            .send(BridgeMsg::Seed {
                root: root.to_path_buf(),
                recursive,
            })
            .context("watcher bridge is gone")?;

        let mode = if recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        self.watcher
            .watch(root, mode)
            .with_context(|| format!("cannot watch {}", root.display()))?;
        info!(path = %root.display(), recursive, "watching");
        Ok(())
    }
}

/// Maps notify events onto notifications.
///
/// Backends that pair rename halves (inotify) report `From`, then `To`, then
/// a `Both` carrying the same tracker. Only the halves are mapped; the
/// matching `Both` is dropped so one rename yields one delete and one create.
#[derive(Debug)]
pub struct EventMapper {
    known_dirs: HashSet<PathBuf>,
    renames: HashSet<usize>,
    recursive: bool,
}

impl Default for EventMapper {
    fn default() -> Self {
        Self::new()
    }
}

impl EventMapper {
    pub fn new() -> Self {
        Self {
            known_dirs: HashSet::new(),
            renames: HashSet::new(),
            recursive: true,
        }
    }

    /// Remember the directories already present under `root`.
    pub fn seed(&mut self, root: &Path, recursive: bool) {
        self.recursive = recursive;
        let mut walker = WalkDir::new(root).follow_links(false);
        if !recursive {
            walker = walker.max_depth(1);
        }
        for entry in walker.into_iter().filter_map(|e| e.ok()) {
            if entry.file_type().is_dir() {
                self.known_dirs.insert(entry.into_path());
            }
        }
        debug!(path = %root.display(), dirs = self.known_dirs.len(), "watcher seeded");
    }

    pub fn is_known_dir(&self, path: &Path) -> bool {
        self.known_dirs.contains(path)
    }

    pub fn map(&mut self, event: &Event) -> Vec<Notification> {
        let mut out = Vec::new();

        match &event.kind {
            EventKind::Create(kind) => {
                for path in &event.paths {
                    let is_dir = match kind {
                        CreateKind::Folder => true,
                        CreateKind::File => false,
                        _ => path.is_dir(),
                    };
                    if is_dir {
                        self.known_dirs.insert(path.clone());
                    } else {
                        self.known_dirs.remove(path);
                    }
                    out.push(notification(NotificationKind::Created, path, is_dir));
                }
            }
            EventKind::Modify(ModifyKind::Metadata(_)) => {}
            EventKind::Modify(ModifyKind::Name(mode)) => match mode {
                RenameMode::From => {
                    self.note_rename(event);
                    for path in &event.paths {
                        self.moved_out(path, &mut out);
                    }
                }
                RenameMode::To => {
                    self.note_rename(event);
                    for path in &event.paths {
                        self.moved_in(path, &mut out);
                    }
                }
                RenameMode::Both if event.paths.len() >= 2 => {
                    if let Some(tracker) = event.tracker() {
                        if self.renames.remove(&tracker) {
                            trace!(tracker, "rename already mapped from its halves");
                            return out;
                        }
                    }
                    self.moved_out(&event.paths[0], &mut out);
                    self.moved_in(&event.paths[1], &mut out);
                }
                // Backends that cannot tell which side of a rename they saw.
                _ => {
                    for path in &event.paths {
                        if path.exists() {
                            self.moved_in(path, &mut out);
                        } else {
                            self.moved_out(path, &mut out);
                        }
                    }
                }
            },
            EventKind::Modify(_) => {
                for path in &event.paths {
                    out.push(notification(NotificationKind::Modified, path, path.is_dir()));
                }
            }
            EventKind::Remove(kind) => {
                for path in &event.paths {
                    // inotify reports a watched directory's own removal
                    // without the folder flag.
                    let is_dir = matches!(kind, RemoveKind::Folder) || self.is_known_dir(path);
                    if is_dir {
                        self.forget_below(path);
                    }
                    out.push(notification(NotificationKind::Deleted, path, is_dir));
                }
            }
            EventKind::Access(_) | EventKind::Any | EventKind::Other => {}
        }

        out
    }

    fn note_rename(&mut self, event: &Event) {
        let Some(tracker) = event.tracker() else {
            return;
        };
        if self.renames.len() >= MAX_PENDING_RENAMES {
            debug!(pending = self.renames.len(), "dropping unpaired rename trackers");
            self.renames.clear();
        }
        self.renames.insert(tracker);
    }

    /// The path itself stays known: inotify follows a moved directory with
    /// an untracked `From` for that same path.
    fn moved_out(&mut self, path: &Path, out: &mut Vec<Notification>) {
        let is_dir = self.is_known_dir(path);
        if is_dir {
            self.forget_below(path);
        }
        out.push(notification(NotificationKind::Deleted, path, is_dir));
    }

    /// A directory renamed into the tree brings its files with it, and no
    /// backend reports those individually.
    fn moved_in(&mut self, path: &Path, out: &mut Vec<Notification>) {
        if !path.is_dir() {
            self.known_dirs.remove(path);
            out.push(notification(NotificationKind::Created, path, false));
            return;
        }
        self.known_dirs.insert(path.to_path_buf());
        out.push(notification(NotificationKind::Created, path, true));
        if !self.recursive {
            return;
        }
        let walker = WalkDir::new(path)
            .min_depth(1)
            .follow_links(false)
            .sort_by_file_name();
        for entry in walker.into_iter().filter_map(|e| e.ok()) {
            if entry.file_type().is_dir() {
                self.known_dirs.insert(entry.into_path());
            } else if entry.file_type().is_file() {
                out.push(notification(NotificationKind::Created, entry.path(), false));
            }
        }
    }

    fn forget_below(&mut self, dir: &Path) {
        self.known_dirs.retain(|d| d == dir || !d.starts_with(dir));
    }
}

fn notification(kind: NotificationKind, path: &Path, is_dir: bool) -> Notification {
    Notification {
        path: path.to_path_buf(),
        is_dir,
        kind,
    }
}
