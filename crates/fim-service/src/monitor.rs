//! Single-consumer monitor loop.
//!
//! Receives notifications from the watcher bridge and hands them to the
//! classifier one at a time, in delivery order. Classified events are
//! optionally mirrored as JSON lines to a writer (stdout in the service).

use fim_core::classifier::Classifier;
use fim_core::event_log::LogEntry;
use fim_core::notification::Notification;
use fim_core::Result;
use std::io::Write;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MonitorStats {
    pub received: u64,
    pub recorded: u64,
}

pub struct Monitor<W: Write> {
    classifier: Classifier,
    echo: Option<W>,
    stats: MonitorStats,
}

impl<W: Write> Monitor<W> {
    pub fn new(classifier: Classifier, echo: Option<W>) -> Self {
        Self {
            classifier,
            echo,
            stats: MonitorStats::default(),
        }
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn stats(&self) -> MonitorStats {
        self.stats
    }

    pub fn into_echo(self) -> Option<W> {
        self.echo
    }

    /// Classify one notification and echo the resulting entries.
    pub fn process(&mut self, notification: &Notification) -> Result<Vec<LogEntry>> {
        self.stats.received += 1;
        let entries = self.classifier.handle(notification)?;
        self.stats.recorded += entries.len() as u64;
        for entry in &entries {
            self.echo(entry);
        }
        Ok(entries)
    }

    fn echo(&mut self, entry: &LogEntry) {
        let Some(out) = self.echo.as_mut() else {
            return;
        };
        let written = serde_json::to_string(entry)
            .map_err(std::io::Error::from)
            .and_then(|line| writeln!(out, "{line}"))
            .and_then(|_| out.flush());
        if let Err(e) = written {
            warn!(error = %e, "cannot echo event");
        }
    }

    /// Drain notifications until the channel closes or shutdown is signalled.
    /// The in-flight notification always completes; a persistence failure
    /// ends the loop with an error.
    pub async fn run(
        &mut self,
        mut rx: mpsc::UnboundedReceiver<Notification>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<MonitorStats> {
        info!(
            tracked = self.classifier.state().len(),
            algorithm = ?self.classifier.algorithm(),
            "monitor started"
        );
        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                next = rx.recv() => {
                    match next {
                        Some(notification) => {
                            self.process(&notification)?;
                        }
                        None => {
                            debug!("notification channel closed, monitor exiting");
                            break;
                        }
                    }
                }
            }
        }
        info!(
            received = self.stats.received,
            recorded = self.stats.recorded,
            "monitor stopped"
        );
        Ok(self.stats)
    }
}
