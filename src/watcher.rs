//! Source directory watching and the sequential event loop
//!
//! notify delivers events on its own thread; they are forwarded into an
//! unbounded channel and consumed by a single task. Each event is processed to
//! completion (settle, upload, relocate) before the next one is received.

use crate::config::WatchConfig;
use crate::error::{BgWatchError, Result};
use crate::relocate::relocate;
use crate::settle::{SettleOutcome, SettlePolicy};
use crate::upload::FileProcessor;
use chrono::{DateTime, Utc};
use notify::event::{ModifyKind, RenameMode};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::Instrument;

/// An entry that appeared in the source directory (created or moved in)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchedFile {
    /// Path as reported by the watcher
    pub path: PathBuf,
    /// When the creation event was received
    pub detected_at: DateTime<Utc>,
}

impl WatchedFile {
    /// Wrap a path, stamping it with the current time
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            detected_at: Utc::now(),
        }
    }
}

/// Message forwarded from the watcher thread
#[derive(Debug, Clone)]
pub enum WatchMessage {
    /// Something was created in or moved into the source directory
    Created(WatchedFile),
    /// The watcher reported an error while running
    Error(String),
}

/// Keeps the notify watcher alive; dropping it stops event delivery
pub struct DirectoryWatcher {
    _watcher: RecommendedWatcher,
    root: PathBuf,
}

impl DirectoryWatcher {
    /// Start watching `source` (non-recursive)
    ///
    /// # Errors
    /// - Watcher could not be created
    /// - `source` could not be added to the watch list
    pub fn new(source: &Path) -> Result<(Self, mpsc::UnboundedReceiver<WatchMessage>)> {
        let (tx, rx) = mpsc::unbounded_channel();

        let mut filter = NewFileFilter::default();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            let messages = match res {
                Ok(event) => filter.messages(event),
                Err(e) => vec![WatchMessage::Error(e.to_string())],
            };
            for message in messages {
                // Receiver gone means the loop has stopped
                let _ = tx.send(message);
            }
        })
        .map_err(|e| BgWatchError::watch(format!("Failed to create watcher: {e}")))?;

        watcher
            .watch(source, RecursiveMode::NonRecursive)
            .map_err(|e| {
                BgWatchError::watch(format!("Failed to watch '{}': {e}", source.display()))
            })?;

        tracing::info!(dir = %source.display(), "Watching for new files");

        Ok((
            Self {
                _watcher: watcher,
                root: source.to_path_buf(),
            },
            rx,
        ))
    }

    /// Directory being watched
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Turns raw notify events into loop messages
///
/// Creations and renames into the directory count as new files. A `Both`
/// rename carries `[from, to]`; only the destination is kept. inotify reports
/// an in-directory rename as `To` followed by `Both` for the same path, so a
/// `Both` repeating the last `To` is dropped.
#[derive(Debug, Default)]
struct NewFileFilter {
    last_moved_in: Option<PathBuf>,
}

impl NewFileFilter {
    fn messages(&mut self, event: notify::Event) -> Vec<WatchMessage> {
        let paths: Vec<PathBuf> = match event.kind {
            EventKind::Create(_) => {
                self.last_moved_in = None;
                event.paths
            },
            EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
                self.last_moved_in = event.paths.last().cloned();
                event.paths
            },
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
                let target = event.paths.into_iter().last();
                if target.is_some() && target == self.last_moved_in.take() {
                    return Vec::new();
                }
                target.into_iter().collect()
            },
            _ => return Vec::new(),
        };
        paths
            .into_iter()
            .map(|path| WatchMessage::Created(WatchedFile::new(path)))
            .collect()
    }
}

/// Why an event was not processed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The created entry is a directory
    Directory,
    /// The entry disappeared before it could be inspected
    Vanished,
}

/// What happened to one watched file
#[derive(Debug)]
pub enum EventOutcome {
    /// Not a candidate for upload
    Skipped(SkipReason),
    /// Uploaded, result written, original archived
    Processed {
        /// Result file in the processed directory
        output: PathBuf,
        /// New location of the original
        archived: PathBuf,
    },
    /// Uploaded and result written, but the original could not be moved
    ProcessedNotArchived {
        /// Result file in the processed directory
        output: PathBuf,
        /// Relocation failure
        error: BgWatchError,
    },
    /// Upload pipeline failed; the original stays in the source directory
    Failed(BgWatchError),
}

/// Counters reported when the loop ends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub processed: usize,
    pub not_archived: usize,
    pub failed: usize,
    pub skipped: usize,
    pub watch_errors: usize,
}

impl LoopStats {
    fn record(&mut self, outcome: &EventOutcome) {
        match outcome {
            EventOutcome::Skipped(_) => self.skipped += 1,
            EventOutcome::Processed { .. } => self.processed += 1,
            EventOutcome::ProcessedNotArchived { .. } => self.not_archived += 1,
            EventOutcome::Failed(_) => self.failed += 1,
        }
    }
}

/// Sequential consumer of watch events
pub struct WatchLoop<P: FileProcessor> {
    processor: P,
    settle: SettlePolicy,
    destination: PathBuf,
}

impl<P: FileProcessor> WatchLoop<P> {
    /// Create a loop that archives processed originals into `destination`
    pub fn new<D: Into<PathBuf>>(processor: P, settle: SettlePolicy, destination: D) -> Self {
        Self {
            processor,
            settle,
            destination: destination.into(),
        }
    }

    /// Create a loop using the settle policy and destination from `config`
    pub fn from_config(processor: P, config: &WatchConfig) -> Self {
        Self::new(processor, config.settle, config.directories.destination.clone())
    }

    /// Consume messages until the channel closes
    ///
    /// Each creation is handled fully before the next message is received.
    /// Watcher errors are logged and never stop the loop.
    pub async fn run(&self, mut messages: mpsc::UnboundedReceiver<WatchMessage>) -> LoopStats {
        let mut stats = LoopStats::default();

        while let Some(message) = messages.recv().await {
            match message {
                WatchMessage::Created(file) => {
                    let outcome = self.handle_event(&file).await;
                    stats.record(&outcome);
                },
                WatchMessage::Error(error) => {
                    stats.watch_errors += 1;
                    tracing::error!(error = %error, "Watcher error");
                },
            }
        }

        tracing::info!(
            processed = stats.processed,
            failed = stats.failed,
            skipped = stats.skipped,
            "Event channel closed, watch loop finished"
        );
        stats
    }

    /// Process one created entry: settle, upload, relocate
    pub async fn handle_event(&self, file: &WatchedFile) -> EventOutcome {
        let span = tracing::info_span!(
            "file_processing",
            file_path = %file.path.display(),
            detected_at = %file.detected_at.to_rfc3339()
        );
        self.handle_event_inner(&file.path).instrument(span).await
    }

    async fn handle_event_inner(&self, path: &Path) -> EventOutcome {
        match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_dir() => {
                tracing::debug!("Ignoring directory");
                return EventOutcome::Skipped(SkipReason::Directory);
            },
            Ok(_) => {},
            Err(e) => {
                tracing::warn!(error = %e, "Created entry is no longer readable, skipping");
                return EventOutcome::Skipped(SkipReason::Vanished);
            },
        }

        match self.settle.wait_for(path).await {
            Ok(SettleOutcome::Settled { waited }) => {
                tracing::trace!(waited_ms = waited.as_millis() as u64, "File settled");
            },
            Ok(SettleOutcome::TimedOut { .. }) => {},
            Err(e) => {
                tracing::error!(error = %e, "Failed to wait for file");
                return EventOutcome::Failed(e);
            },
        }

        tracing::info!("Processing file");
        let output = match self.processor.process(path).await {
            Ok(output) => output,
            Err(e) => {
                tracing::error!(error = %e, "Failed to process file");
                return EventOutcome::Failed(e);
            },
        };

        match relocate(path, &self.destination).await {
            Ok(archived) => {
                tracing::info!(output = %output.display(), "File processed");
                EventOutcome::Processed { output, archived }
            },
            Err(e) => {
                tracing::error!(error = %e, output = %output.display(), "Processed but not archived");
                EventOutcome::ProcessedNotArchived { output, error: e }
            },
        }
    }
}
