#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

//! # bgremove-watch
//!
//! A drop-folder client for remote background removal APIs.
//!
//! New files appearing in a source directory are uploaded one at a time as
//! `multipart/form-data` to a configured endpoint. A `200 OK` response body is
//! written to the processed directory under the original file name and the
//! original is moved into the destination directory. Any failure is logged and
//! the original stays where it is.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bgremove_watch::{run_watch_folder, WatchConfig};
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = WatchConfig::from_file("config.yaml")?;
//! run_watch_folder(Arc::new(config)).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration
//!
//! ```yaml
//! api_url: https://image-api.example.com/v2/edit
//! api_key: sk_live_...
//! form_fields:
//!   background.color: FFFFFF
//!   outputSize: 1000x1000
//! settle:
//!   strategy: stable_size
//!   poll_interval_ms: 250
//!   max_wait_ms: 10000
//! ```
//!
//! ### Feature Flags
//!
//! - `cli` (default): the `bgremove-watch` binary and tracing subscriber setup
//! - `tracing-json`: JSON log output
//! - `tracing-files`: log to a file

pub mod bootstrap;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod relocate;
pub mod settle;
#[cfg(feature = "cli")]
pub mod tracing_config;
pub mod upload;
pub mod watcher;

use std::sync::Arc;

// Public API exports
pub use bootstrap::ensure_directories;
pub use config::{DirectoryLayout, WatchConfig, WatchConfigBuilder};
pub use error::{BgWatchError, Result};
pub use relocate::relocate;
pub use settle::{SettleOutcome, SettlePolicy};
pub use upload::{FileProcessor, UploadPipeline};
pub use watcher::{
    DirectoryWatcher, EventOutcome, LoopStats, SkipReason, WatchLoop, WatchMessage, WatchedFile,
};

#[cfg(feature = "cli")]
pub use tracing_config::{TracingConfig, TracingFormat, TracingGuard, TracingOutput};

/// Bootstrap the directories, start watching and process events until the
/// watcher goes away
///
/// Startup failures (directory creation, HTTP client, watcher) are returned as
/// errors. Once the loop runs, per-file failures are only logged. In normal
/// operation this future never completes; the process is expected to be
/// terminated.
pub async fn run_watch_folder(config: Arc<WatchConfig>) -> Result<LoopStats> {
    ensure_directories(&config.directories)?;

    let pipeline = UploadPipeline::new(Arc::clone(&config))?;
    let (watcher, messages) = DirectoryWatcher::new(&config.directories.source)?;
    let watch_loop = WatchLoop::from_config(pipeline, &config);

    let stats = watch_loop.run(messages).await;
    drop(watcher);
    Ok(stats)
}
