//! Waiting for a freshly created file to be fully written
//!
//! Creation events can fire before the writer has flushed the file. The policy
//! decides how long to hold off before the file is read.

use crate::error::{BgWatchError, Result};
use instant::Instant;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

const DEFAULT_POLL_INTERVAL_MS: u64 = 250;
const DEFAULT_MAX_WAIT_MS: u64 = 10_000;

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_max_wait_ms() -> u64 {
    DEFAULT_MAX_WAIT_MS
}

/// Grace period applied before a new file is uploaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum SettlePolicy {
    /// Read the file as soon as the event arrives
    None,
    /// Sleep for a fixed delay
    FixedDelay {
        /// Delay in milliseconds
        delay_ms: u64,
    },
    /// Poll the file size until two consecutive non-zero readings match
    StableSize {
        /// Time between two size readings
        #[serde(default = "default_poll_interval_ms")]
        poll_interval_ms: u64,
        /// Upper bound on the total wait; processing goes ahead once reached
        #[serde(default = "default_max_wait_ms")]
        max_wait_ms: u64,
    },
}

impl Default for SettlePolicy {
    fn default() -> Self {
        Self::StableSize {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            max_wait_ms: DEFAULT_MAX_WAIT_MS,
        }
    }
}

impl std::fmt::Display for SettlePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::FixedDelay { delay_ms } => write!(f, "fixed delay of {delay_ms}ms"),
            Self::StableSize {
                poll_interval_ms,
                max_wait_ms,
            } => write!(
                f,
                "stable size (poll every {poll_interval_ms}ms, give up after {max_wait_ms}ms)"
            ),
        }
    }
}

/// Result of waiting on a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleOutcome {
    /// The file is considered complete
    Settled {
        /// Time spent waiting
        waited: Duration,
    },
    /// The size kept changing until the bound was reached
    TimedOut {
        /// Time spent waiting
        waited: Duration,
    },
}

impl SettlePolicy {
    /// Check the policy parameters
    pub fn validate(&self) -> Result<()> {
        if let Self::StableSize {
            poll_interval_ms,
            max_wait_ms,
        } = *self
        {
            if poll_interval_ms == 0 {
                return Err(BgWatchError::invalid_config(
                    "settle.poll_interval_ms must be greater than 0",
                ));
            }
            if max_wait_ms < poll_interval_ms {
                return Err(BgWatchError::invalid_config(format!(
                    "settle.max_wait_ms ({max_wait_ms}) must be at least settle.poll_interval_ms ({poll_interval_ms})"
                )));
            }
        }
        Ok(())
    }

    /// Wait until `path` looks complete according to this policy
    pub async fn wait_for(&self, path: &Path) -> Result<SettleOutcome> {
        let started = Instant::now();
        match *self {
            Self::None => Ok(SettleOutcome::Settled {
                waited: Duration::ZERO,
            }),
            Self::FixedDelay { delay_ms } => {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                Ok(SettleOutcome::Settled {
                    waited: started.elapsed(),
                })
            },
            Self::StableSize {
                poll_interval_ms,
                max_wait_ms,
            } => {
                let interval = Duration::from_millis(poll_interval_ms);
                let max_wait = Duration::from_millis(max_wait_ms);
                let mut last = file_size(path).await?;

                loop {
                    tokio::time::sleep(interval).await;
                    let current = file_size(path).await?;
                    // An empty file has most likely not been written yet
                    if current == last && current > 0 {
                        tracing::trace!(path = %path.display(), size = current, "File size stable");
                        return Ok(SettleOutcome::Settled {
                            waited: started.elapsed(),
                        });
                    }
                    last = current;

                    if started.elapsed() >= max_wait {
                        tracing::warn!(
                            path = %path.display(),
                            max_wait_ms,
                            "File still growing after max wait, processing anyway"
                        );
                        return Ok(SettleOutcome::TimedOut {
                            waited: started.elapsed(),
                        });
                    }
                }
            },
        }
    }
}

async fn file_size(path: &Path) -> Result<u64> {
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.len())
        .map_err(|e| BgWatchError::file_io_error("read metadata of", path, &e))
}
