//! Watch-folder CLI
//!
//! Loads the configuration, prepares the directories and runs the watch loop
//! until the process is terminated.

use super::config::CliConfigBuilder;
use crate::tracing_config::{TracingConfig, TracingFormat, TracingGuard};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;

/// Watches a folder and sends new images to a background removal API
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "bgremove-watch")]
pub struct Cli {
    /// Configuration file (YAML, or JSON with a .json extension)
    #[arg(short, long, value_name = "PATH", default_value = "config.yaml")]
    pub config: PathBuf,

    /// Enable verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Override the watched source directory
    #[arg(long, value_name = "DIR")]
    pub source: Option<PathBuf>,

    /// Override the archive directory for processed originals
    #[arg(long, value_name = "DIR")]
    pub destination: Option<PathBuf>,

    /// Override the output directory for API results
    #[arg(long, value_name = "DIR")]
    pub processed: Option<PathBuf>,

    /// Validate the configuration, print a summary and exit
    #[arg(long)]
    pub check_config: bool,

    /// Log output format
    #[arg(long, value_enum, default_value_t = CliLogFormat::Console)]
    pub log_format: CliLogFormat,

    /// Write logs to this file instead of stderr
    #[cfg(feature = "tracing-files")]
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
pub enum CliLogFormat {
    Console,
    Compact,
    #[cfg(feature = "tracing-json")]
    Json,
}

pub async fn main() -> Result<()> {
    let cli = Cli::parse();

    let _tracing_guard = init_tracing(&cli).context("Failed to initialize tracing")?;

    let config = match CliConfigBuilder::from_cli(&cli) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{e:#}");
            return Err(e);
        },
    };

    if cli.check_config {
        println!("Configuration OK: {}", cli.config.display());
        println!("{}", CliConfigBuilder::summary(&config));
        return Ok(());
    }

    tracing::info!(
        api_url = %config.api_url,
        source = %config.directories.source.display(),
        settle = %config.settle,
        "Starting watch folder"
    );

    match crate::run_watch_folder(Arc::new(config)).await {
        Ok(stats) => {
            tracing::info!(?stats, "Watch folder stopped");
            Ok(())
        },
        Err(e) => {
            tracing::error!("{e}");
            Err(e).context("Watch folder failed to start")
        },
    }
}

/// Initialize tracing from CLI flags
fn init_tracing(cli: &Cli) -> Result<TracingGuard> {
    let format = match cli.log_format {
        CliLogFormat::Console => TracingFormat::Console,
        CliLogFormat::Compact => TracingFormat::Compact,
        #[cfg(feature = "tracing-json")]
        CliLogFormat::Json => TracingFormat::Json,
    };

    #[allow(unused_mut)]
    let mut config = TracingConfig::new()
        .with_verbosity(cli.verbose)
        .with_format(format)
        .with_session_id(uuid::Uuid::new_v4().to_string());

    #[cfg(feature = "tracing-files")]
    if let Some(path) = &cli.log_file {
        config = config.with_output(crate::tracing_config::TracingOutput::File(path.clone()));
    }

    config.init().context("Failed to initialize tracing subscriber")
}
