//! Configuration loading for CLI arguments

use crate::cli::main_impl::Cli;
use crate::config::WatchConfig;
use anyhow::{Context, Result};

/// Turns CLI arguments into a validated `WatchConfig`
pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Load the config file named on the command line and apply directory overrides
    pub(crate) fn from_cli(cli: &Cli) -> Result<WatchConfig> {
        let mut config = WatchConfig::from_file(&cli.config).with_context(|| {
            format!("Failed to load configuration from {}", cli.config.display())
        })?;
        Self::apply_overrides(cli, &mut config);
        Ok(config)
    }

    /// Directory flags win over the config file
    pub(crate) fn apply_overrides(cli: &Cli, config: &mut WatchConfig) {
        if let Some(source) = &cli.source {
            config.directories.source.clone_from(source);
        }
        if let Some(destination) = &cli.destination {
            config.directories.destination.clone_from(destination);
        }
        if let Some(processed) = &cli.processed {
            config.directories.processed.clone_from(processed);
        }
    }

    /// Human-readable summary printed by `--check-config`
    pub(crate) fn summary(config: &WatchConfig) -> String {
        let mut lines = vec![
            format!("API URL:          {}", config.api_url),
            format!("API key:          {} (header {})", config.masked_api_key(), config.api_key_header),
            format!("Image field:      {}", config.image_field),
        ];

        if config.form_fields.is_empty() {
            lines.push("Form fields:      (none)".to_string());
        } else {
            lines.push("Form fields:".to_string());
            for (key, value) in &config.form_fields {
                lines.push(format!("  {key} = {value}"));
            }
        }

        lines.push(format!("Source:           {}", config.directories.source.display()));
        lines.push(format!("Destination:      {}", config.directories.destination.display()));
        lines.push(format!("Processed:        {}", config.directories.processed.display()));
        lines.push(format!("Settle:           {}", config.settle));
        lines.push(match config.request_timeout_secs {
            Some(secs) => format!("Request timeout:  {secs}s"),
            None => "Request timeout:  none".to_string(),
        });

        lines.join("\n")
    }
}
