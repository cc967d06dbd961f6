//! Config command handlers

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use syncro_core::SyncroConfig;

use crate::output::{Output, OutputFormat};

fn load(config_path: Option<&PathBuf>) -> Result<SyncroConfig> {
    match config_path {
        Some(path) => SyncroConfig::load_from_path(path),
        None => SyncroConfig::load(),
    }
    .context("Failed to load configuration")
}

/// Show current configuration
pub fn show(config_path: Option<&PathBuf>, output: &Output) -> Result<()> {
    let config = load(config_path)?;

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "registry_url": config.registry_url,
                    "heartbeat_interval_ms": config.heartbeat_interval_ms,
                    "throttle_ms": config.throttle_ms,
                    "retries": config.retries,
                    "retry_min_time_ms": config.retry_min_time_ms
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", config.registry_url.as_deref().unwrap_or(""));
        }
        OutputFormat::Human => {
            let effective_path = config_path
                .cloned()
                .unwrap_or_else(SyncroConfig::config_file_path);
            println!("Configuration:");
            println!(
                "  registry_url:          {}",
                config.registry_url.as_deref().unwrap_or("(not set)")
            );
            println!("  heartbeat_interval_ms: {}", config.heartbeat_interval_ms);
            println!("  throttle_ms:           {}", config.throttle_ms);
            println!("  retries:               {}", config.retries);
            println!("  retry_min_time_ms:     {}", config.retry_min_time_ms);
            println!();
            println!("Config file: {}", effective_path.display());
        }
    }

    Ok(())
}

/// Apply one `key = value` assignment
fn apply(config: &mut SyncroConfig, key: &str, value: &str) -> Result<()> {
    match key {
        "registry_url" => {
            config.registry_url = if value.is_empty() || value == "none" {
                None
            } else {
                Some(value.to_string())
            };
        }
        "heartbeat_interval_ms" => {
            config.heartbeat_interval_ms = value
                .parse()
                .context("Invalid value for heartbeat_interval_ms. Use milliseconds.")?;
        }
        "throttle_ms" => {
            config.throttle_ms = value
                .parse()
                .context("Invalid value for throttle_ms. Use milliseconds.")?;
        }
        "retries" => {
            config.retries = value
                .parse()
                .context("Invalid value for retries. Use a non-negative integer.")?;
        }
        "retry_min_time_ms" => {
            config.retry_min_time_ms = value
                .parse()
                .context("Invalid value for retry_min_time_ms. Use milliseconds.")?;
        }
        _ => {
            bail!(
                "Unknown configuration key: '{}'\n\
                 Valid keys: registry_url, heartbeat_interval_ms, throttle_ms, retries, retry_min_time_ms",
                key
            );
        }
    }
    Ok(())
}

/// Set a configuration value
pub fn set(
    key: String,
    value: String,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    let mut config = load(config_path)?;
    apply(&mut config, &key, &value)?;

    let save_path = config_path
        .cloned()
        .unwrap_or_else(SyncroConfig::config_file_path);
    config
        .save_to_path(&save_path)
        .context("Failed to save configuration")?;

    output.success(&format!("Set {} = {}", key, value));
    Ok(())
}
