//! Coordination service command handlers

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use tracing::debug;

use syncro_core::{Coordinator, HeartbeatSignal, RegistryClient, SyncroConfig, SyncroPath};

use crate::output::Output;

/// Build a client from `--url` or the configured registry URL
pub fn client(url: Option<&str>, config_path: Option<&PathBuf>) -> Result<RegistryClient> {
    if let Some(url) = url {
        return Ok(RegistryClient::new(url)?);
    }

    let config = match config_path {
        Some(path) => SyncroConfig::load_from_path(path),
        None => SyncroConfig::load(),
    }
    .context("Failed to load configuration")?;

    match RegistryClient::from_config(&config)? {
        Some(client) => Ok(client),
        None => bail!(
            "Coordination service URL not configured.\n\
             Pass --url or run: syncro config set registry_url https://your-server"
        ),
    }
}

fn parse_path(path: &str) -> Result<SyncroPath> {
    path.parse()
        .with_context(|| format!("Invalid path '{}'", path))
}

/// Ask the service to populate a realtime document
pub async fn populate(
    client: &RegistryClient,
    path: &str,
    force: bool,
    output: &Output,
) -> Result<()> {
    let path = parse_path(path)?;
    debug!("Populating {} via {}", path, client.base_url());
    client.ensure_populated(&path, force).await?;
    output.success(&format!("Populated {}", path));
    Ok(())
}

/// Send one presence heartbeat
pub async fn heartbeat(
    client: &RegistryClient,
    path: &str,
    session: Option<String>,
    dirty: bool,
    output: &Output,
) -> Result<()> {
    let path = parse_path(path)?;
    let session = session.unwrap_or_else(|| format!("syncro-cli-{}", std::process::id()));
    client
        .heartbeat(&path, &HeartbeatSignal::new(session.as_str(), dirty))
        .await?;

    if output.is_json() {
        println!(
            "{}",
            serde_json::json!({
                "path": path.to_string(),
                "session": session,
                "dirty": dirty
            })
        );
    } else if !output.is_quiet() {
        println!("✓ Heartbeat sent for {}", path);
        println!("  Session: {}", session);
        if dirty {
            println!("  Marked dirty");
        }
    }
    Ok(())
}

/// Ask the service to flush a document to durable storage
pub async fn flush(
    client: &RegistryClient,
    path: &str,
    destroy: bool,
    output: &Output,
) -> Result<()> {
    let path = parse_path(path)?;
    client.flush(&path, destroy).await?;
    if destroy {
        output.success(&format!("Flushed and removed {}", path));
    } else {
        output.success(&format!("Flushed {}", path));
    }
    Ok(())
}
