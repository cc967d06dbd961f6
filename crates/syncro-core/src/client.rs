//! Coordination service HTTP client
//!
//! Endpoints, relative to the configured base URL:
//!
//! - `GET  {base}/{path}` ensure the document exists (`?force=1` re-populates)
//! - `POST {base}/{path}/heartbeat` with `{session, dirty?}`
//! - `GET  {base}/{path}/flush` flush to durable storage (`?destroy=1` tears down)

use async_trait::async_trait;
use reqwest::Response;
use tracing::debug;

use crate::config::SyncroConfig;
use crate::coordinator::{Coordinator, HeartbeatSignal};
use crate::error::{SyncroError, SyncroResult};
use crate::path::SyncroPath;

/// User agent sent with every request
const USER_AGENT: &str = concat!("syncro/", env!("CARGO_PKG_VERSION"));

/// HTTP client for the coordination service
#[derive(Debug, Clone)]
pub struct RegistryClient {
    base_url: String,
    http: reqwest::Client,
}

impl RegistryClient {
    /// Create a client for the given base URL
    pub fn new(base_url: &str) -> SyncroResult<Self> {
        let http = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    /// Create a client from configuration, if a registry URL is set
    pub fn from_config(config: &SyncroConfig) -> SyncroResult<Option<Self>> {
        config.registry_url.as_deref().map(Self::new).transpose()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &SyncroPath, action: Option<&str>, flag: Option<&str>) -> String {
        let mut url = format!("{}/{}", self.base_url, path);
        if let Some(action) = action {
            url.push('/');
            url.push_str(action);
        }
        if let Some(flag) = flag {
            url.push('?');
            url.push_str(flag);
            url.push_str("=1");
        }
        url
    }

    async fn check(url: String, response: Response) -> SyncroResult<()> {
        let status = response.status();
        if status.is_success() {
            debug!("{} -> {}", url, status);
            Ok(())
        } else {
            Err(SyncroError::Transport {
                url,
                status: status.as_u16(),
            })
        }
    }
}

#[async_trait]
impl Coordinator for RegistryClient {
    async fn ensure_populated(&self, path: &SyncroPath, force: bool) -> SyncroResult<()> {
        let url = self.url(path, None, force.then_some("force"));
        let response = self.http.get(&url).send().await?;
        Self::check(url, response).await
    }

    async fn heartbeat(&self, path: &SyncroPath, signal: &HeartbeatSignal) -> SyncroResult<()> {
        let url = self.url(path, Some("heartbeat"), None);
        let response = self.http.post(&url).json(signal).send().await?;
        Self::check(url, response).await
    }

    async fn flush(&self, path: &SyncroPath, destroy: bool) -> SyncroResult<()> {
        let url = self.url(path, Some("flush"), destroy.then_some("destroy"));
        let response = self.http.get(&url).send().await?;
        Self::check(url, response).await
    }
}
