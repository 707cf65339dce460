// Resource fetching over HTTP via reqwest

use crate::error::{Result, SyncError};
use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use url::Url;

/// Fetches the raw body of a resource endpoint. The sync loop bounds every call
/// with its own timeout, so implementations need not enforce one.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, endpoint: &Url) -> Result<Bytes>;
}

pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(connect_timeout: Option<Duration>, user_agent: &str) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder().user_agent(user_agent);
        if let Some(t) = connect_timeout {
            builder = builder.connect_timeout(t);
        }
        let client = builder.build().context("Failed to create HTTP client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, endpoint: &Url) -> Result<Bytes> {
        let response = self.client.get(endpoint.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::Network(format!(
                "GET {} returned {}",
                endpoint, status
            )));
        }
        Ok(response.bytes().await?)
    }
}
