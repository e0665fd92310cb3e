use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use url::Url;

use super::Fetcher;
use crate::error::{LoadError, LoadResult};
use crate::logging::log_fetch_failure;

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch_text(&self, url: &Url) -> LoadResult<String> {
        let resp = self.client.get(url.clone()).send().await.map_err(|e| {
            log_fetch_failure(url.as_str(), &e.to_string());
            LoadError::fetch(url, e)
        })?;

        let status = resp.status();
        if !status.is_success() {
            let reason = format!("HTTP {}", status.as_u16());
            log_fetch_failure(url.as_str(), &reason);
            return Err(LoadError::fetch(url, reason));
        }

        resp.text().await.map_err(|e| LoadError::fetch(url, e))
    }
}
