use async_trait::async_trait;
use serde_json::Value;
use url::Url;

use crate::error::{LoadError, LoadResult};

mod fs;
mod http;

pub use fs::FsFetcher;
pub use http::HttpFetcher;

#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch_text(&self, url: &Url) -> LoadResult<String>;

    async fn fetch_json(&self, url: &Url) -> LoadResult<Value> {
        let body = self.fetch_text(url).await?;
        Ok(serde_json::from_str(&body)?)
    }
}

/// Dispatches on the URL scheme so one loader can read both deployed
/// sites and local checkouts.
pub struct AnyFetcher {
    http: HttpFetcher,
    fs: FsFetcher,
}

impl AnyFetcher {
    pub fn new(http: HttpFetcher) -> Self {
        Self { http, fs: FsFetcher }
    }
}

#[async_trait]
impl Fetcher for AnyFetcher {
    async fn fetch_text(&self, url: &Url) -> LoadResult<String> {
        match url.scheme() {
            "file" => self.fs.fetch_text(url).await,
            "http" | "https" => self.http.fetch_text(url).await,
            other => Err(LoadError::fetch(url, format!("unsupported scheme {}", other))),
        }
    }
}

/// Extracts a JSON array or reports the payload as malformed.
pub fn expect_array(url: &Url, value: Value) -> LoadResult<Vec<Value>> {
    match value {
        Value::Array(items) => Ok(items),
        _ => Err(LoadError::MalformedData {
            url: url.to_string(),
            expected: "array",
        }),
    }
}
