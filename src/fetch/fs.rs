use async_trait::async_trait;
use url::Url;

use super::Fetcher;
use crate::error::{LoadError, LoadResult};
use crate::logging::log_fetch_failure;

/// Reads `file://` URLs from the local filesystem.
#[derive(Clone, Copy, Debug, Default)]
pub struct FsFetcher;

#[async_trait]
impl Fetcher for FsFetcher {
    async fn fetch_text(&self, url: &Url) -> LoadResult<String> {
        let path = url
            .to_file_path()
            .map_err(|_| LoadError::fetch(url, "not a file URL"))?;
        tokio::task::spawn_blocking(move || std::fs::read_to_string(path))
            .await
            .map_err(|e| LoadError::fetch(url, e))?
            .map_err(|e| {
                log_fetch_failure(url.as_str(), &e.to_string());
                LoadError::fetch(url, e)
            })
    }
}
