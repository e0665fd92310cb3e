use std::path::Path;
use std::time::Duration;

use url::Url;

use crate::assets::AssetBase;
use crate::error::{LoadError, LoadResult};

pub const DEFAULT_BASE_URL: &str = "http://localhost:4200/";

#[derive(Clone, Debug)]
pub struct Config {
    /// Document base path every resource is resolved against.
    pub base_url: String,
    pub load_timeout_ms: u64,
    pub http_timeout_secs: u64,
    pub prefs_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            load_timeout_ms: 5000,
            http_timeout_secs: 10,
            prefs_path: "./stance-prefs.sqlite".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            base_url: std::env::var("STANCE_BASE_URL").unwrap_or(d.base_url),
            load_timeout_ms: std::env::var("STANCE_LOAD_TIMEOUT_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(d.load_timeout_ms),
            http_timeout_secs: std::env::var("STANCE_HTTP_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(d.http_timeout_secs),
            prefs_path: std::env::var("STANCE_PREFS_PATH").unwrap_or(d.prefs_path),
        }
    }

    pub fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.load_timeout_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Accepts either an absolute URL or a local directory.
    pub fn asset_base(&self) -> LoadResult<AssetBase> {
        base_from_str(&self.base_url)
    }
}

pub fn base_from_str(raw: &str) -> LoadResult<AssetBase> {
    if let Ok(url) = Url::parse(raw) {
        if url.has_host() || url.scheme() == "file" {
            return Ok(AssetBase::new(url));
        }
    }
    let dir = Path::new(raw);
    let dir = if dir.is_absolute() {
        dir.to_path_buf()
    } else {
        std::env::current_dir()?.join(dir)
    };
    Url::from_directory_path(&dir)
        .map(AssetBase::new)
        .map_err(|_| LoadError::fetch(raw, "base path is neither a URL nor a directory"))
}
