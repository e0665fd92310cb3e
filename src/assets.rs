//! Resolution of resource paths against the document base.
//!
//! Deployments live under arbitrary URL prefixes, so nothing here assumes an
//! absolute root: every path is joined under [`AssetBase::root`].

use url::Url;

use crate::error::{LoadError, LoadResult};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssetBase {
    root: Url,
}

impl AssetBase {
    /// Normalizes the base so that it always ends with a single `/`.
    pub fn new(mut root: Url) -> Self {
        if !root.path().ends_with('/') {
            let path = format!("{}/", root.path());
            root.set_path(&path);
        }
        Self { root }
    }

    pub fn root(&self) -> &Url {
        &self.root
    }

    pub fn resolve(&self, path: &str) -> LoadResult<Url> {
        if is_absolute_url(path) {
            return Url::parse(path).map_err(|e| LoadError::fetch(path, e));
        }
        let relative = path.trim_start_matches('/');
        self.root
            .join(relative)
            .map_err(|e| LoadError::fetch(path, e))
    }
}

fn is_absolute_url(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with("file://")
}

/// The two dataset collections served by the dashboard.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DatasetFamily {
    Events,
    Opinion,
}

impl DatasetFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetFamily::Events => "events",
            DatasetFamily::Opinion => "opinion",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "events" | "eventos" => Some(DatasetFamily::Events),
            "opinion" | "sentiment" | "posicionamento" => Some(DatasetFamily::Opinion),
            _ => None,
        }
    }

    /// Folder name under `assets/data/`.
    pub fn folder(&self) -> &'static str {
        match self {
            DatasetFamily::Events => "events",
            DatasetFamily::Opinion => "sentiment",
        }
    }

    pub fn collection_dir(&self) -> String {
        format!("assets/data/{}/cenario-real/", self.folder())
    }

    pub fn index_path(&self) -> String {
        format!("{}datasets.json", self.collection_dir())
    }

    /// Maps a file field from `datasets.json` to a path under the base.
    pub fn file_path(&self, field: &str) -> String {
        let field = field.trim();
        if is_absolute_url(field) {
            return field.to_string();
        }
        if field.starts_with("assets/") {
            return field.to_string();
        }
        if let Some(rest) = field.strip_prefix("data/") {
            return format!("{}{}", self.collection_dir(), rest);
        }
        let family_prefix = format!("{}/", self.folder());
        if field.starts_with(&family_prefix) {
            return format!("assets/data/{}", field);
        }
        format!("{}{}", self.collection_dir(), field.trim_start_matches('/'))
    }

    pub fn resolve_file(&self, base: &AssetBase, field: &str) -> LoadResult<Url> {
        base.resolve(&self.file_path(field))
    }
}
