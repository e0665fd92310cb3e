//! Dataset loading for the events and opinion collections.

use futures_util::future::join_all;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use url::Url;

use crate::aggregate::{self, DateRange, Granularity, Series};
use crate::assets::{AssetBase, DatasetFamily};
use crate::bootstrap::BootstrapTable;
use crate::catalog::{DatasetIndex, DatasetSource, Descriptor};
use crate::error::{LoadError, LoadResult};
use crate::fetch::{expect_array, Fetcher};
use crate::logging::{log_fetch_failure, log_load_complete, log_malformed, ProfileScope, v_str};
use crate::record::{normalize, Record};

const METRICS_FILE: &str = "metrics_comparison.json";

#[derive(Debug, Clone, Serialize)]
pub struct EventsMeta {
    pub id: String,
    pub label: String,
    pub description: Option<String>,
    pub period: String,
    pub total_videos: usize,
    pub total_operations: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct EventsSeries {
    pub by_year: Series,
    pub by_day: Series,
}

#[derive(Debug, Clone, Serialize)]
pub struct EventsDataset {
    pub meta: EventsMeta,
    pub records: Vec<Record>,
    pub series: EventsSeries,
}

#[derive(Debug, Clone, Serialize)]
pub struct OpinionMeta {
    pub id: String,
    pub title: String,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct OpinionDataset {
    pub meta: OpinionMeta,
    pub comments: Vec<Record>,
    pub bootstrap: BootstrapTable,
}

/// Loads datasets through a [`Fetcher`], resolving every path against the
/// configured base. Cloning is cheap; loads share nothing mutable.
#[derive(Clone)]
pub struct DatasetLoader {
    fetcher: Arc<dyn Fetcher>,
    base: AssetBase,
}

impl DatasetLoader {
    pub fn new(fetcher: Arc<dyn Fetcher>, base: AssetBase) -> Self {
        Self { fetcher, base }
    }

    pub fn base(&self) -> &AssetBase {
        &self.base
    }

    /// Dataset index for a family; empty on any failure.
    pub async fn list_datasets(&self, family: DatasetFamily) -> DatasetIndex {
        match self.try_list_datasets(family).await {
            Ok(index) => index,
            Err(err) => {
                log_fetch_failure(&family.index_path(), &err.to_string());
                DatasetIndex::default()
            }
        }
    }

    async fn try_list_datasets(&self, family: DatasetFamily) -> LoadResult<DatasetIndex> {
        let url = self.base.resolve(&family.index_path())?;
        let value = self.fetcher.fetch_json(&url).await?;
        if !value.is_object() {
            log_malformed(url.as_str(), "object");
        }
        Ok(DatasetIndex::from_json(&value))
    }

    async fn describe(&self, family: DatasetFamily, id: &str) -> LoadResult<(DatasetIndex, Descriptor)> {
        let index = self.list_datasets(family).await;
        let descriptor = index
            .get(id)
            .cloned()
            .ok_or_else(|| LoadError::NotFound(id.to_string()))?;
        Ok((index, descriptor))
    }

    async fn fetch_rows(&self, url: &Url) -> LoadResult<Vec<Value>> {
        let value = self.fetcher.fetch_json(url).await?;
        expect_array(url, value)
    }

    /// Malformed payloads count as empty; fetch failures propagate.
    async fn fetch_rows_lenient(&self, url: &Url) -> LoadResult<Vec<Value>> {
        match self.fetch_rows(url).await {
            Err(LoadError::MalformedData { url, expected }) => {
                log_malformed(&url, expected);
                Ok(Vec::new())
            }
            other => other,
        }
    }

    /// Fetches every concrete file in parallel. Individual failures are
    /// logged and skipped; only a total failure is an error.
    async fn fetch_all_files(&self, family: DatasetFamily, index: &DatasetIndex) -> LoadResult<(Vec<Value>, usize)> {
        let files = index.concrete_files();
        let fetches = files.iter().map(|file| async move {
            let url = family.resolve_file(&self.base, file)?;
            self.fetch_rows(&url).await
        });
        let results = join_all(fetches).await;

        let mut rows = Vec::new();
        let mut succeeded = 0usize;
        for (file, result) in files.iter().zip(results) {
            match result {
                Ok(mut batch) => {
                    succeeded += 1;
                    rows.append(&mut batch);
                }
                Err(err) => log_fetch_failure(file, &err.to_string()),
            }
        }
        if succeeded == 0 {
            return Err(LoadError::PartialFetch {
                attempted: files.len(),
            });
        }
        Ok((rows, succeeded))
    }

    pub async fn load_events(&self, id: &str) -> LoadResult<EventsDataset> {
        let _scope = ProfileScope::with_context("load_events", &[("dataset_id", v_str(id))]);
        let family = DatasetFamily::Events;
        let (index, descriptor) = self.describe(family, id).await?;

        let (rows, files) = match &descriptor.source {
            DatasetSource::AllFiles => self.fetch_all_files(family, &index).await?,
            DatasetSource::File { file } => {
                let url = family.resolve_file(&self.base, file)?;
                (self.fetch_rows_lenient(&url).await?, 1)
            }
            DatasetSource::Opinion { .. } => {
                return Err(LoadError::MalformedData {
                    url: family.index_path(),
                    expected: "events descriptor with a file",
                })
            }
        };

        let records = normalize(id, &rows);
        let all = DateRange::all();
        let series = EventsSeries {
            by_year: aggregate::aggregate(&records, Granularity::Year, &all),
            by_day: aggregate::aggregate(&records, Granularity::Day, &all),
        };
        let meta = EventsMeta {
            id: id.to_string(),
            label: descriptor.label.clone(),
            description: descriptor.description.clone(),
            period: aggregate::period_label(&records),
            total_videos: records.len(),
            total_operations: aggregate::distinct_operations(&records),
        };
        log_load_complete(id, family.as_str(), records.len(), files);
        Ok(EventsDataset {
            meta,
            records,
            series,
        })
    }

    /// Technique comparison rows next to the events collection; empty when
    /// the file is absent or not an array.
    pub async fn load_metrics(&self) -> Vec<Value> {
        let path = format!("assets/data/{}/{}", DatasetFamily::Events.folder(), METRICS_FILE);
        let url = match self.base.resolve(&path) {
            Ok(url) => url,
            Err(err) => {
                log_fetch_failure(&path, &err.to_string());
                return Vec::new();
            }
        };
        self.fetch_rows_lenient(&url).await.unwrap_or_else(|err| {
            log_fetch_failure(url.as_str(), &err.to_string());
            Vec::new()
        })
    }

    async fn fetch_bootstrap(&self, url: &Url) -> LoadResult<BootstrapTable> {
        if url.path().to_ascii_lowercase().ends_with(".csv") {
            let text = self.fetcher.fetch_text(url).await?;
            return Ok(BootstrapTable::from_csv(&text));
        }
        let value = self.fetcher.fetch_json(url).await?;
        if !value.is_array() {
            log_malformed(url.as_str(), "array");
        }
        Ok(BootstrapTable::from_json(&value))
    }

    /// Comments and bootstrap load in parallel; either may fail alone and
    /// is then treated as empty.
    pub async fn load_opinion(&self, id: &str) -> LoadResult<OpinionDataset> {
        let _scope = ProfileScope::with_context("load_opinion", &[("dataset_id", v_str(id))]);
        let family = DatasetFamily::Opinion;
        let (_, descriptor) = self.describe(family, id).await?;
        let DatasetSource::Opinion {
            comments_file,
            bootstrap_file,
        } = &descriptor.source
        else {
            return Err(LoadError::MalformedData {
                url: family.index_path(),
                expected: "opinion descriptor with commentsFile and bootstrapFile",
            });
        };

        let comments_url = family.resolve_file(&self.base, comments_file)?;
        let bootstrap_url = family.resolve_file(&self.base, bootstrap_file)?;
        let (comments, bootstrap) = tokio::join!(
            self.fetch_rows_lenient(&comments_url),
            self.fetch_bootstrap(&bootstrap_url),
        );

        let (comments, bootstrap) = match (comments, bootstrap) {
            (Err(_), Err(_)) => return Err(LoadError::PartialFetch { attempted: 2 }),
            (c, b) => (
                c.unwrap_or_else(|err| {
                    log_fetch_failure(comments_url.as_str(), &err.to_string());
                    Vec::new()
                }),
                b.unwrap_or_else(|err| {
                    log_fetch_failure(bootstrap_url.as_str(), &err.to_string());
                    BootstrapTable::default()
                }),
            ),
        };

        let comments = normalize(id, &comments);
        log_load_complete(id, family.as_str(), comments.len(), 2);
        Ok(OpinionDataset {
            meta: OpinionMeta {
                id: id.to_string(),
                title: descriptor.label.clone(),
                total: comments.len(),
            },
            comments,
            bootstrap,
        })
    }
}
