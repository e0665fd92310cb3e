use async_trait::async_trait;
use serde_json::json;
use stance_analytics::aggregate::{weekly_stance, DateRange};
use stance_analytics::assets::DatasetFamily;
use stance_analytics::bootstrap::Metric;
use stance_analytics::config::base_from_str;
use stance_analytics::fetch::{Fetcher, FsFetcher};
use stance_analytics::loader::DatasetLoader;
use stance_analytics::record::Stance;
use stance_analytics::significance::weekly_flags;
use stance_analytics::{ErrorKind, LoadError, LoadResult};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use url::Url;

const EVENTS_DIR: &str = "assets/data/events/cenario-real";
const OPINION_DIR: &str = "assets/data/sentiment/cenario-real";

fn write(root: &Path, rel: &str, body: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, body).unwrap();
}

fn loader_for(dir: &TempDir, fetcher: Arc<dyn Fetcher>) -> DatasetLoader {
    let base = base_from_str(dir.path().to_str().unwrap()).unwrap();
    DatasetLoader::new(fetcher, base)
}

fn events_site() -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write(
        root,
        &format!("{}/datasets.json", EVENTS_DIR),
        &json!({
            "videos-pre": {"label": "Antes de 2024", "file": "videos_pre.json"},
            "videos-post": {"file": "data/videos_post.json", "description": "2024+"},
            "broken": {"label": "Quebrado", "file": "broken.json"},
            "all": {"label": "Todos", "file": "__ALL__"}
        })
        .to_string(),
    );
    write(
        root,
        &format!("{}/videos_pre.json", EVENTS_DIR),
        &json!([
            {"data_postagem": "2023-05-01", "operation_ner": "Op Alfa"},
            {"data_postagem": "2023-05-03", "operation_ner": "Op Alfa"},
            {"data_postagem": "not a date", "operation_ner": "Op Alfa"}
        ])
        .to_string(),
    );
    write(
        root,
        &format!("{}/videos_post.json", EVENTS_DIR),
        &json!([
            {"date": "2024-01-01T10:00:00Z", "operation": "Op Beta"},
            {"day": "2024-01-08", "operation": "Op Beta"}
        ])
        .to_string(),
    );
    dir
}

/// Fails any URL whose path mentions `broken`; delegates the rest.
struct FlakyFetcher {
    inner: FsFetcher,
}

#[async_trait]
impl Fetcher for FlakyFetcher {
    async fn fetch_text(&self, url: &Url) -> LoadResult<String> {
        if url.path().contains("broken") {
            return Err(LoadError::fetch(url, "HTTP 500"));
        }
        self.inner.fetch_text(url).await
    }
}

fn flaky() -> Arc<dyn Fetcher> {
    Arc::new(FlakyFetcher { inner: FsFetcher })
}

#[tokio::test]
async fn lists_datasets_in_file_order() {
    let site = events_site();
    let loader = loader_for(&site, Arc::new(FsFetcher));
    let index = loader.list_datasets(DatasetFamily::Events).await;
    let ids: Vec<&str> = index.iter().map(|(id, _)| id).collect();
    assert_eq!(ids, vec!["videos-pre", "videos-post", "broken", "all"]);
    assert_eq!(index.latest().map(|(id, _)| id), Some("all"));
    assert_eq!(index.get("videos-post").unwrap().label, "videos-post");
}

#[tokio::test]
async fn missing_or_malformed_index_is_empty() {
    let dir = TempDir::new().unwrap();
    let loader = loader_for(&dir, Arc::new(FsFetcher));
    assert!(loader.list_datasets(DatasetFamily::Opinion).await.is_empty());

    write(dir.path(), &format!("{}/datasets.json", OPINION_DIR), "[1, 2, 3]");
    assert!(loader.list_datasets(DatasetFamily::Opinion).await.is_empty());

    write(dir.path(), &format!("{}/datasets.json", OPINION_DIR), "{oops");
    assert!(loader.list_datasets(DatasetFamily::Opinion).await.is_empty());
}

#[tokio::test]
async fn single_file_dataset_drops_bad_timestamps() {
    let site = events_site();
    let loader = loader_for(&site, flaky());
    let data = loader.load_events("videos-pre").await.unwrap();
    assert_eq!(data.meta.label, "Antes de 2024");
    assert_eq!(data.meta.total_videos, 2);
    assert_eq!(data.meta.total_operations, 1);
    assert_eq!(data.meta.period, "2023-05-01 – 2023-05-03");
    assert_eq!(data.series.by_year.labels, vec!["2023"]);
    assert_eq!(data.series.by_year.values, vec![2]);
}

#[tokio::test]
async fn aggregate_dataset_survives_one_failed_file() {
    let site = events_site();
    let loader = loader_for(&site, flaky());
    let data = loader.load_events("all").await.unwrap();
    assert_eq!(data.meta.total_videos, 4);
    assert_eq!(data.meta.total_operations, 2);
    assert_eq!(data.series.by_year.labels, vec!["2023", "2024"]);
    assert_eq!(data.series.by_year.values, vec![2, 2]);
}

#[tokio::test]
async fn aggregate_dataset_fails_when_every_file_fails() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        &format!("{}/datasets.json", EVENTS_DIR),
        &json!({
            "a": {"file": "broken_a.json"},
            "b": {"file": "broken_b.json"},
            "all": {"file": "__ALL__"}
        })
        .to_string(),
    );
    let loader = loader_for(&dir, flaky());
    let err = loader.load_events("all").await.unwrap_err();
    assert!(matches!(err, LoadError::PartialFetch { attempted: 2 }));
    assert!(err.is_user_visible());
}

#[tokio::test]
async fn unknown_dataset_is_not_found() {
    let site = events_site();
    let loader = loader_for(&site, flaky());
    let err = loader.load_events("nope").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn single_file_failure_propagates() {
    let site = events_site();
    let loader = loader_for(&site, flaky());
    let err = loader.load_events("broken").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Fetch);
}

fn opinion_site(bootstrap_file: &str, bootstrap_body: &str) -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write(
        root,
        &format!("{}/datasets.json", OPINION_DIR),
        &json!({
            "op-alfa": {
                "title": "Operação Alfa",
                "commentsFile": "comments.json",
                "bootstrapFile": bootstrap_file
            }
        })
        .to_string(),
    );
    write(
        root,
        &format!("{}/comments.json", OPINION_DIR),
        &json!([
            {"data_postagem": "2024-01-01", "new_BERT": 1, "comentario": "a"},
            {"data_postagem": "2024-01-02", "new_BERT": 1, "comentario": "b"},
            {"data_postagem": "2024-01-03", "new_BERT": 1, "comentario": "c"},
            {"data_postagem": "2024-01-04", "new_BERT": -1, "comentario": "d"},
            {"data_postagem": "2024-01-08", "new_BERT": 1, "comentario": "e"},
            {"data_postagem": "2024-01-09", "new_BERT": -1, "comentario": "f"},
            {"data_postagem": "2024-01-10", "comentario": "sem rótulo"}
        ])
        .to_string(),
    );
    write(root, &format!("{}/{}", OPINION_DIR, bootstrap_file), bootstrap_body);
    dir
}

const BOOTSTRAP_CSV: &str = ",mean,lower_95_ci,upper_95_ci
precision_class_0,0.70,0.65,0.75
precision_class_1,0.80,0.70,0.90
precision_class_2,0.60,0.55,0.65
";

#[tokio::test]
async fn opinion_load_with_csv_bootstrap() {
    let site = opinion_site("bootstrap.csv", BOOTSTRAP_CSV);
    let loader = loader_for(&site, Arc::new(FsFetcher));
    let data = loader.load_opinion("op-alfa").await.unwrap();
    assert_eq!(data.meta.title, "Operação Alfa");
    assert_eq!(data.meta.total, 7);
    assert_eq!(data.bootstrap.rows().len(), 3);

    let m = data.bootstrap.margins_for(Metric::Precision, Stance::Approval);
    assert!((m.plus - 0.10).abs() < 1e-9);
    assert!((m.minus - 0.10).abs() < 1e-9);

    let weekly = weekly_stance(&data.comments, &DateRange::all());
    assert_eq!(weekly.weeks, vec!["2024-01-01", "2024-01-08"]);
    assert_eq!(weekly.approval, vec![3, 1]);
    assert_eq!(weekly.disapproval, vec![1, 1]);
    // unlabelled comments count as neutral per week
    assert_eq!(weekly.neutral, vec![0, 1]);

    let flags = weekly_flags(&weekly, &data.bootstrap, Metric::Precision);
    assert_eq!(flags, vec![true, false]);
}

#[tokio::test]
async fn opinion_load_with_json_bootstrap() {
    let body = json!([
        {"": "recall_class_1", "mean": 0.5, "lower_95_ci": 0.4, "upper_95_ci": 0.6},
        {"metric": "recall", "class": 2, "mean": 0.5, "lower_95_ci": 0.45, "upper_95_ci": 0.55}
    ])
    .to_string();
    let site = opinion_site("bootstrap.json", &body);
    let loader = loader_for(&site, Arc::new(FsFetcher));
    let data = loader.load_opinion("op-alfa").await.unwrap();
    assert_eq!(data.bootstrap.rows().len(), 2);
    let m = data.bootstrap.margins_for(Metric::Recall, Stance::Disapproval);
    assert!((m.plus - 0.05).abs() < 1e-9);
}

#[tokio::test]
async fn opinion_missing_bootstrap_is_empty_table() {
    let site = opinion_site("bootstrap.csv", BOOTSTRAP_CSV);
    fs::remove_file(site.path().join(OPINION_DIR).join("bootstrap.csv")).unwrap();
    let loader = loader_for(&site, Arc::new(FsFetcher));
    let data = loader.load_opinion("op-alfa").await.unwrap();
    assert!(data.bootstrap.is_empty());
    assert_eq!(data.meta.total, 7);
}

#[tokio::test]
async fn opinion_both_files_missing_is_partial_fetch() {
    let site = opinion_site("bootstrap.csv", BOOTSTRAP_CSV);
    fs::remove_file(site.path().join(OPINION_DIR).join("bootstrap.csv")).unwrap();
    fs::remove_file(site.path().join(OPINION_DIR).join("comments.json")).unwrap();
    let loader = loader_for(&site, Arc::new(FsFetcher));
    let err = loader.load_opinion("op-alfa").await.unwrap_err();
    assert!(matches!(err, LoadError::PartialFetch { attempted: 2 }));
}

#[tokio::test]
async fn metrics_file_is_optional() {
    let site = events_site();
    let loader = loader_for(&site, Arc::new(FsFetcher));
    assert!(loader.load_metrics().await.is_empty());

    write(
        site.path(),
        "assets/data/events/metrics_comparison.json",
        &json!([{"tecnica": "BERT", "acu": 0.91}]).to_string(),
    );
    assert_eq!(loader.load_metrics().await.len(), 1);
}
