use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::record::{first_present, Record, TIMESTAMP_FIELDS};

/// Provenance summary of a local record file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordManifest {
    pub path: String,
    pub hash_sha256: String,
    pub row_count: u64,
    pub dropped_rows: u64,
    pub first_ts: Option<String>,
    pub last_ts: Option<String>,
    pub operations: u64,
    pub warnings: Vec<String>,
    pub generated_at: String,
}

pub fn analyze_records(path: &Path, generated_at: &str) -> Result<RecordManifest, String> {
    let hash = file_sha256(path)?;
    let text = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
    let value: Value = serde_json::from_str(&text).map_err(|e| e.to_string())?;
    let Value::Array(rows) = value else {
        return Err("expected a JSON array of records".to_string());
    };

    let mut warnings = Vec::new();
    let mut records = Vec::new();
    let mut missing_ts = 0u64;
    let mut bad_ts = 0u64;
    for (i, row) in rows.iter().enumerate() {
        let Some(obj) = row.as_object() else {
            warnings.push(format!("row {}: not an object", i));
            continue;
        };
        match Record::from_row(obj) {
            Some(r) => records.push(r),
            None if first_present(obj, &TIMESTAMP_FIELDS).is_none() => missing_ts += 1,
            None => bad_ts += 1,
        }
    }
    if missing_ts > 0 {
        warnings.push(format!("missing_timestamp: {} rows", missing_ts));
    }
    if bad_ts > 0 {
        warnings.push(format!("unparseable_timestamp: {} rows", bad_ts));
    }

    let fmt = |r: &Record| r.timestamp.to_rfc3339();
    let first_ts = records.iter().min_by_key(|r| r.timestamp).map(fmt);
    let last_ts = records.iter().max_by_key(|r| r.timestamp).map(fmt);
    let operations = records
        .iter()
        .filter_map(|r| r.operation.as_deref())
        .collect::<HashSet<_>>()
        .len() as u64;

    Ok(RecordManifest {
        path: path.display().to_string(),
        hash_sha256: hash,
        row_count: rows.len() as u64,
        dropped_rows: (rows.len() - records.len()) as u64,
        first_ts,
        last_ts,
        operations,
        warnings,
        generated_at: generated_at.to_string(),
    })
}

pub fn file_sha256(path: &Path) -> Result<String, String> {
    let mut file = File::open(path).map_err(|e| e.to_string())?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf).map_err(|e| e.to_string())?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

pub fn default_manifest_path(dataset_path: &Path) -> PathBuf {
    let mut p = dataset_path.to_path_buf();
    let fname = dataset_path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("dataset.json");
    p.set_file_name(format!("{}.manifest.json", fname));
    p
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_manifest_counts() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("videos.json");
        std::fs::write(
            &path,
            r#"[
                {"data_postagem": "2024-01-02", "operation_ner": "A"},
                {"data_postagem": "2023-06-01", "operation_ner": "B"},
                {"data_postagem": "nope"},
                {"title": "no date"},
                7
            ]"#,
        )
        .unwrap();
        let m = analyze_records(&path, "2026-01-01T00:00:00Z").unwrap();
        assert_eq!(m.row_count, 5);
        assert_eq!(m.dropped_rows, 3);
        assert_eq!(m.operations, 2);
        assert_eq!(m.first_ts.as_deref(), Some("2023-06-01T00:00:00+00:00"));
        assert_eq!(m.warnings.len(), 3);
        assert_eq!(m.hash_sha256.len(), 64);
    }

    #[test]
    fn test_rejects_non_array() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("x.json");
        std::fs::write(&path, "{}").unwrap();
        assert!(analyze_records(&path, "now").is_err());
    }

    #[test]
    fn test_default_manifest_path() {
        let p = default_manifest_path(Path::new("/data/videos.json"));
        assert_eq!(p, PathBuf::from("/data/videos.json.manifest.json"));
    }
}
