use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// File value marking the pseudo-dataset that compiles every other file.
pub const ALL_FILES_SENTINEL: &str = "__ALL__";

/// Where a dataset's files live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DatasetSource {
    /// One record file.
    File { file: String },
    /// Concatenation of every concrete file in the index.
    AllFiles,
    /// Comments plus bootstrap intervals.
    Opinion {
        comments_file: String,
        bootstrap_file: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Descriptor {
    pub label: String,
    pub description: Option<String>,
    pub source: DatasetSource,
}

#[derive(Deserialize)]
struct RawDescriptor {
    label: Option<String>,
    title: Option<String>,
    description: Option<String>,
    file: Option<String>,
    #[serde(rename = "commentsFile")]
    comments_file: Option<String>,
    #[serde(rename = "bootstrapFile")]
    bootstrap_file: Option<String>,
}

impl Descriptor {
    /// Entries without any usable file reference yield `None`.
    pub fn from_value(id: &str, value: &Value) -> Option<Self> {
        let raw: RawDescriptor = serde_json::from_value(value.clone()).ok()?;
        let source = match (raw.file, raw.comments_file, raw.bootstrap_file) {
            (Some(f), _, _) if f == ALL_FILES_SENTINEL => DatasetSource::AllFiles,
            (Some(file), _, _) if !file.trim().is_empty() => DatasetSource::File { file },
            (_, Some(comments_file), Some(bootstrap_file)) => DatasetSource::Opinion {
                comments_file,
                bootstrap_file,
            },
            _ => return None,
        };
        Some(Self {
            label: raw.label.or(raw.title).unwrap_or_else(|| id.to_string()),
            description: raw.description.filter(|d| !d.is_empty()),
            source,
        })
    }

    pub fn is_aggregate(&self) -> bool {
        self.source == DatasetSource::AllFiles
    }
}

/// Dataset index in file order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DatasetIndex {
    entries: Vec<(String, Descriptor)>,
}

impl DatasetIndex {
    pub fn from_json(value: &Value) -> Self {
        let Some(map) = value.as_object() else {
            return Self::default();
        };
        Self::from_map(map)
    }

    fn from_map(map: &Map<String, Value>) -> Self {
        let entries = map
            .iter()
            .filter_map(|(id, v)| Descriptor::from_value(id, v).map(|d| (id.clone(), d)))
            .collect();
        Self { entries }
    }

    pub fn get(&self, id: &str) -> Option<&Descriptor> {
        self.entries.iter().find(|(k, _)| k == id).map(|(_, d)| d)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Descriptor)> {
        self.entries.iter().map(|(k, d)| (k.as_str(), d))
    }

    /// Last entry in file order, i.e. the most recently added dataset.
    pub fn latest(&self) -> Option<(&str, &Descriptor)> {
        self.entries.last().map(|(k, d)| (k.as_str(), d))
    }

    /// Concrete single-file entries, excluding the aggregate sentinel.
    pub fn concrete_files(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter_map(|(_, d)| match &d.source {
                DatasetSource::File { file } => Some(file.as_str()),
                _ => None,
            })
            .collect()
    }
}
