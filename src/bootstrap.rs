//! Bootstrap confidence intervals for the stance classifier.
//!
//! Rows come either keyed by a composite string
//! (`{"": "precision_class_1", "mean": .., "lower_95_ci": .., "upper_95_ci": ..}`)
//! or with separate `metric`/`class` columns, in JSON or CSV.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::record::Stance;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Precision,
    Recall,
    F1,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Metric::Precision, Metric::Recall, Metric::F1];

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Precision => "precision",
            Metric::Recall => "recall",
            Metric::F1 => "f1",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "precision" => Some(Metric::Precision),
            "recall" => Some(Metric::Recall),
            "f1" | "f1-score" | "f1_score" => Some(Metric::F1),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BootstrapRow {
    pub metric: Metric,
    pub class_id: String,
    pub mean: f64,
    pub lower: f64,
    pub upper: f64,
}

impl BootstrapRow {
    pub fn key(&self) -> String {
        format!("{}_class_{}", self.metric.as_str(), self.class_id)
    }
}

/// Splits `"<metric>_class_<id>"`.
pub fn parse_composite_key(key: &str) -> Option<(Metric, String)> {
    let (metric, class_id) = key.split_once("_class_")?;
    let class_id = class_id.trim();
    if class_id.is_empty() {
        return None;
    }
    Some((Metric::parse(metric)?, class_id.to_string()))
}

fn num(v: Option<&Value>) -> Option<f64> {
    match v? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn class_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Margins around a class mean: `[mean - minus, mean + plus]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Margins {
    pub mean: f64,
    pub plus: f64,
    pub minus: f64,
}

impl Margins {
    pub fn symmetric(mean: f64, margin: f64) -> Self {
        Self {
            mean,
            plus: margin,
            minus: margin,
        }
    }
}

/// Class → id mapping. Convention: neutral 0, approval 1, disapproval 2.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassIdMap {
    ids: BTreeMap<Stance, String>,
}

impl Default for ClassIdMap {
    fn default() -> Self {
        let mut ids = BTreeMap::new();
        ids.insert(Stance::Neutral, "0".to_string());
        ids.insert(Stance::Approval, "1".to_string());
        ids.insert(Stance::Disapproval, "2".to_string());
        Self { ids }
    }
}

impl ClassIdMap {
    pub fn with(mut self, class: Stance, id: impl Into<String>) -> Self {
        self.ids.insert(class, id.into());
        self
    }

    pub fn id_for(&self, class: Stance) -> &str {
        self.ids.get(&class).map(String::as_str).unwrap_or("0")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BootstrapTable {
    rows: Vec<BootstrapRow>,
    #[serde(skip)]
    class_ids: ClassIdMap,
}

impl BootstrapTable {
    pub fn new(rows: Vec<BootstrapRow>) -> Self {
        Self {
            rows,
            class_ids: ClassIdMap::default(),
        }
    }

    pub fn with_class_ids(mut self, class_ids: ClassIdMap) -> Self {
        self.class_ids = class_ids;
        self
    }

    /// Accepts a JSON array in either row shape; rows that do not parse
    /// are skipped. Non-array input yields an empty table.
    pub fn from_json(value: &Value) -> Self {
        let rows = value
            .as_array()
            .map(|items| items.iter().filter_map(row_from_json).collect())
            .unwrap_or_default();
        Self::new(rows)
    }

    /// Accepts `metric,class,mean,lower_95_ci,upper_95_ci` or the
    /// pandas-style `,mean,lower_95_ci,upper_95_ci` with a composite key
    /// in the first column.
    pub fn from_csv(text: &str) -> Self {
        let mut lines = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'));
        let Some(header) = lines.next() else {
            return Self::default();
        };
        let cols: Vec<String> = header
            .split(',')
            .map(|c| c.trim().trim_matches('"').to_ascii_lowercase())
            .collect();
        let idx = |name: &str| cols.iter().position(|c| c == name);
        let (Some(mean_i), Some(lower_i), Some(upper_i)) =
            (idx("mean"), idx("lower_95_ci"), idx("upper_95_ci"))
        else {
            return Self::default();
        };
        let metric_i = idx("metric");
        let class_i = idx("class");

        let mut rows = Vec::new();
        for line in lines {
            let cells: Vec<&str> = line.split(',').map(|c| c.trim().trim_matches('"')).collect();
            let cell = |i: usize| cells.get(i).copied();
            let key = match (metric_i, class_i) {
                (Some(m), Some(c)) => cell(m)
                    .and_then(Metric::parse)
                    .zip(cell(c).filter(|s| !s.is_empty()).map(str::to_string)),
                _ => cell(0).and_then(parse_composite_key),
            };
            let parsed = |i: usize| cell(i).and_then(|s| s.parse::<f64>().ok());
            if let (Some((metric, class_id)), Some(mean), Some(lower), Some(upper)) =
                (key, parsed(mean_i), parsed(lower_i), parsed(upper_i))
            {
                rows.push(BootstrapRow {
                    metric,
                    class_id,
                    mean,
                    lower,
                    upper,
                });
            }
        }
        Self::new(rows)
    }

    pub fn rows(&self) -> &[BootstrapRow] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn find(&self, metric: Metric, class_id: &str) -> Option<&BootstrapRow> {
        self.rows
            .iter()
            .find(|r| r.metric == metric && r.class_id == class_id)
    }

    /// Uses the conventional id when the table has it for `metric`,
    /// otherwise the smallest id present for that metric.
    pub fn resolve_class_id(&self, metric: Metric, class: Stance) -> Option<String> {
        let mut ids: Vec<&str> = self
            .rows
            .iter()
            .filter(|r| r.metric == metric)
            .map(|r| r.class_id.as_str())
            .collect();
        if ids.is_empty() {
            return None;
        }
        let preferred = self.class_ids.id_for(class);
        if ids.contains(&preferred) {
            return Some(preferred.to_string());
        }
        ids.sort_unstable();
        ids.first().map(|s| s.to_string())
    }

    /// Asymmetric margins for a class; zero when no row matches.
    pub fn margins_for(&self, metric: Metric, class: Stance) -> Margins {
        let Some(row) = self
            .resolve_class_id(metric, class)
            .and_then(|id| self.find(metric, &id))
        else {
            return Margins::default();
        };
        Margins {
            mean: row.mean,
            plus: (row.upper - row.mean).max(0.0),
            minus: (row.mean - row.lower).max(0.0),
        }
    }

    /// Mean of the class means for `metric`, in whole percent.
    pub fn average_percent(&self, metric: Metric) -> u32 {
        let means: Vec<f64> = self
            .rows
            .iter()
            .filter(|r| r.metric == metric)
            .map(|r| r.mean)
            .collect();
        if means.is_empty() {
            return 0;
        }
        let avg = means.iter().sum::<f64>() / means.len() as f64;
        (avg * 100.0).round().max(0.0) as u32
    }

    pub fn grouped(&self) -> Vec<MetricGroup> {
        let mut groups: Vec<MetricGroup> = Vec::new();
        for row in &self.rows {
            match groups.iter_mut().find(|g| g.metric == row.metric) {
                Some(g) => g.items.push(row.clone()),
                None => groups.push(MetricGroup {
                    metric: row.metric,
                    items: vec![row.clone()],
                }),
            }
        }
        groups
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricGroup {
    pub metric: Metric,
    pub items: Vec<BootstrapRow>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModelAccuracy {
    pub precision: u32,
    pub recall: u32,
    pub f1: u32,
}

pub fn model_accuracy(table: &BootstrapTable) -> ModelAccuracy {
    ModelAccuracy {
        precision: table.average_percent(Metric::Precision),
        recall: table.average_percent(Metric::Recall),
        f1: table.average_percent(Metric::F1),
    }
}

fn row_from_json(item: &Value) -> Option<BootstrapRow> {
    let obj = item.as_object()?;
    let (metric, class_id) = match obj.get("").and_then(Value::as_str) {
        Some(key) => parse_composite_key(key)?,
        None => (
            obj.get("metric").and_then(Value::as_str).and_then(Metric::parse)?,
            obj.get("class").and_then(class_string)?,
        ),
    };
    Some(BootstrapRow {
        metric,
        class_id,
        mean: num(obj.get("mean"))?,
        lower: num(obj.get("lower_95_ci"))?,
        upper: num(obj.get("upper_95_ci"))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn table() -> BootstrapTable {
        BootstrapTable::from_json(&json!([
            {"": "precision_class_0", "mean": 0.70, "lower_95_ci": 0.65, "upper_95_ci": 0.74},
            {"": "precision_class_1", "mean": 0.80, "lower_95_ci": 0.75, "upper_95_ci": 0.86},
            {"": "precision_class_2", "mean": 0.60, "lower_95_ci": 0.62, "upper_95_ci": 0.66},
            {"": "recall_class_1", "mean": 0.50, "lower_95_ci": 0.40, "upper_95_ci": 0.60},
            {"": "garbage", "mean": 1.0, "lower_95_ci": 1.0, "upper_95_ci": 1.0},
        ]))
    }

    #[test]
    fn test_margins_for_conventional_ids() {
        let t = table();
        let m = t.margins_for(Metric::Precision, Stance::Approval);
        assert!((m.mean - 0.80).abs() < 1e-12);
        assert!((m.plus - 0.06).abs() < 1e-9);
        assert!((m.minus - 0.05).abs() < 1e-9);
    }

    #[test]
    fn test_margins_clamped_non_negative() {
        let m = table().margins_for(Metric::Precision, Stance::Disapproval);
        assert_eq!(m.minus, 0.0);
    }

    #[test]
    fn test_missing_row_gives_zero_margins() {
        let m = table().margins_for(Metric::F1, Stance::Neutral);
        assert_eq!(m, Margins::default());
        let m = BootstrapTable::default().margins_for(Metric::Precision, Stance::Approval);
        assert_eq!(m, Margins::default());
    }

    #[test]
    fn test_fallback_to_smallest_available_id() {
        // only class 1 exists for recall, so neutral falls back to it
        let t = table();
        assert_eq!(t.resolve_class_id(Metric::Recall, Stance::Neutral).as_deref(), Some("1"));
    }

    #[test]
    fn test_override_class_ids() {
        let t = table().with_class_ids(ClassIdMap::default().with(Stance::Approval, "0"));
        let m = t.margins_for(Metric::Precision, Stance::Approval);
        assert!((m.mean - 0.70).abs() < 1e-12);
    }

    #[test]
    fn test_column_shape_json() {
        let t = BootstrapTable::from_json(&json!([
            {"metric": "f1", "class": 2, "mean": "0.5", "lower_95_ci": 0.4, "upper_95_ci": 0.6}
        ]));
        assert_eq!(t.rows().len(), 1);
        assert_eq!(t.rows()[0].key(), "f1_class_2");
    }

    #[test]
    fn test_csv_variants() {
        let a = BootstrapTable::from_csv(
            "metric,class,mean,lower_95_ci,upper_95_ci\nprecision,1,0.8,0.75,0.85\nrecall,2,0.6,0.5,0.7\n",
        );
        assert_eq!(a.rows().len(), 2);
        let b = BootstrapTable::from_csv(
            ",mean,lower_95_ci,upper_95_ci\nprecision_class_1,0.8,0.75,0.85\nbad_row,x,y,z\n",
        );
        assert_eq!(b.rows().len(), 1);
        assert_eq!(a.find(Metric::Precision, "1"), b.find(Metric::Precision, "1"));
        assert!(BootstrapTable::from_csv("a,b\n1,2").is_empty());
    }

    #[test]
    fn test_model_accuracy_and_groups() {
        let t = table();
        let acc = model_accuracy(&t);
        assert_eq!(acc.precision, 70);
        assert_eq!(acc.recall, 50);
        assert_eq!(acc.f1, 0);
        let groups = t.grouped();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].items.len(), 3);
    }
}
