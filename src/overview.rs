//! Summaries behind the overview, evaluation and drill-down screens.

use chrono::Datelike;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::aggregate::{self, DateRange, Granularity, Series, StanceCounts};
use crate::bootstrap::{model_accuracy, BootstrapTable, ModelAccuracy};
use crate::record::{first_present, Record, Stance};

const TECHNIQUE_FIELDS: [&str; 4] = ["tecnica", "label", "nome", "tech"];
const ACCURACY_FIELDS: [&str; 3] = ["accuracy", "acuracia", "acu"];
const PRECISION_FIELDS: [&str; 2] = ["precision", "pre"];
const RECALL_FIELDS: [&str; 3] = ["recall", "rev", "revocacao"];
const F1_FIELDS: [&str; 1] = ["f1"];

const SAMPLE_MIN_CHARS: usize = 50;
const SAMPLES_PER_CLASS: usize = 2;

#[derive(Debug, Clone, Serialize)]
pub struct DatasetStats {
    pub total_videos: usize,
    pub unique_operations: usize,
    pub period_label: String,
    pub avg_videos_per_operation: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PerformanceMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TechniquePerformance {
    pub label: String,
    pub metrics: PerformanceMetrics,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluationsOverview {
    pub datasets: DatasetStats,
    pub performance: Vec<TechniquePerformance>,
    pub videos_by_period: Series,
}

fn metric_value(row: &Map<String, Value>, fields: &[&str]) -> f64 {
    first_present(row, fields)
        .and_then(|v| match v {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
        .unwrap_or(0.0)
}

/// Maps `metrics_comparison.json` rows, whose field names vary by author.
pub fn technique_performance(rows: &[Value]) -> Vec<TechniquePerformance> {
    rows.iter()
        .filter_map(Value::as_object)
        .map(|row| TechniquePerformance {
            label: first_present(row, &TECHNIQUE_FIELDS)
                .and_then(Value::as_str)
                .unwrap_or("Técnica")
                .to_string(),
            metrics: PerformanceMetrics {
                accuracy: metric_value(row, &ACCURACY_FIELDS),
                precision: metric_value(row, &PRECISION_FIELDS),
                recall: metric_value(row, &RECALL_FIELDS),
                f1: metric_value(row, &F1_FIELDS),
            },
        })
        .collect()
}

/// `min–max` over record years, or `—`.
pub fn year_span_label(records: &[Record]) -> String {
    let years = records.iter().map(|r| r.timestamp.year());
    match (years.clone().min(), years.max()) {
        (Some(a), Some(b)) => format!("{}–{}", a, b),
        _ => "—".to_string(),
    }
}

pub fn evaluations_overview(records: &[Record], metrics_rows: &[Value]) -> EvaluationsOverview {
    let total_videos = records.len();
    let unique_operations = aggregate::distinct_operations(records);
    let avg = if unique_operations == 0 {
        0.0
    } else {
        (total_videos as f64 / unique_operations as f64 * 10.0).round() / 10.0
    };
    EvaluationsOverview {
        datasets: DatasetStats {
            total_videos,
            unique_operations,
            period_label: year_span_label(records),
            avg_videos_per_operation: avg,
        },
        performance: technique_performance(metrics_rows),
        videos_by_period: aggregate::aggregate(records, Granularity::Year, &DateRange::all()),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OperationOverview {
    pub op_id: String,
    pub total_videos: usize,
    pub period_label: String,
    pub videos_by_day: Series,
}

/// Records of one operation, matched case-insensitively after trimming.
pub fn operation_records<'a>(records: &'a [Record], op_id: &str) -> Vec<&'a Record> {
    let wanted = op_id.trim().to_lowercase();
    if wanted.is_empty() {
        return Vec::new();
    }
    records
        .iter()
        .filter(|r| r.operation_key().as_deref() == Some(wanted.as_str()))
        .collect()
}

pub fn operation_overview(records: &[Record], op_id: &str) -> OperationOverview {
    let items: Vec<Record> = operation_records(records, op_id).into_iter().cloned().collect();
    OperationOverview {
        op_id: op_id.to_string(),
        total_videos: items.len(),
        period_label: aggregate::period_label(&items),
        videos_by_day: aggregate::aggregate(&items, Granularity::Day, &DateRange::all()),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StancePercentages {
    pub negative: u32,
    pub neutral: u32,
    pub positive: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct OpinionSummary {
    pub total_comments: usize,
    pub counts: StanceCounts,
    pub percentages: StancePercentages,
    pub samples: Vec<Record>,
    pub model_accuracy: ModelAccuracy,
}

fn percent(part: u64, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    (part as f64 / total as f64 * 100.0).round() as u32
}

/// Up to two long comments per class: approval, then neutral, then
/// disapproval.
pub fn sample_comments(comments: &[Record]) -> Vec<Record> {
    let long = |r: &&Record| {
        r.text
            .as_ref()
            .map_or(false, |t| t.chars().count() > SAMPLE_MIN_CHARS)
    };
    [Stance::Approval, Stance::Neutral, Stance::Disapproval]
        .iter()
        .flat_map(|class| {
            comments
                .iter()
                .filter(long)
                .filter(move |r| r.stance == Some(*class))
                .take(SAMPLES_PER_CLASS)
                .cloned()
        })
        .collect()
}

pub fn opinion_summary(comments: &[Record], table: &BootstrapTable) -> OpinionSummary {
    let total = comments.len();
    let counts = aggregate::stance_counts(comments);
    OpinionSummary {
        total_comments: total,
        counts,
        percentages: StancePercentages {
            negative: percent(counts.disapproval, total),
            neutral: percent(counts.neutral, total),
            positive: percent(counts.approval, total),
        },
        samples: sample_comments(comments),
        model_accuracy: model_accuracy(table),
    }
}
