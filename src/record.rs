//! Normalization of raw JSON rows into [`Record`]s.
//!
//! Source files disagree on field names, so each logical field has an
//! ordered list of candidates; the first non-null one wins.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::logging::log_records_dropped;

pub const TIMESTAMP_FIELDS: [&str; 3] = ["data_postagem", "date", "day"];
pub const OPERATION_FIELDS: [&str; 4] = ["operation_ner", "operation_id", "operation", "op"];
pub const STANCE_FIELDS: [&str; 2] = ["new_BERT", "label"];
pub const TEXT_FIELDS: [&str; 3] = ["comentario", "comment", "text"];

/// Classifier output for a comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stance {
    Disapproval,
    Neutral,
    Approval,
}

impl Stance {
    pub const ALL: [Stance; 3] = [Stance::Approval, Stance::Disapproval, Stance::Neutral];

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Stance::Approval),
            0 => Some(Stance::Neutral),
            -1 => Some(Stance::Disapproval),
            _ => None,
        }
    }

    pub fn code(&self) -> i64 {
        match self {
            Stance::Approval => 1,
            Stance::Neutral => 0,
            Stance::Disapproval => -1,
        }
    }

    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
                .and_then(Self::from_code),
            Value::String(s) => s.trim().parse::<i64>().ok().and_then(Self::from_code),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Stance::Approval => "Aprovação",
            Stance::Neutral => "Neutro",
            Stance::Disapproval => "Desaprovação",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub timestamp: DateTime<Utc>,
    pub operation: Option<String>,
    pub stance: Option<Stance>,
    pub text: Option<String>,
    /// Original row, kept for drill-down tables.
    pub fields: Map<String, Value>,
}

/// First candidate that is present, non-null and, for strings, non-blank.
pub fn first_present<'a>(row: &'a Map<String, Value>, candidates: &[&str]) -> Option<&'a Value> {
    candidates.iter().find_map(|key| match row.get(*key) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.trim().is_empty() => None,
        Some(v) => Some(v),
    })
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Parses the timestamp formats found in the record files.
/// Naive values are read as UTC; bare integers are epoch milliseconds.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n.as_i64().and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        Value::String(s) => parse_timestamp_str(s),
        _ => None,
    }
}

pub fn parse_timestamp_str(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

impl Record {
    /// Returns `None` when the row has no parseable timestamp.
    pub fn from_row(row: &Map<String, Value>) -> Option<Self> {
        let timestamp = first_present(row, &TIMESTAMP_FIELDS).and_then(parse_timestamp)?;
        let operation = first_present(row, &OPERATION_FIELDS)
            .and_then(value_to_string)
            .filter(|s| !s.is_empty());
        let stance = first_present(row, &STANCE_FIELDS).and_then(Stance::from_value);
        let text = first_present(row, &TEXT_FIELDS).and_then(|v| v.as_str().map(str::to_string));
        Some(Self {
            timestamp,
            operation,
            stance,
            text,
            fields: row.clone(),
        })
    }

    /// Lower-cased operation id for case-insensitive lookups.
    pub fn operation_key(&self) -> Option<String> {
        self.operation.as_ref().map(|op| op.to_lowercase())
    }
}

/// Normalizes a batch; non-object rows and rows without a valid
/// timestamp are dropped.
pub fn normalize(source: &str, rows: &[Value]) -> Vec<Record> {
    let records: Vec<Record> = rows
        .iter()
        .filter_map(Value::as_object)
        .filter_map(Record::from_row)
        .collect();
    log_records_dropped(source, records.len(), rows.len() - records.len());
    records
}
