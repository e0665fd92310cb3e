//! Temporal bucketing of normalized records.
//!
//! All date arithmetic is UTC. Ranges cover whole days on both ends.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::record::{Record, Stance};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Day,
    Week,
    Month,
    Year,
}

impl Granularity {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "day" | "dia" => Some(Granularity::Day),
            "week" | "semana" => Some(Granularity::Week),
            "month" | "mes" | "mês" => Some(Granularity::Month),
            "year" | "ano" => Some(Granularity::Year),
            _ => None,
        }
    }
}

/// Chart-ready series: `labels[i]` pairs with `values[i]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Series {
    pub labels: Vec<String>,
    pub values: Vec<u64>,
}

impl Series {
    fn from_counts(counts: BTreeMap<String, u64>) -> Self {
        let (labels, values) = counts.into_iter().unzip();
        Self { labels, values }
    }

    pub fn total(&self) -> u64 {
        self.values.iter().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// `start <= ts < end_before`; either side may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<DateTime<Utc>>,
    pub end_before: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn all() -> Self {
        Self::default()
    }

    /// Whole-day range: from `start` midnight up to the midnight after
    /// `end`, so every instant on the end date is included.
    pub fn from_dates(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        let midnight = |d: NaiveDate| Utc.from_utc_datetime(&d.and_time(NaiveTime::MIN));
        Self {
            start: start.map(midnight),
            end_before: end.map(|d| midnight(d) + Duration::days(1)),
        }
    }

    pub fn contains(&self, ts: &DateTime<Utc>) -> bool {
        self.start.map_or(true, |s| *ts >= s) && self.end_before.map_or(true, |e| *ts < e)
    }
}

/// Monday of the ISO week containing `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

pub fn bucket_key(ts: &DateTime<Utc>, granularity: Granularity) -> String {
    let date = ts.date_naive();
    match granularity {
        Granularity::Day => date.format("%Y-%m-%d").to_string(),
        Granularity::Week => week_start(date).format("%Y-%m-%d").to_string(),
        Granularity::Month => format!("{:04}-{:02}-01", date.year(), date.month()),
        Granularity::Year => format!("{:04}", date.year()),
    }
}

fn bucket_timestamps<'a>(
    stamps: impl Iterator<Item = &'a DateTime<Utc>>,
    granularity: Granularity,
    range: &DateRange,
) -> Series {
    let mut counts: BTreeMap<String, u64> = BTreeMap::new();
    for ts in stamps.filter(|ts| range.contains(ts)) {
        *counts.entry(bucket_key(ts, granularity)).or_insert(0) += 1;
    }
    Series::from_counts(counts)
}

/// Counts records per bucket. Labels come out sorted and unique.
pub fn aggregate(records: &[Record], granularity: Granularity, range: &DateRange) -> Series {
    bucket_timestamps(records.iter().map(|r| &r.timestamp), granularity, range)
}

/// Earliest timestamp per operation; records without one are skipped.
pub fn first_appearances(records: &[Record]) -> HashMap<String, DateTime<Utc>> {
    let mut earliest: HashMap<String, DateTime<Utc>> = HashMap::new();
    for r in records {
        let Some(op) = r.operation.as_ref() else {
            continue;
        };
        earliest
            .entry(op.clone())
            .and_modify(|ts| {
                if r.timestamp < *ts {
                    *ts = r.timestamp;
                }
            })
            .or_insert(r.timestamp);
    }
    earliest
}

/// Counts distinct events: each operation contributes once, in the bucket
/// of its first appearance.
pub fn aggregate_first_appearance(
    records: &[Record],
    granularity: Granularity,
    range: &DateRange,
) -> Series {
    let earliest = first_appearances(records);
    bucket_timestamps(earliest.values(), granularity, range)
}

pub fn distinct_operations(records: &[Record]) -> usize {
    records
        .iter()
        .filter_map(|r| r.operation.as_deref())
        .collect::<HashSet<_>>()
        .len()
}

/// `YYYY-MM-DD – YYYY-MM-DD` over the record span, or `—` when empty.
pub fn period_label(records: &[Record]) -> String {
    let min = records.iter().map(|r| r.timestamp).min();
    let max = records.iter().map(|r| r.timestamp).max();
    match (min, max) {
        (Some(a), Some(b)) => format!(
            "{} – {}",
            a.date_naive().format("%Y-%m-%d"),
            b.date_naive().format("%Y-%m-%d")
        ),
        _ => "—".to_string(),
    }
}

// =============================================================================
// Stance breakdowns
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StanceCounts {
    pub approval: u64,
    pub disapproval: u64,
    pub neutral: u64,
}

impl StanceCounts {
    /// Missing or unknown stances count as neutral.
    pub fn add(&mut self, stance: Option<Stance>) {
        match stance {
            Some(Stance::Approval) => self.approval += 1,
            Some(Stance::Disapproval) => self.disapproval += 1,
            _ => self.neutral += 1,
        }
    }

    pub fn get(&self, stance: Stance) -> u64 {
        match stance {
            Stance::Approval => self.approval,
            Stance::Disapproval => self.disapproval,
            Stance::Neutral => self.neutral,
        }
    }

    pub fn total(&self) -> u64 {
        self.approval + self.disapproval + self.neutral
    }

    pub fn proportion(&self, stance: Stance) -> f64 {
        self.get(stance) as f64 / self.total().max(1) as f64
    }
}

/// Per-week stance counts, aligned by index with `weeks`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WeeklyStance {
    pub weeks: Vec<String>,
    pub approval: Vec<u64>,
    pub disapproval: Vec<u64>,
    pub neutral: Vec<u64>,
}

pub fn weekly_stance(records: &[Record], range: &DateRange) -> WeeklyStance {
    let mut buckets: BTreeMap<String, StanceCounts> = BTreeMap::new();
    for r in records.iter().filter(|r| range.contains(&r.timestamp)) {
        buckets
            .entry(bucket_key(&r.timestamp, Granularity::Week))
            .or_default()
            .add(r.stance);
    }
    let mut out = WeeklyStance::default();
    for (week, c) in buckets {
        out.weeks.push(week);
        out.approval.push(c.approval);
        out.disapproval.push(c.disapproval);
        out.neutral.push(c.neutral);
    }
    out
}

/// Counts within `[week_start, week_start + 7 days)`.
pub fn week_counts(records: &[Record], week: NaiveDate) -> StanceCounts {
    let start = Utc.from_utc_datetime(&week.and_time(NaiveTime::MIN));
    let end = start + Duration::days(7);
    let mut counts = StanceCounts::default();
    for r in records.iter().filter(|r| r.timestamp >= start && r.timestamp < end) {
        counts.add(r.stance);
    }
    counts
}

/// Overall distribution; records without a recognised stance count as
/// neutral, so the classes always sum to the record count.
pub fn stance_counts(records: &[Record]) -> StanceCounts {
    let mut counts = StanceCounts::default();
    for r in records {
        counts.add(r.stance);
    }
    counts
}

/// `dd/mm/yyyy – dd/mm/yyyy` for the Monday..Sunday span of a week key.
pub fn week_range_label(week: NaiveDate) -> String {
    let end = week + Duration::days(6);
    format!("{} – {}", week.format("%d/%m/%Y"), end.format("%d/%m/%Y"))
}
