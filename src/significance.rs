use serde::Serialize;

use crate::aggregate::{StanceCounts, WeeklyStance};
use crate::bootstrap::{BootstrapTable, Margins, Metric};
use crate::record::Stance;

fn clamp01(v: f64) -> f64 {
    v.clamp(0.0, 1.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Interval {
    pub low: f64,
    pub high: f64,
}

impl Interval {
    /// `[p - minus, p + plus]` clamped to `[0, 1]`.
    pub fn around(p: f64, margins: &Margins) -> Self {
        Self {
            low: clamp01(p - margins.minus.max(0.0)),
            high: clamp01(p + margins.plus.max(0.0)),
        }
    }

    /// Touching endpoints count as intersecting.
    pub fn intersects(&self, other: &Interval) -> bool {
        !(self.high < other.low || other.high < self.low)
    }
}

/// True iff the two proportion intervals intersect.
pub fn overlaps(p_a: f64, margins_a: &Margins, p_d: f64, margins_d: &Margins) -> bool {
    Interval::around(p_a, margins_a).intersects(&Interval::around(p_d, margins_d))
}

/// Flags buckets whose approval/disapproval intervals are disjoint.
/// Buckets with no approval or disapproval observations are never flagged.
pub fn significance_flags(
    approval: &[u64],
    disapproval: &[u64],
    table: &BootstrapTable,
    metric: Metric,
) -> Vec<bool> {
    let m_a = table.margins_for(metric, Stance::Approval);
    let m_d = table.margins_for(metric, Stance::Disapproval);
    approval
        .iter()
        .enumerate()
        .map(|(i, &a)| {
            let d = disapproval.get(i).copied().unwrap_or(0);
            let denom = a + d;
            if denom == 0 {
                return false;
            }
            let p_a = a as f64 / denom as f64;
            let p_d = d as f64 / denom as f64;
            !overlaps(p_a, &m_a, p_d, &m_d)
        })
        .collect()
}

pub fn weekly_flags(weekly: &WeeklyStance, table: &BootstrapTable, metric: Metric) -> Vec<bool> {
    significance_flags(&weekly.approval, &weekly.disapproval, table, metric)
}

/// Drill-down bar: observed proportion with the classifier margin applied.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ErrorBar {
    pub class: Stance,
    pub count: u64,
    pub proportion: f64,
    pub low: f64,
    pub high: f64,
}

/// One bar per class, in approval, disapproval, neutral order.
pub fn error_bars(counts: &StanceCounts, table: &BootstrapTable, metric: Metric) -> Vec<ErrorBar> {
    Stance::ALL
        .iter()
        .map(|&class| {
            let proportion = counts.proportion(class);
            let ci = Interval::around(proportion, &table.margins_for(metric, class));
            ErrorBar {
                class,
                count: counts.get(class),
                proportion,
                low: ci.low,
                high: ci.high,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_touching_intervals_overlap() {
        let m = Margins::symmetric(0.0, 0.05);
        // [0.55, 0.65] and [0.45, 0.55] share 0.55
        let a = Interval { low: 0.55, high: 0.65 };
        let d = Interval { low: 0.45, high: 0.55 };
        assert!(a.intersects(&d));
        assert!(overlaps(0.6, &m, 0.5, &m));
    }

    #[test]
    fn test_disjoint_intervals() {
        let m = Margins::symmetric(0.0, 0.05);
        assert!(!overlaps(0.8, &m, 0.2, &m));
    }

    #[test]
    fn test_equal_means_always_overlap() {
        let zero = Margins::default();
        let wide = Margins::symmetric(0.0, 0.3);
        assert!(overlaps(0.4, &zero, 0.4, &zero));
        assert!(overlaps(0.4, &wide, 0.4, &zero));
    }

    #[test]
    fn test_clamping() {
        let i = Interval::around(0.98, &Margins::symmetric(0.0, 0.1));
        assert_eq!(i.high, 1.0);
        let i = Interval::around(0.02, &Margins::symmetric(0.0, 0.1));
        assert_eq!(i.low, 0.0);
    }

    fn table() -> BootstrapTable {
        BootstrapTable::from_json(&json!([
            {"": "precision_class_1", "mean": 0.8, "lower_95_ci": 0.75, "upper_95_ci": 0.85},
            {"": "precision_class_2", "mean": 0.7, "lower_95_ci": 0.65, "upper_95_ci": 0.75},
        ]))
    }

    #[test]
    fn test_flags_per_bucket() {
        let flags = significance_flags(&[8, 5, 0], &[2, 5, 0], &table(), Metric::Precision);
        assert_eq!(flags, vec![true, false, false]);
    }

    #[test]
    fn test_flags_without_bootstrap_use_point_estimates() {
        let flags = significance_flags(&[3, 2], &[1, 2], &BootstrapTable::default(), Metric::Precision);
        assert_eq!(flags, vec![true, false]);
    }

    #[test]
    fn test_error_bars_order_and_bounds() {
        let counts = StanceCounts {
            approval: 6,
            disapproval: 3,
            neutral: 1,
        };
        let bars = error_bars(&counts, &table(), Metric::Precision);
        assert_eq!(bars.len(), 3);
        assert_eq!(bars[0].class, Stance::Approval);
        assert!((bars[0].proportion - 0.6).abs() < 1e-12);
        assert!((bars[0].low - 0.55).abs() < 1e-9);
        assert!((bars[0].high - 0.65).abs() < 1e-9);
        assert_eq!(bars[2].count, 1);
    }
}
