//! Metric history normalization.
//!
//! Historical snapshots arrive in two shapes: older records are flat
//! (`{accuracy, f1_score, auc, timestamp}`), newer ones nest the numbers
//! under `values` (`{timestamp, values: {...}}`). Charts and tables need
//! flat rows sorted by time, so everything funnels through [`normalize`].

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{lower_is_better, TaskType};

/// Absolute percentage change below which a trend counts as flat.
pub const NEUTRAL_THRESHOLD_PCT: f64 = 0.1;

/// One raw history snapshot, either shape, deserialized losslessly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    #[serde(with = "crate::timefmt")]
    pub timestamp: DateTime<Utc>,
    /// Present on nested-shape records only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<BTreeMap<String, serde_json::Value>>,
    /// Top-level metric fields of flat-shape records.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl MetricRecord {
    /// A flat record, for building histories in code.
    pub fn flat(timestamp: DateTime<Utc>, entries: &[(&str, f64)]) -> Self {
        Self {
            timestamp,
            values: None,
            extra: entries
                .iter()
                .map(|(name, value)| (name.to_string(), serde_json::json!(value)))
                .collect(),
        }
    }
}

/// Normalized flat row: timestamp plus numeric metric fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricPoint {
    #[serde(with = "crate::timefmt")]
    pub timestamp: DateTime<Utc>,
    pub values: BTreeMap<String, f64>,
}

impl MetricPoint {
    fn from_record(record: &MetricRecord) -> Self {
        let source = record.values.as_ref().unwrap_or(&record.extra);
        let values = source
            .iter()
            .filter(|(key, _)| key.as_str() != "timestamp")
            .filter_map(|(key, value)| value.as_f64().map(|n| (key.clone(), n)))
            .collect();
        Self { timestamp: record.timestamp, values }
    }

    pub fn get(&self, metric: &str) -> Option<f64> {
        self.values.get(metric).copied()
    }
}

/// Flatten every record and sort ascending by timestamp. Records already
/// flat pass through unchanged; non-numeric entries are dropped.
pub fn normalize(records: &[MetricRecord]) -> Vec<MetricPoint> {
    let mut points: Vec<MetricPoint> = records.iter().map(MetricPoint::from_record).collect();
    points.sort_by_key(|point| point.timestamp);
    points
}

/// Classify a normalized history by its metric vocabulary.
///
/// Scans forward until a point carries a distinguishing key, so an atypical
/// leading entry does not misclassify the whole sequence; an empty or
/// indeterminate history yields `None`. Callers holding a tagged record use
/// its `task_type` field instead of this.
pub fn detect_task_type(points: &[MetricPoint]) -> Option<TaskType> {
    for point in points {
        if point.values.contains_key("rmse") {
            return Some(TaskType::Regression);
        }
        if TaskType::Classification
            .metric_names()
            .iter()
            .any(|name| point.values.contains_key(*name))
        {
            return Some(TaskType::Classification);
        }
    }
    None
}

/// Direction of a two-point trend, by raw sign of the change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Positive,
    Negative,
    Neutral,
}

/// Percentage change between the two most recent snapshots of one metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Trend {
    pub change_pct: f64,
    pub direction: TrendDirection,
}

impl Trend {
    /// `None` when the previous value is zero (the change is undefined).
    pub fn between(previous: f64, current: f64) -> Option<Trend> {
        if previous == 0.0 {
            return None;
        }
        let change_pct = (current - previous) / previous * 100.0;
        let direction = if change_pct.abs() < NEUTRAL_THRESHOLD_PCT {
            TrendDirection::Neutral
        } else if change_pct > 0.0 {
            TrendDirection::Positive
        } else {
            TrendDirection::Negative
        };
        Some(Trend { change_pct, direction })
    }
}

/// Per-metric trend between the latest and the immediately preceding
/// snapshot. Empty with fewer than two points.
pub fn trends(points: &[MetricPoint]) -> BTreeMap<String, Trend> {
    let [.., previous, latest] = points else {
        return BTreeMap::new();
    };
    latest
        .values
        .iter()
        .filter_map(|(name, &current)| {
            let prior = previous.get(name)?;
            Trend::between(prior, current).map(|trend| (name.clone(), trend))
        })
        .collect()
}

/// Best observed value per metric, with the polarity each metric carries:
/// classification metrics and R² peak at their maximum, RMSE at its minimum.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistorySummary {
    pub task_type: TaskType,
    pub best: BTreeMap<String, f64>,
    pub total_evaluations: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_timestamp: Option<DateTime<Utc>>,
}

impl HistorySummary {
    pub fn from_points(task_type: TaskType, points: &[MetricPoint]) -> Self {
        let mut best = BTreeMap::new();
        for name in task_type.metric_names() {
            let observed = points.iter().filter_map(|point| point.get(name));
            let value = if lower_is_better(name) {
                observed.fold(f64::INFINITY, f64::min)
            } else {
                observed.fold(f64::NEG_INFINITY, f64::max)
            };
            if value.is_finite() {
                best.insert(name.to_string(), value);
            }
        }
        Self {
            task_type,
            best,
            total_evaluations: points.len(),
            latest_timestamp: points.last().map(|point| point.timestamp),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn ts(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, day, hour, 0, 0).unwrap()
    }

    fn flat(day: u32, entries: &[(&str, f64)]) -> MetricRecord {
        MetricRecord::flat(ts(day, 9), entries)
    }

    fn nested(day: u32, entries: &[(&str, f64)]) -> MetricRecord {
        serde_json::from_value(json!({
            "timestamp": ts(day, 9).to_rfc3339(),
            "values": entries.iter().cloned().collect::<BTreeMap<_, f64>>(),
        }))
        .unwrap()
    }

    #[test]
    fn flat_records_normalize_unchanged() {
        let record = flat(1, &[("accuracy", 0.9), ("f1_score", 0.85), ("auc", 0.92)]);
        let points = normalize(&[record.clone()]);
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].get("accuracy"), Some(0.9));
        assert_eq!(points[0].timestamp, record.timestamp);

        // Idempotent: re-normalizing the flattened row changes nothing.
        let again = normalize(&[MetricRecord::flat(
            points[0].timestamp,
            &[("accuracy", 0.9), ("f1_score", 0.85), ("auc", 0.92)],
        )]);
        assert_eq!(again, points);
    }

    #[test]
    fn nested_records_are_flattened() {
        let points = normalize(&[nested(2, &[("rmse", 3.1), ("r2_score", 0.8)])]);
        assert_eq!(points[0].get("rmse"), Some(3.1));
        assert_eq!(points[0].get("values"), None);
    }

    #[test]
    fn mixed_shapes_sort_ascending_by_timestamp() {
        let records = vec![
            nested(3, &[("accuracy", 0.93)]),
            flat(1, &[("accuracy", 0.90)]),
            flat(2, &[("accuracy", 0.91)]),
        ];
        let points = normalize(&records);
        let observed: Vec<f64> = points.iter().filter_map(|p| p.get("accuracy")).collect();
        assert_eq!(observed, vec![0.90, 0.91, 0.93]);
    }

    #[test]
    fn non_numeric_entries_are_dropped() {
        let record: MetricRecord = serde_json::from_value(json!({
            "timestamp": "2025-07-01T09:00:00",
            "accuracy": 0.9,
            "note": "manual entry"
        }))
        .unwrap();
        let points = normalize(&[record]);
        assert_eq!(points[0].values.len(), 1);
    }

    #[test]
    fn detects_regression_from_rmse() {
        let points = normalize(&[
            nested(1, &[("rmse", 2.0), ("r2_score", 0.7)]),
            nested(2, &[("rmse", 1.8), ("r2_score", 0.75)]),
        ]);
        assert_eq!(detect_task_type(&points), Some(TaskType::Regression));
    }

    #[test]
    fn detects_classification_from_accuracy() {
        let points = normalize(&[flat(1, &[("accuracy", 0.9), ("f1_score", 0.8), ("auc", 0.85)])]);
        assert_eq!(detect_task_type(&points), Some(TaskType::Classification));
    }

    #[test]
    fn detection_skips_indeterminate_leading_entries() {
        let points = normalize(&[
            flat(1, &[]),
            nested(2, &[("rmse", 2.2)]),
        ]);
        assert_eq!(detect_task_type(&points), Some(TaskType::Regression));
        assert_eq!(detect_task_type(&[]), None);
    }

    #[test]
    fn best_values_use_metric_polarity() {
        let points = normalize(&[
            nested(1, &[("rmse", 3.0), ("r2_score", 0.70)]),
            nested(2, &[("rmse", 2.4), ("r2_score", 0.78)]),
            nested(3, &[("rmse", 2.9), ("r2_score", 0.74)]),
        ]);
        let summary = HistorySummary::from_points(TaskType::Regression, &points);
        assert_eq!(summary.best["rmse"], 2.4);
        assert_eq!(summary.best["r2_score"], 0.78);
        assert_eq!(summary.total_evaluations, 3);
    }

    #[test]
    fn classification_best_is_the_maximum() {
        let points = normalize(&[
            flat(1, &[("accuracy", 0.90), ("f1_score", 0.81), ("auc", 0.88)]),
            flat(2, &[("accuracy", 0.88), ("f1_score", 0.86), ("auc", 0.91)]),
        ]);
        let summary = HistorySummary::from_points(TaskType::Classification, &points);
        assert_eq!(summary.best["accuracy"], 0.90);
        assert_eq!(summary.best["f1_score"], 0.86);
        assert_eq!(summary.best["auc"], 0.91);
    }

    #[test]
    fn trend_classifies_by_sign_with_neutral_band() {
        let up = Trend::between(0.80, 0.88).unwrap();
        assert_eq!(up.direction, TrendDirection::Positive);
        assert!((up.change_pct - 10.0).abs() < 1e-9);

        let down = Trend::between(0.90, 0.85).unwrap();
        assert_eq!(down.direction, TrendDirection::Negative);

        // 0.05% absolute change sits inside the 0.1% neutral band.
        let flat = Trend::between(1.0, 1.0005).unwrap();
        assert_eq!(flat.direction, TrendDirection::Neutral);

        assert!(Trend::between(0.0, 0.5).is_none());
    }

    #[test]
    fn trends_need_two_points() {
        let single = normalize(&[flat(1, &[("accuracy", 0.9)])]);
        assert!(trends(&single).is_empty());

        let pair = normalize(&[
            flat(1, &[("accuracy", 0.80)]),
            flat(2, &[("accuracy", 0.88)]),
        ]);
        let computed = trends(&pair);
        assert_eq!(computed["accuracy"].direction, TrendDirection::Positive);
    }

    #[test]
    fn trends_compare_latest_against_immediately_preceding() {
        let points = normalize(&[
            flat(1, &[("accuracy", 0.50)]),
            flat(2, &[("accuracy", 0.80)]),
            flat(3, &[("accuracy", 0.88)]),
        ]);
        let computed = trends(&points);
        assert!((computed["accuracy"].change_pct - 10.0).abs() < 1e-9);
    }
}
