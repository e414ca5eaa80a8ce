//! Models as listed by the dashboard API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::metrics::MetricRecord;

/// Which metric vocabulary applies to a model. Carried explicitly on every
/// model record; never inferred from key presence on tagged data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    Classification,
    Regression,
}

impl TaskType {
    pub fn label(&self) -> &'static str {
        match self {
            TaskType::Classification => "classification",
            TaskType::Regression => "regression",
        }
    }

    /// Metric names for this task type, in display order.
    pub fn metric_names(&self) -> &'static [&'static str] {
        match self {
            TaskType::Classification => &["accuracy", "f1_score", "auc"],
            TaskType::Regression => &["rmse", "r2_score"],
        }
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// True when a smaller value of the named metric is the better one. RMSE is
/// the only such metric; everything else in both vocabularies grows upward.
pub fn lower_is_better(metric: &str) -> bool {
    metric == "rmse"
}

/// Latest metric snapshot of a model, shaped by its task type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "task_type", rename_all = "lowercase")]
pub enum Metrics {
    Classification {
        accuracy: f64,
        f1_score: f64,
        auc: f64,
    },
    Regression {
        rmse: f64,
        r2_score: f64,
    },
}

impl Metrics {
    pub fn task_type(&self) -> TaskType {
        match self {
            Metrics::Classification { .. } => TaskType::Classification,
            Metrics::Regression { .. } => TaskType::Regression,
        }
    }

    /// `(name, value)` pairs in display order.
    pub fn entries(&self) -> Vec<(&'static str, f64)> {
        match *self {
            Metrics::Classification { accuracy, f1_score, auc } => {
                vec![("accuracy", accuracy), ("f1_score", f1_score), ("auc", auc)]
            }
            Metrics::Regression { rmse, r2_score } => {
                vec![("rmse", rmse), ("r2_score", r2_score)]
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.entries()
            .into_iter()
            .find(|(entry, _)| *entry == name)
            .map(|(_, value)| value)
    }

    /// Average across the variant's metrics; the overall-leader verdict in
    /// comparisons is based on this.
    pub fn mean(&self) -> f64 {
        let entries = self.entries();
        entries.iter().map(|(_, value)| value).sum::<f64>() / entries.len() as f64
    }
}

/// One model as delivered by the listing endpoint. Latest metrics arrive as
/// flat nullable columns; `metrics` holds the historical snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub id: i64,
    pub name: String,
    pub version: String,
    pub filename: String,
    #[serde(with = "crate::timefmt")]
    pub upload_time: DateTime<Utc>,
    pub task_type: TaskType,
    #[serde(default)]
    pub accuracy: Option<f64>,
    #[serde(default)]
    pub f1_score: Option<f64>,
    #[serde(default)]
    pub auc: Option<f64>,
    #[serde(default)]
    pub rmse: Option<f64>,
    #[serde(default)]
    pub r2_score: Option<f64>,
    #[serde(default)]
    pub metrics: Vec<MetricRecord>,
}

impl Model {
    /// Latest metric value by name, restricted to the model's task type.
    pub fn metric(&self, name: &str) -> Option<f64> {
        if !self.task_type.metric_names().contains(&name) {
            return None;
        }
        match name {
            "accuracy" => self.accuracy,
            "f1_score" => self.f1_score,
            "auc" => self.auc,
            "rmse" => self.rmse,
            "r2_score" => self.r2_score,
            _ => None,
        }
    }

    /// Assemble the tagged latest-metrics union from the flat columns.
    /// Returns `None` when the model has not been evaluated yet (all of the
    /// task type's columns are null); partially-present columns default to
    /// zero, matching how the dashboard renders them.
    pub fn latest_metrics(&self) -> Option<Metrics> {
        match self.task_type {
            TaskType::Classification => {
                if self.accuracy.is_none() && self.f1_score.is_none() && self.auc.is_none() {
                    return None;
                }
                Some(Metrics::Classification {
                    accuracy: self.accuracy.unwrap_or(0.0),
                    f1_score: self.f1_score.unwrap_or(0.0),
                    auc: self.auc.unwrap_or(0.0),
                })
            }
            TaskType::Regression => {
                if self.rmse.is_none() && self.r2_score.is_none() {
                    return None;
                }
                Some(Metrics::Regression {
                    rmse: self.rmse.unwrap_or(0.0),
                    r2_score: self.r2_score.unwrap_or(0.0),
                })
            }
        }
    }
}
