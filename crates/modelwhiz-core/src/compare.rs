//! Side-by-side model comparison.

use serde::Serialize;

use crate::error::{ModelWhizError, Result};
use crate::model::{lower_is_better, Model, TaskType};

/// Margin below which two metric values count as a tie.
pub const WINNER_MARGIN: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Winner {
    A,
    B,
    Tie,
}

impl Winner {
    pub fn label<'a>(&self, name_a: &'a str, name_b: &'a str) -> &'a str {
        match self {
            Winner::A => name_a,
            Winner::B => name_b,
            Winner::Tie => "Tie",
        }
    }
}

/// Verdict for one metric: who wins, by how much, and how much that is
/// relative to the second model's value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricComparison {
    pub metric: String,
    pub value_a: f64,
    pub value_b: f64,
    pub winner: Winner,
    pub abs_difference: f64,
    pub relative_improvement_pct: f64,
}

impl MetricComparison {
    pub fn compute(metric: &str, value_a: f64, value_b: f64) -> Self {
        let delta = value_a - value_b;
        // For RMSE the smaller value wins; flip the sign so one margin test
        // covers both polarities.
        let advantage = if lower_is_better(metric) { -delta } else { delta };
        let winner = if advantage > WINNER_MARGIN {
            Winner::A
        } else if advantage < -WINNER_MARGIN {
            Winner::B
        } else {
            Winner::Tie
        };
        let abs_difference = delta.abs();
        let relative_improvement_pct = if value_b != 0.0 {
            abs_difference / value_b * 100.0
        } else {
            0.0
        };
        Self {
            metric: metric.to_string(),
            value_a,
            value_b,
            winner,
            abs_difference,
            relative_improvement_pct,
        }
    }
}

/// Full comparison of two models sharing a task type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelComparison {
    pub model_a: String,
    pub model_b: String,
    pub task_type: TaskType,
    pub metrics: Vec<MetricComparison>,
    /// Leader by mean of the classification metrics; regression has no
    /// single-number aggregate, so no overall verdict there.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overall: Option<Winner>,
}

impl ModelComparison {
    pub fn compute(a: &Model, b: &Model) -> Result<Self> {
        if a.task_type != b.task_type {
            return Err(ModelWhizError::TaskTypeMismatch(a.task_type, b.task_type));
        }
        let task_type = a.task_type;

        let metrics = task_type
            .metric_names()
            .iter()
            .map(|name| {
                MetricComparison::compute(
                    name,
                    a.metric(name).unwrap_or(0.0),
                    b.metric(name).unwrap_or(0.0),
                )
            })
            .collect();

        let overall = match task_type {
            TaskType::Classification => {
                let mean = |model: &Model| {
                    (model.accuracy.unwrap_or(0.0)
                        + model.f1_score.unwrap_or(0.0)
                        + model.auc.unwrap_or(0.0))
                        / 3.0
                };
                let (mean_a, mean_b) = (mean(a), mean(b));
                Some(if mean_a > mean_b {
                    Winner::A
                } else if mean_b > mean_a {
                    Winner::B
                } else {
                    Winner::Tie
                })
            }
            TaskType::Regression => None,
        };

        Ok(Self {
            model_a: a.name.clone(),
            model_b: b.name.clone(),
            task_type,
            metrics,
            overall,
        })
    }
}
