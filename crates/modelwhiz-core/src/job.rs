//! Evaluation job snapshots as reported by the external evaluation service.
//!
//! The client observes jobs, it never mutates them. Every struct here is a
//! disposable local copy of the latest server-side state.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::TaskType;

/// Server-side lifecycle state of an evaluation job.
///
/// Transitions are forward-only: a job never returns to an earlier state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    /// True once no further transition will occur.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Position in the forward-only lifecycle. Both terminal states share the
    /// top rank; a lower rank observed after a higher one means the server
    /// reported states out of order.
    pub fn rank(&self) -> u8 {
        match self {
            JobStatus::Pending => 0,
            JobStatus::Processing => 1,
            JobStatus::Completed | JobStatus::Failed => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Processing => "PROCESSING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of the status endpoint: the current state plus the submitter's
/// display label for the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub status: JobStatus,
    pub model_name: String,
}

/// One row of the evaluation-job listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSummary {
    pub id: i64,
    pub model_name: String,
    pub status: JobStatus,
    #[serde(with = "crate::timefmt")]
    pub created_at: DateTime<Utc>,
}

/// Full terminal snapshot from the results endpoint.
///
/// `results` mixes numeric metrics with an optional `insights` string list;
/// `artifacts` maps artifact names to server-relative URLs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationJob {
    pub id: i64,
    pub status: JobStatus,
    pub model_name: String,
    #[serde(default)]
    pub results: Option<BTreeMap<String, serde_json::Value>>,
    #[serde(default)]
    pub artifacts: Option<BTreeMap<String, Option<String>>>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(with = "crate::timefmt")]
    pub created_at: DateTime<Utc>,
}

impl EvaluationJob {
    /// Numeric metrics to render: every results entry except `insights`.
    pub fn metric_entries(&self) -> Vec<(String, f64)> {
        self.results
            .iter()
            .flat_map(|results| results.iter())
            .filter(|(key, _)| key.as_str() != "insights")
            .filter_map(|(key, value)| value.as_f64().map(|n| (key.clone(), n)))
            .collect()
    }

    /// Automated insight lines, if the evaluation produced any.
    pub fn insights(&self) -> Vec<String> {
        self.results
            .as_ref()
            .and_then(|results| results.get("insights"))
            .and_then(|value| value.as_array())
            .map(|lines| {
                lines
                    .iter()
                    .filter_map(|line| line.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Server-relative URL of the rendered evaluation plot, if present.
    pub fn plot_url(&self) -> Option<&str> {
        self.artifacts
            .as_ref()
            .and_then(|artifacts| artifacts.get("plot_url"))
            .and_then(|url| url.as_deref())
    }

    /// Task type inferred from the result keys. Job results arrive untagged,
    /// so the regression-only `rmse` key is the discriminator.
    pub fn task_type(&self) -> Option<TaskType> {
        let results = self.results.as_ref()?;
        if results.contains_key("rmse") {
            Some(TaskType::Regression)
        } else if results.contains_key("accuracy") {
            Some(TaskType::Classification)
        } else {
            None
        }
    }
}
