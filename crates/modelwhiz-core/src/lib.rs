// Domain modules
pub mod compare;
pub mod config;
pub mod error;
pub mod job;
pub mod metrics;
pub mod model;
pub mod timefmt;

pub use compare::{MetricComparison, ModelComparison, Winner, WINNER_MARGIN};
pub use config::{
    ApiConfig, ModelWhizConfig, PollerConfig, DEFAULT_API_BASE, DEFAULT_ASSET_ORIGIN,
    DEFAULT_POLL_INTERVAL_MS,
};
pub use error::{ModelWhizError, Result};
pub use job::{EvaluationJob, JobStatus, JobSummary, StatusSnapshot};
pub use metrics::{
    detect_task_type, normalize, trends, HistorySummary, MetricPoint, MetricRecord, Trend,
    TrendDirection, NEUTRAL_THRESHOLD_PCT,
};
pub use model::{lower_is_better, Metrics, Model, TaskType};
