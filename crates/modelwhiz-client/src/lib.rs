mod api;
mod catalog;
mod poller;
mod services;
mod session;

pub use api::{
    ApiClient, ApiError, EvaluationRequest, ManualMetrics, MetricLogEntry, UploadRequest,
};
pub use catalog::{CatalogTransport, ModelCatalog};
pub use poller::{JobOutcome, JobPoller, JobTransport, WatchEvent};
pub use services::Services;
pub use session::{AuthError, AuthProvider, EnvAuthProvider, Session, SessionStore};

// Re-export core types for downstream consumers (the CLI imports only from
// this crate).
pub use modelwhiz_core::{
    detect_task_type, normalize, trends, EvaluationJob, HistorySummary, JobStatus, JobSummary,
    MetricComparison, MetricPoint, MetricRecord, Metrics, Model, ModelComparison, ModelWhizConfig,
    StatusSnapshot, TaskType, Trend, TrendDirection, Winner,
};
