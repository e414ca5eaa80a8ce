//! Evaluation job poller.
//!
//! Drives one job from submission to a terminal state with a fixed-interval
//! status loop: no backoff, no attempt cap, one in-flight query at a time.
//! The loop runs until the server reports COMPLETED or FAILED, the transport
//! breaks, or the owner cancels the token.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use modelwhiz_core::{EvaluationJob, JobStatus, StatusSnapshot, DEFAULT_POLL_INTERVAL_MS};

use crate::api::{ApiClient, ApiError, EvaluationRequest};

/// Progress events emitted while a job is being driven to a terminal state.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WatchEvent {
    Submitted { job_id: i64 },
    Polling { status: JobStatus },
    Completed { job: EvaluationJob },
    Failed { job: EvaluationJob },
    ConnectionError { message: String },
    Cancelled,
}

/// How a watch ended. A FAILED job is a first-class outcome carrying the
/// server's error text, not an error of the poller itself.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Completed(EvaluationJob),
    Failed(EvaluationJob),
    Cancelled,
}

/// The network seam the poller drives. `ApiClient` is the production
/// implementation; tests script this.
#[async_trait]
pub trait JobTransport: Send + Sync {
    async fn submit(&self, request: &EvaluationRequest) -> Result<i64, ApiError>;
    async fn status(&self, job_id: i64) -> Result<StatusSnapshot, ApiError>;
    async fn results(&self, job_id: i64) -> Result<EvaluationJob, ApiError>;
}

#[async_trait]
impl JobTransport for ApiClient {
    async fn submit(&self, request: &EvaluationRequest) -> Result<i64, ApiError> {
        self.start_evaluation(request).await
    }

    async fn status(&self, job_id: i64) -> Result<StatusSnapshot, ApiError> {
        self.job_status(job_id).await
    }

    async fn results(&self, job_id: i64) -> Result<EvaluationJob, ApiError> {
        self.job_results(job_id).await
    }
}

pub struct JobPoller<T> {
    transport: T,
    interval: Duration,
}

impl<T: JobTransport> JobPoller<T> {
    pub fn new(transport: T) -> Self {
        Self::with_interval(transport, Duration::from_millis(DEFAULT_POLL_INTERVAL_MS))
    }

    pub fn with_interval(transport: T, interval: Duration) -> Self {
        Self { transport, interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Submit an evaluation and watch the resulting job. The job id returned
    /// by the submission is the one used for every subsequent query.
    pub async fn submit_and_watch(
        &self,
        request: &EvaluationRequest,
        cancel: CancellationToken,
        events: Option<mpsc::UnboundedSender<WatchEvent>>,
    ) -> Result<(i64, JobOutcome), ApiError> {
        let job_id = self.transport.submit(request).await?;
        emit(&events, WatchEvent::Submitted { job_id });
        let outcome = self.watch(job_id, cancel, events).await?;
        Ok((job_id, outcome))
    }

    /// Poll the job's status until it turns terminal, then fetch the full
    /// results exactly once.
    ///
    /// Status queries are strictly sequential: each iteration awaits the
    /// response, then sleeps the fixed interval before the next query. A
    /// transport failure of any query halts the loop immediately with an
    /// error; no retry is attempted for those.
    pub async fn watch(
        &self,
        job_id: i64,
        cancel: CancellationToken,
        events: Option<mpsc::UnboundedSender<WatchEvent>>,
    ) -> Result<JobOutcome, ApiError> {
        let mut last_rank: Option<u8> = None;

        loop {
            if cancel.is_cancelled() {
                emit(&events, WatchEvent::Cancelled);
                info!(job_id, "Watch cancelled");
                return Ok(JobOutcome::Cancelled);
            }

            let snapshot = match self.transport.status(job_id).await {
                Ok(snapshot) => snapshot,
                Err(err) => {
                    emit(&events, WatchEvent::ConnectionError { message: err.to_string() });
                    return Err(err);
                }
            };

            // The lifecycle is forward-only; a regression means the server
            // answered out of order. Keep polling, but make it visible.
            if let Some(previous) = last_rank {
                if snapshot.status.rank() < previous {
                    warn!(job_id, status = %snapshot.status, "Job status moved backwards");
                }
            }
            last_rank = Some(snapshot.status.rank());

            if snapshot.status.is_terminal() {
                let job = match self.transport.results(job_id).await {
                    Ok(job) => job,
                    Err(err) => {
                        emit(&events, WatchEvent::ConnectionError { message: err.to_string() });
                        return Err(err);
                    }
                };
                return Ok(if snapshot.status == JobStatus::Failed {
                    info!(job_id, "Evaluation failed");
                    emit(&events, WatchEvent::Failed { job: job.clone() });
                    JobOutcome::Failed(job)
                } else {
                    info!(job_id, "Evaluation completed");
                    emit(&events, WatchEvent::Completed { job: job.clone() });
                    JobOutcome::Completed(job)
                });
            }

            emit(&events, WatchEvent::Polling { status: snapshot.status });
            debug!(job_id, status = %snapshot.status, "Job still running");

            tokio::select! {
                _ = cancel.cancelled() => {
                    emit(&events, WatchEvent::Cancelled);
                    info!(job_id, "Watch cancelled");
                    return Ok(JobOutcome::Cancelled);
                }
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
    }
}

fn emit(events: &Option<mpsc::UnboundedSender<WatchEvent>>, event: WatchEvent) {
    if let Some(tx) = events {
        let _ = tx.send(event);
    }
}
