//! HTTP client for the ModelWhiz evaluation API.
//!
//! Every failure is logged once here, the way the dashboard surfaces every
//! API error through one global notification, and still returned to the
//! caller so call sites can run their own recovery.

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, instrument};

use modelwhiz_core::{EvaluationJob, JobSummary, Model, ModelWhizConfig, StatusSnapshot};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Missing required fields: {}", .0.join(", "))]
    Validation(Vec<String>),
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Server returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("Failed to read {}: {source}", .path.display())]
    File {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Multipart payload for uploading a model to the catalog.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub name: String,
    pub file: PathBuf,
    pub test_file: Option<PathBuf>,
}

impl UploadRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut missing = Vec::new();
        if self.name.trim().is_empty() {
            missing.push("name".to_string());
        }
        if self.file.as_os_str().is_empty() {
            missing.push("file".to_string());
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(missing))
        }
    }
}

/// Multipart payload for starting an evaluation job.
///
/// Model file, dataset, model name, target column and user id are all
/// mandatory; the preprocessor file becomes mandatory too when the submitter
/// marks the model as needing one.
#[derive(Debug, Clone)]
pub struct EvaluationRequest {
    pub model_file: PathBuf,
    pub dataset: PathBuf,
    pub model_name: String,
    pub target_column: String,
    pub user_id: String,
    pub needs_preprocessor: bool,
    pub preprocessor_file: Option<PathBuf>,
}

impl EvaluationRequest {
    /// Collects every missing field at once; nothing is sent when any field
    /// is absent.
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut missing = Vec::new();
        if self.model_file.as_os_str().is_empty() {
            missing.push("model_file".to_string());
        }
        if self.dataset.as_os_str().is_empty() {
            missing.push("dataset".to_string());
        }
        if self.model_name.trim().is_empty() {
            missing.push("model_name".to_string());
        }
        if self.target_column.trim().is_empty() {
            missing.push("target_column".to_string());
        }
        if self.user_id.trim().is_empty() {
            missing.push("user_id".to_string());
        }
        if self.needs_preprocessor && self.preprocessor_file.is_none() {
            missing.push("preprocessor_file".to_string());
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(missing))
        }
    }
}

/// Manually entered classification metrics.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ManualMetrics {
    pub accuracy: f64,
    pub f1_score: f64,
    pub auc: f64,
}

/// JSON payload of the metric-history log endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct MetricLogEntry {
    pub model_id: i64,
    pub accuracy: f64,
    pub f1_score: f64,
    pub auc: f64,
}

#[derive(Debug, Deserialize)]
struct StartResponse {
    job_id: i64,
}

#[derive(Debug, Deserialize)]
struct InsightsResponse {
    #[serde(default)]
    insights: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: Option<serde_json::Value>,
    #[serde(default)]
    message: Option<String>,
}

/// Best-effort error text from a failed response: the server's `detail`
/// field, then its `message` field, then the HTTP status line.
fn extract_error_message(status: reqwest::StatusCode, body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        if let Some(detail) = parsed.detail {
            return match detail {
                serde_json::Value::String(text) => text,
                other => other.to_string(),
            };
        }
        if let Some(message) = parsed.message {
            return message;
        }
    }
    status.to_string()
}

fn transport(err: reqwest::Error) -> ApiError {
    error!("HTTP request failed: {}", err);
    ApiError::Transport(err)
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = extract_error_message(status, &body);
    error!(status = status.as_u16(), %message, "API request failed");
    Err(ApiError::Status {
        status: status.as_u16(),
        message,
    })
}

async fn file_part(path: &Path) -> Result<Part, ApiError> {
    let bytes = tokio::fs::read(path).await.map_err(|source| ApiError::File {
        path: path.to_path_buf(),
        source,
    })?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());
    Ok(Part::bytes(bytes).file_name(file_name))
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    asset_origin: String,
    http: reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, asset_origin: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            asset_origin: asset_origin.into(),
            http: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &ModelWhizConfig) -> Self {
        Self::new(&config.api.base_url, &config.api.asset_origin)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // --- Models ---

    #[instrument(skip(self))]
    pub async fn list_models(&self, user_id: Option<&str>) -> Result<Vec<Model>, ApiError> {
        let url = match user_id {
            Some(user) => format!("{}/models/?user_id={}", self.base_url, user),
            None => format!("{}/models/", self.base_url),
        };
        debug!("Fetching model list");
        let response = self
            .http
            .get(&url)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(transport)?;
        let models: Vec<Model> = check(response).await?.json().await.map_err(transport)?;
        info!(count = models.len(), "Fetched models");
        Ok(models)
    }

    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn upload_model(&self, request: &UploadRequest) -> Result<Model, ApiError> {
        request.validate()?;
        let mut form = Form::new()
            .part("file", file_part(&request.file).await?)
            .text("name", request.name.trim().to_string());
        if let Some(test_file) = &request.test_file {
            form = form.part("test_file", file_part(test_file).await?);
        }

        let url = format!("{}/models/upload", self.base_url);
        let response = self
            .http
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(transport)?;
        let model: Model = check(response).await?.json().await.map_err(transport)?;
        info!(model_id = model.id, "Model uploaded");
        Ok(model)
    }

    /// Re-score an existing model against a new test dataset. Returns the
    /// updated metrics payload as the server shapes it.
    #[instrument(skip(self, test_file))]
    pub async fn evaluate_model(
        &self,
        model_id: i64,
        test_file: &Path,
    ) -> Result<serde_json::Value, ApiError> {
        let form = Form::new().part("test_file", file_part(test_file).await?);
        let url = format!("{}/models/{}/evaluate", self.base_url, model_id);
        let response = self
            .http
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(transport)?;
        let metrics = check(response).await?.json().await.map_err(transport)?;
        info!(model_id, "Model re-evaluated");
        Ok(metrics)
    }

    #[instrument(skip(self))]
    pub async fn delete_model(&self, model_id: i64) -> Result<(), ApiError> {
        let url = format!("{}/models/{}", self.base_url, model_id);
        let response = self
            .http
            .delete(&url)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(transport)?;
        check(response).await?;
        info!(model_id, "Model deleted");
        Ok(())
    }

    #[instrument(skip(self, metrics))]
    pub async fn update_metrics(
        &self,
        model_id: i64,
        metrics: &ManualMetrics,
    ) -> Result<(), ApiError> {
        let form = Form::new()
            .text("accuracy", metrics.accuracy.to_string())
            .text("f1_score", metrics.f1_score.to_string())
            .text("auc", metrics.auc.to_string());
        let url = format!("{}/models/{}/metrics", self.base_url, model_id);
        let response = self
            .http
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(transport)?;
        check(response).await?;
        info!(model_id, "Manual metrics updated");
        Ok(())
    }

    #[instrument(skip(self, entry), fields(model_id = entry.model_id))]
    pub async fn log_metrics(&self, entry: &MetricLogEntry) -> Result<(), ApiError> {
        let url = format!("{}/metrics/log", self.base_url);
        let response = self
            .http
            .post(&url)
            .timeout(REQUEST_TIMEOUT)
            .json(entry)
            .send()
            .await
            .map_err(transport)?;
        check(response).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn model_insights(&self, model_id: i64) -> Result<Vec<String>, ApiError> {
        let url = format!("{}/models/{}/insights", self.base_url, model_id);
        let response = self
            .http
            .get(&url)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(transport)?;
        let insights: InsightsResponse = check(response).await?.json().await.map_err(transport)?;
        Ok(insights.insights)
    }

    // --- Evaluation jobs ---

    #[instrument(skip(self, request), fields(model_name = %request.model_name))]
    pub async fn start_evaluation(&self, request: &EvaluationRequest) -> Result<i64, ApiError> {
        request.validate()?;
        let mut form = Form::new()
            .part("model_file", file_part(&request.model_file).await?)
            .part("dataset", file_part(&request.dataset).await?)
            .text("model_name", request.model_name.trim().to_string())
            .text("target_column", request.target_column.trim().to_string())
            .text("user_id", request.user_id.clone());
        if let Some(preprocessor) = &request.preprocessor_file {
            form = form.part("preprocessor_file", file_part(preprocessor).await?);
        }

        let url = format!("{}/evaluations/start", self.base_url);
        let response = self
            .http
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(transport)?;
        let start: StartResponse = check(response).await?.json().await.map_err(transport)?;
        info!(job_id = start.job_id, "Evaluation job submitted");
        Ok(start.job_id)
    }

    #[instrument(skip(self))]
    pub async fn job_status(&self, job_id: i64) -> Result<StatusSnapshot, ApiError> {
        let url = format!("{}/evaluations/{}/status", self.base_url, job_id);
        let response = self
            .http
            .get(&url)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(transport)?;
        let snapshot: StatusSnapshot = check(response).await?.json().await.map_err(transport)?;
        debug!(job_id, status = %snapshot.status, "Job status");
        Ok(snapshot)
    }

    #[instrument(skip(self))]
    pub async fn job_results(&self, job_id: i64) -> Result<EvaluationJob, ApiError> {
        let url = format!("{}/evaluations/{}/results", self.base_url, job_id);
        let response = self
            .http
            .get(&url)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(transport)?;
        let job = check(response).await?.json().await.map_err(transport)?;
        Ok(job)
    }

    #[instrument(skip(self))]
    pub async fn list_jobs(&self, user_id: &str) -> Result<Vec<JobSummary>, ApiError> {
        let url = format!("{}/evaluations/?user_id={}", self.base_url, user_id);
        let response = self
            .http
            .get(&url)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(transport)?;
        let jobs: Vec<JobSummary> = check(response).await?.json().await.map_err(transport)?;
        info!(count = jobs.len(), "Fetched evaluation jobs");
        Ok(jobs)
    }

    // --- Static assets ---

    /// Download URL for an uploaded model file.
    pub fn download_url(&self, filename: &str) -> String {
        format!("{}/uploads/{}", self.asset_origin, filename)
    }

    /// Absolute URL for a server-relative artifact path such as a plot.
    pub fn asset_url(&self, path: &str) -> String {
        format!("{}{}", self.asset_origin, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evaluation_request() -> EvaluationRequest {
        EvaluationRequest {
            model_file: PathBuf::from("model.pkl"),
            dataset: PathBuf::from("test.csv"),
            model_name: "Iris v1".to_string(),
            target_column: "species".to_string(),
            user_id: "u123".to_string(),
            needs_preprocessor: false,
            preprocessor_file: None,
        }
    }

    #[test]
    fn valid_request_passes() {
        assert!(evaluation_request().validate().is_ok());
    }

    #[test]
    fn validation_collects_every_missing_field() {
        let request = EvaluationRequest {
            model_file: PathBuf::new(),
            dataset: PathBuf::new(),
            model_name: "  ".to_string(),
            target_column: String::new(),
            user_id: String::new(),
            needs_preprocessor: false,
            preprocessor_file: None,
        };
        let Err(ApiError::Validation(missing)) = request.validate() else {
            panic!("expected validation failure");
        };
        assert_eq!(
            missing,
            vec!["model_file", "dataset", "model_name", "target_column", "user_id"]
        );
    }

    #[test]
    fn preprocessor_is_conditionally_required() {
        let mut request = evaluation_request();
        request.needs_preprocessor = true;
        let Err(ApiError::Validation(missing)) = request.validate() else {
            panic!("expected validation failure");
        };
        assert_eq!(missing, vec!["preprocessor_file"]);

        request.preprocessor_file = Some(PathBuf::from("prep.pkl"));
        assert!(request.validate().is_ok());
    }

    #[test]
    fn error_message_prefers_detail_over_message() {
        let status = reqwest::StatusCode::BAD_REQUEST;
        assert_eq!(
            extract_error_message(status, r#"{"detail": "bad column", "message": "nope"}"#),
            "bad column"
        );
        assert_eq!(
            extract_error_message(status, r#"{"message": "nope"}"#),
            "nope"
        );
        assert_eq!(
            extract_error_message(status, "<html>not json</html>"),
            "400 Bad Request"
        );
    }

    #[test]
    fn structured_detail_is_stringified() {
        let status = reqwest::StatusCode::UNPROCESSABLE_ENTITY;
        let message =
            extract_error_message(status, r#"{"detail": [{"loc": ["body", "name"]}]}"#);
        assert!(message.contains("loc"));
    }

    #[test]
    fn asset_urls_join_the_fixed_origin() {
        let client = ApiClient::new("http://localhost:8000/api", "http://localhost:8000");
        assert_eq!(
            client.download_url("churn_v2.pkl"),
            "http://localhost:8000/uploads/churn_v2.pkl"
        );
        assert_eq!(
            client.asset_url("/static/plots/42.png"),
            "http://localhost:8000/static/plots/42.png"
        );
    }

    #[tokio::test]
    async fn file_parts_read_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.pkl");
        tokio::fs::write(&path, b"weights").await.unwrap();
        assert!(file_part(&path).await.is_ok());

        let missing = dir.path().join("absent.pkl");
        assert!(matches!(
            file_part(&missing).await,
            Err(ApiError::File { .. })
        ));
    }
}
