//! View-owned snapshot of the model list.
//!
//! The snapshot is the only shared state a view holds, and it is refreshed
//! wholesale: every mutation goes to the server first, then the whole list
//! is refetched and replaced. Entries are never patched or removed locally,
//! and there is no merge; the refetch is the consistency mechanism.

use std::path::Path;

use async_trait::async_trait;
use tracing::{info, instrument};

use modelwhiz_core::Model;

use crate::api::{ApiClient, ApiError, ManualMetrics, UploadRequest};

/// The catalog's network seam; `ApiClient` in production, scripted in tests.
#[async_trait]
pub trait CatalogTransport: Send + Sync {
    async fn list(&self, user_id: Option<&str>) -> Result<Vec<Model>, ApiError>;
    async fn upload(&self, request: &UploadRequest) -> Result<Model, ApiError>;
    async fn evaluate(&self, model_id: i64, test_file: &Path)
        -> Result<serde_json::Value, ApiError>;
    async fn delete(&self, model_id: i64) -> Result<(), ApiError>;
    async fn update_metrics(&self, model_id: i64, metrics: &ManualMetrics)
        -> Result<(), ApiError>;
}

#[async_trait]
impl CatalogTransport for ApiClient {
    async fn list(&self, user_id: Option<&str>) -> Result<Vec<Model>, ApiError> {
        self.list_models(user_id).await
    }

    async fn upload(&self, request: &UploadRequest) -> Result<Model, ApiError> {
        self.upload_model(request).await
    }

    async fn evaluate(
        &self,
        model_id: i64,
        test_file: &Path,
    ) -> Result<serde_json::Value, ApiError> {
        self.evaluate_model(model_id, test_file).await
    }

    async fn delete(&self, model_id: i64) -> Result<(), ApiError> {
        self.delete_model(model_id).await
    }

    async fn update_metrics(&self, model_id: i64, metrics: &ManualMetrics) -> Result<(), ApiError> {
        self.update_metrics(model_id, metrics).await
    }
}

pub struct ModelCatalog<T = ApiClient> {
    transport: T,
    user_id: Option<String>,
    models: Vec<Model>,
}

impl<T: CatalogTransport> ModelCatalog<T> {
    pub fn new(transport: T, user_id: Option<String>) -> Self {
        Self { transport, user_id, models: Vec::new() }
    }

    pub fn models(&self) -> &[Model] {
        &self.models
    }

    /// `None` means the model is absent from the latest snapshot; callers
    /// render that as a not-found view, not as an error.
    pub fn find(&self, model_id: i64) -> Option<&Model> {
        self.models.iter().find(|model| model.id == model_id)
    }

    /// Replace the snapshot with a fresh fetch.
    #[instrument(skip(self))]
    pub async fn refresh(&mut self) -> Result<(), ApiError> {
        let models = self.transport.list(self.user_id.as_deref()).await?;
        info!(count = models.len(), "Model list refreshed");
        self.models = models;
        Ok(())
    }

    pub async fn upload(&mut self, request: &UploadRequest) -> Result<(), ApiError> {
        self.transport.upload(request).await?;
        self.refresh().await
    }

    pub async fn evaluate(&mut self, model_id: i64, test_file: &Path) -> Result<(), ApiError> {
        self.transport.evaluate(model_id, test_file).await?;
        self.refresh().await
    }

    pub async fn delete(&mut self, model_id: i64) -> Result<(), ApiError> {
        self.transport.delete(model_id).await?;
        self.refresh().await
    }

    pub async fn update_metrics(
        &mut self,
        model_id: i64,
        metrics: &ManualMetrics,
    ) -> Result<(), ApiError> {
        self.transport.update_metrics(model_id, metrics).await?;
        self.refresh().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Mutex;

    use serde_json::json;

    fn model(id: i64, name: &str) -> Model {
        serde_json::from_value(json!({
            "id": id,
            "name": name,
            "version": "v1",
            "filename": format!("{name}.pkl"),
            "upload_time": "2025-07-01T00:00:00",
            "task_type": "classification"
        }))
        .unwrap()
    }

    /// Records every call and serves a fixed post-mutation listing.
    struct RecordingTransport {
        calls: Mutex<Vec<String>>,
        listing: Mutex<Vec<Model>>,
    }

    impl RecordingTransport {
        fn new(listing: Vec<Model>) -> Self {
            Self { calls: Mutex::new(Vec::new()), listing: Mutex::new(listing) }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CatalogTransport for &RecordingTransport {
        async fn list(&self, _user_id: Option<&str>) -> Result<Vec<Model>, ApiError> {
            self.calls.lock().unwrap().push("list".to_string());
            Ok(self.listing.lock().unwrap().clone())
        }

        async fn upload(&self, request: &UploadRequest) -> Result<Model, ApiError> {
            self.calls.lock().unwrap().push(format!("upload {}", request.name));
            Ok(model(99, &request.name))
        }

        async fn evaluate(
            &self,
            model_id: i64,
            _test_file: &Path,
        ) -> Result<serde_json::Value, ApiError> {
            self.calls.lock().unwrap().push(format!("evaluate {model_id}"));
            Ok(json!({"accuracy": 0.9}))
        }

        async fn delete(&self, model_id: i64) -> Result<(), ApiError> {
            self.calls.lock().unwrap().push(format!("delete {model_id}"));
            self.listing.lock().unwrap().retain(|m| m.id != model_id);
            Ok(())
        }

        async fn update_metrics(
            &self,
            model_id: i64,
            _metrics: &ManualMetrics,
        ) -> Result<(), ApiError> {
            self.calls.lock().unwrap().push(format!("metrics {model_id}"));
            Ok(())
        }
    }

    #[tokio::test]
    async fn delete_issues_one_delete_then_one_refetch() {
        let transport = RecordingTransport::new(vec![model(7, "old"), model(9, "kept")]);
        let mut catalog = ModelCatalog::new(&transport, None);
        catalog.refresh().await.unwrap();
        assert!(catalog.find(7).is_some());

        catalog.delete(7).await.unwrap();

        assert_eq!(transport.calls(), vec!["list", "delete 7", "list"]);
        assert!(catalog.find(7).is_none());
        assert!(catalog.find(9).is_some());
    }

    #[tokio::test]
    async fn upload_refetches_the_whole_list() {
        let transport = RecordingTransport::new(vec![model(1, "existing")]);
        let mut catalog = ModelCatalog::new(&transport, None);

        let request = UploadRequest {
            name: "fresh".to_string(),
            file: PathBuf::from("fresh.pkl"),
            test_file: None,
        };
        catalog.upload(&request).await.unwrap();

        assert_eq!(transport.calls(), vec!["upload fresh", "list"]);
        assert_eq!(catalog.models().len(), 1);
    }

    #[tokio::test]
    async fn refresh_replaces_rather_than_merges() {
        let transport = RecordingTransport::new(vec![model(1, "a"), model(2, "b")]);
        let mut catalog = ModelCatalog::new(&transport, None);
        catalog.refresh().await.unwrap();
        assert_eq!(catalog.models().len(), 2);

        *transport.listing.lock().unwrap() = vec![model(3, "c")];
        catalog.refresh().await.unwrap();

        let ids: Vec<i64> = catalog.models().iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![3]);
    }

    #[tokio::test]
    async fn failed_mutation_leaves_the_snapshot_alone() {
        let transport = RecordingTransport::new(vec![model(1, "a")]);
        let mut catalog = ModelCatalog::new(&transport, None);
        catalog.refresh().await.unwrap();

        struct FailingDelete<'a>(&'a RecordingTransport);

        #[async_trait]
        impl CatalogTransport for FailingDelete<'_> {
            async fn list(&self, user_id: Option<&str>) -> Result<Vec<Model>, ApiError> {
                self.0.list(user_id).await
            }
            async fn upload(&self, request: &UploadRequest) -> Result<Model, ApiError> {
                self.0.upload(request).await
            }
            async fn evaluate(
                &self,
                model_id: i64,
                test_file: &Path,
            ) -> Result<serde_json::Value, ApiError> {
                self.0.evaluate(model_id, test_file).await
            }
            async fn delete(&self, _model_id: i64) -> Result<(), ApiError> {
                Err(ApiError::Status { status: 500, message: "boom".to_string() })
            }
            async fn update_metrics(
                &self,
                model_id: i64,
                metrics: &ManualMetrics,
            ) -> Result<(), ApiError> {
                self.0.update_metrics(model_id, metrics).await
            }
        }

        let mut failing = ModelCatalog::new(FailingDelete(&transport), None);
        failing.refresh().await.unwrap();
        assert!(failing.delete(1).await.is_err());
        // No local removal happened on the failed path.
        assert_eq!(failing.models().len(), 1);
    }
}
