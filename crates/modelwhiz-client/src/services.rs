//! Service container - the single entry point for client-side service access.

use std::time::Duration;

use modelwhiz_core::ModelWhizConfig;

use crate::api::ApiClient;
use crate::catalog::ModelCatalog;
use crate::poller::JobPoller;
use crate::session::SessionStore;

/// Central service container. The session store is owned here (the
/// application shell) and handed to views by reference.
pub struct Services {
    pub api: ApiClient,
    pub poller: JobPoller<ApiClient>,
    pub session: SessionStore,
}

impl Services {
    pub fn new() -> Self {
        Self::from_config(&ModelWhizConfig::default())
    }

    pub fn from_config(config: &ModelWhizConfig) -> Self {
        let api = ApiClient::from_config(config);
        let poller = JobPoller::with_interval(
            api.clone(),
            Duration::from_millis(config.poller.interval_ms),
        );
        Self {
            api,
            poller,
            session: SessionStore::new(),
        }
    }

    /// A fresh model-catalog view scoped to the signed-in user.
    pub fn catalog(&self) -> ModelCatalog {
        ModelCatalog::new(self.api.clone(), self.session.user_id())
    }
}

impl Default for Services {
    fn default() -> Self {
        Self::new()
    }
}
