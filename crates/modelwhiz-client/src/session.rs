//! Session state sourced from the external identity provider.
//!
//! Authentication itself lives outside this repository; all the client does
//! is read the established session and attach its user id to requests. The
//! store is explicit and injectable: owned by the application shell and
//! passed down by reference, never reached as ambient global state.

use std::sync::RwLock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("No active session")]
    NoSession,
    #[error("Identity provider error: {0}")]
    Provider(String),
}

/// Adapter over the external identity service. No token validation, refresh
/// or storage happens on this side of the seam.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError>;
    async fn sign_up(&self, email: &str, password: &str) -> Result<Session, AuthError>;
    async fn sign_out(&self) -> Result<(), AuthError>;
    async fn current_session(&self) -> Result<Option<Session>, AuthError>;
}

/// Headless session source: the identity is established out-of-band and
/// surfaced through `MODELWHIZ_USER_ID` / `MODELWHIZ_USER_EMAIL`.
pub struct EnvAuthProvider;

#[async_trait]
impl AuthProvider for EnvAuthProvider {
    async fn sign_in(&self, _email: &str, _password: &str) -> Result<Session, AuthError> {
        Err(AuthError::Provider(
            "sign-in is handled by the external identity service".to_string(),
        ))
    }

    async fn sign_up(&self, _email: &str, _password: &str) -> Result<Session, AuthError> {
        Err(AuthError::Provider(
            "sign-up is handled by the external identity service".to_string(),
        ))
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        Ok(())
    }

    async fn current_session(&self) -> Result<Option<Session>, AuthError> {
        Ok(std::env::var("MODELWHIZ_USER_ID").ok().map(|user_id| Session {
            user_id,
            email: std::env::var("MODELWHIZ_USER_EMAIL").ok(),
        }))
    }
}

type Listener = Box<dyn Fn(Option<&Session>) + Send + Sync>;

/// Thread-safe holder of the current session with change subscriptions.
#[derive(Default)]
pub struct SessionStore {
    current: RwLock<Option<Session>>,
    listeners: RwLock<Vec<Listener>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<Session> {
        self.current.read().unwrap().clone()
    }

    pub fn user_id(&self) -> Option<String> {
        self.current().map(|session| session.user_id)
    }

    /// Replace the session and notify every subscriber.
    pub fn set(&self, session: Option<Session>) {
        {
            let mut current = self.current.write().unwrap();
            *current = session.clone();
        }
        debug!(signed_in = session.is_some(), "Session changed");
        for listener in self.listeners.read().unwrap().iter() {
            listener(session.as_ref());
        }
    }

    pub fn clear(&self) {
        self.set(None);
    }

    pub fn on_change(&self, listener: impl Fn(Option<&Session>) + Send + Sync + 'static) {
        self.listeners.write().unwrap().push(Box::new(listener));
    }
}
