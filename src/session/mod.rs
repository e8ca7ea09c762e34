//! Persisted session state: one record, whole-record writes only.

pub mod store;

pub use store::{FileSessionStore, MemorySessionStore, SessionStoreConfig};

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The authenticated session record.
///
/// A session is valid iff the token is non-empty and the expiry lies in
/// the future. The triple (token, expiry, remember) is only ever written
/// or removed as a unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub remember: bool,
}

impl Session {
    pub fn is_valid(&self) -> bool {
        !self.token.is_empty() && Utc::now() < self.expires_at
    }
}

/// Errors from the session persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<std::io::Error> for StoreError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error.to_string())
    }
}

impl From<toml::de::Error> for StoreError {
    fn from(error: toml::de::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

impl From<toml::ser::Error> for StoreError {
    fn from(error: toml::ser::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

/// Storage abstraction for the persisted session.
///
/// `save` and `clear` are the only mutators of session state anywhere in
/// the crate; both operate on the whole record.
pub trait SessionStore: Send + Sync {
    fn save(&self, session: &Session) -> Result<(), StoreError>;
    fn read(&self) -> Result<Option<Session>, StoreError>;
    fn clear(&self) -> Result<(), StoreError>;

    /// The stored session, filtered through the validity check.
    fn read_valid(&self) -> Result<Option<Session>, StoreError> {
        Ok(self.read()?.filter(Session::is_valid))
    }
}

/// Outcome of a protected-route check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    Allow,
    /// Navigate to the login entry point; the originally requested
    /// destination rides along for the post-login redirect.
    RedirectToLogin { target: String },
}

/// Client-side gate for protected routes.
///
/// UX-only: real access control lives on the API. Grounds the rule that
/// navigation without a valid session goes to the login entry point with
/// the requested destination preserved.
pub struct RouteGate {
    store: Arc<dyn SessionStore>,
    login_path: String,
}

impl RouteGate {
    pub fn new(store: Arc<dyn SessionStore>, login_path: impl Into<String>) -> Self {
        Self {
            store,
            login_path: login_path.into(),
        }
    }

    pub fn check(&self, requested_path: &str) -> RouteDecision {
        match self.store.read_valid() {
            Ok(Some(_)) => RouteDecision::Allow,
            Ok(None) => RouteDecision::RedirectToLogin {
                target: login_redirect(&self.login_path, requested_path),
            },
            Err(err) => {
                tracing::warn!(error = %err, "session read failed, treating route as unauthenticated");
                RouteDecision::RedirectToLogin {
                    target: login_redirect(&self.login_path, requested_path),
                }
            }
        }
    }
}

fn login_redirect(login_path: &str, requested_path: &str) -> String {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("return_to", requested_path)
        .finish();
    format!("{login_path}?{query}")
}
