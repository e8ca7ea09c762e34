use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::config::SessionPolicy;
use crate::error::{FlowError, Result};
use crate::http::{self, ApiClient};
use crate::session::{Session, SessionStore};

use super::probe::Identifier;

/// Grant payload returned by login and registration.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenGrant {
    pub token: String,
    #[serde(default)]
    pub expires_in: i64,
}

/// Password authentication, optionally carrying a step-up code.
pub struct CredentialLoginService {
    api: Arc<ApiClient>,
    sessions: Arc<dyn SessionStore>,
    policy: SessionPolicy,
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    otp_code: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    captcha: Option<&'a str>,
}

impl CredentialLoginService {
    pub fn new(
        api: Arc<ApiClient>,
        sessions: Arc<dyn SessionStore>,
        policy: SessionPolicy,
    ) -> Self {
        Self {
            api,
            sessions,
            policy,
        }
    }

    /// Authenticate and persist the resulting session as one atomic
    /// record. The persisted validity window comes from the session
    /// policy, selected by the remember flag.
    ///
    /// A credential rejection surfaces as a business error and leaves
    /// any flow state untouched so the caller can retry; a 401 clears
    /// the pre-existing session on the way through the http layer.
    pub async fn login(
        &self,
        identifier: &Identifier,
        secret: &str,
        step_up_code: Option<&str>,
        remember: bool,
        captcha: Option<&str>,
    ) -> Result<Session> {
        if secret.is_empty() {
            return Err(FlowError::validation("password", "enter your password"));
        }

        let request = LoginRequest {
            username: identifier.as_str(),
            password: secret,
            otp_code: step_up_code,
            captcha,
        };
        let grant: TokenGrant = http::require_payload(
            self.api.post_json("account/login", &request).await?,
            "login",
        )?;
        tracing::debug!(expires_in = grant.expires_in, remember, "login accepted");

        let session = Session {
            token: grant.token,
            expires_at: Utc::now() + self.policy.window(remember),
            remember,
        };
        self.sessions.save(&session)?;
        Ok(session)
    }
}
