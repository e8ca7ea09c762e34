use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::config::SessionPolicy;
use crate::error::{FlowError, Result};
use crate::http::{self, ApiClient};
use crate::session::{Session, SessionStore};

use super::login::TokenGrant;
use super::probe::Identifier;

/// What a one-time code is being requested for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodePurpose {
    Register,
    ResetPassword,
    MultiIdentity,
}

impl CodePurpose {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Register => "register",
            Self::ResetPassword => "reset_password",
            Self::MultiIdentity => "multi_identity",
        }
    }
}

/// Proof of a registration in progress.
///
/// A ticket starts unverified when a code is requested and only
/// [`VerificationClient::confirm_code`] produces a verified one, so a
/// verified ticket in hand means the email exchange actually happened.
#[derive(Debug, Clone)]
pub struct RegistrationTicket {
    code: String,
    verified: bool,
    expires_at: DateTime<Utc>,
}

impl RegistrationTicket {
    fn pending(expires_at: DateTime<Utc>) -> Self {
        Self {
            code: String::new(),
            verified: false,
            expires_at,
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    /// Verified and not yet expired.
    pub fn is_verified(&self) -> bool {
        self.verified && Utc::now() < self.expires_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}

/// Collaborator client for the code-delivery and code-confirmation
/// exchange. Consumed by registration; not reimplemented here.
pub struct VerificationClient {
    api: Arc<ApiClient>,
}

#[derive(Debug, Serialize)]
struct SendCodeRequest<'a> {
    useremail: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    captcha: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct ConfirmCodeRequest<'a> {
    useremail: &'a str,
    code: &'a str,
}

#[derive(Debug, Deserialize)]
struct ConfirmCodeResponse {
    temp_code: String,
    #[serde(default)]
    expires_in: i64,
}

impl VerificationClient {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self { api }
    }

    /// Ask the backend to email a one-time code. A still-valid earlier
    /// code surfaces as a business error carrying the cooldown message.
    pub async fn send_code(
        &self,
        identifier: &Identifier,
        purpose: CodePurpose,
        captcha: Option<&str>,
    ) -> Result<RegistrationTicket> {
        let request = SendCodeRequest {
            useremail: identifier.as_str(),
            captcha,
        };
        self.api
            .post_unit(&code_path("account/sendcode", purpose), &request)
            .await?;
        // codes are short-lived; the pending ticket mirrors that
        Ok(RegistrationTicket::pending(Utc::now() + Duration::minutes(30)))
    }

    /// Confirm the emailed code and obtain a verified ticket.
    pub async fn confirm_code(
        &self,
        identifier: &Identifier,
        code: &str,
        purpose: CodePurpose,
    ) -> Result<RegistrationTicket> {
        if code.trim().is_empty() {
            return Err(FlowError::validation("code", "enter the verification code"));
        }
        let request = ConfirmCodeRequest {
            useremail: identifier.as_str(),
            code: code.trim(),
        };
        let confirmed: ConfirmCodeResponse = http::require_payload(
            self.api
                .post_json(&code_path("account/verifycode", purpose), &request)
                .await?,
            "code confirmation",
        )?;
        Ok(RegistrationTicket {
            code: confirmed.temp_code,
            verified: true,
            expires_at: Utc::now() + Duration::seconds(confirmed.expires_in.max(0)),
        })
    }
}

fn code_path(base: &str, purpose: CodePurpose) -> String {
    format!("{base}?usefor={}", purpose.as_str())
}

/// Registration gated by a verified one-time code.
pub struct RegistrationService {
    api: Arc<ApiClient>,
    sessions: Arc<dyn SessionStore>,
    policy: SessionPolicy,
}

#[derive(Debug, Serialize)]
struct RegisterRequest<'a> {
    username: &'a str,
    useremail: &'a str,
    password: &'a str,
    temp_code: &'a str,
}

impl RegistrationService {
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

    /// Create the account and persist the session. Registration always
    /// persists under the remember window. When no username is chosen
    /// the identifier's local part is used.
    pub async fn register(
        &self,
        username: Option<&str>,
        identifier: &Identifier,
        secret: &str,
        ticket: &RegistrationTicket,
    ) -> Result<Session> {
        if !ticket.is_verified() {
            return Err(FlowError::validation(
                "ticket",
                "verify the email code before registering",
            ));
        }
        if secret.is_empty() {
            return Err(FlowError::validation("password", "choose a password"));
        }
        let username = match username.map(str::trim) {
            Some(name) if !name.is_empty() => name,
            _ => identifier.local_part(),
        };

        let request = RegisterRequest {
            username,
            useremail: identifier.as_str(),
            password: secret,
            temp_code: ticket.code(),
        };
        let grant: TokenGrant = http::require_payload(
            self.api.post_json("account/register", &request).await?,
            "registration",
        )?;
        tracing::debug!(expires_in = grant.expires_in, username, "registration accepted");

        let session = Session {
            token: grant.token,
            expires_at: Utc::now() + self.policy.window(true),
            remember: true,
        };
        self.sessions.save(&session)?;
        Ok(session)
    }
}
