use std::fmt;
use std::sync::{Arc, OnceLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{FlowError, Result};
use crate::http::ApiClient;

/// Syntactic email-shape check, applied before any remote call.
fn email_shape() -> &'static Regex {
    static EMAIL_SHAPE: OnceLock<Regex> = OnceLock::new();
    EMAIL_SHAPE.get_or_init(|| {
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email shape pattern is valid")
    })
}

/// A user-supplied account handle, validated as email-shaped.
///
/// Construction is only possible through [`Identifier::parse`], so an
/// `Identifier` in hand has already passed the local check and obviously
/// invalid input never costs a network round-trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identifier(String);

impl Identifier {
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(FlowError::validation("identifier", "enter an email address"));
        }
        if !email_shape().is_match(trimmed) {
            return Err(FlowError::validation(
                "identifier",
                "enter a valid email address",
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The part before the `@`, used as the default username.
    pub fn local_part(&self) -> &str {
        self.0.split('@').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of an account existence check.
///
/// `step_up_required` only exists inside `Exists`; an ambiguous backend
/// payload yields `Unknown` rather than a guess.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Exists { step_up_required: bool },
    NotFound,
    Unknown,
}

/// Read-only existence check for an identifier.
pub struct AccountProbe {
    api: Arc<ApiClient>,
}

#[derive(Debug, Serialize)]
struct StatusRequest<'a> {
    username: &'a str,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    exists: Option<bool>,
    user_info: Option<StatusUserInfo>,
}

#[derive(Debug, Deserialize)]
struct StatusUserInfo {
    #[serde(default)]
    step_up_enabled: bool,
}

impl AccountProbe {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self { api }
    }

    /// Ask the backend whether the identifier names an existing account
    /// and whether logging into it requires a step-up code.
    pub async fn probe(&self, identifier: &Identifier) -> Result<ProbeOutcome> {
        let request = StatusRequest {
            username: identifier.as_str(),
        };
        let data: Option<StatusResponse> = self.api.post_json("account/status", &request).await?;

        let outcome = match data {
            Some(StatusResponse {
                exists: Some(true),
                user_info,
            }) => ProbeOutcome::Exists {
                step_up_required: user_info.is_some_and(|info| info.step_up_enabled),
            },
            Some(StatusResponse {
                exists: Some(false),
                ..
            }) => ProbeOutcome::NotFound,
            // payload present but existence flag missing, or no payload
            _ => ProbeOutcome::Unknown,
        };
        tracing::debug!(identifier = %identifier, ?outcome, "probe settled");
        Ok(outcome)
    }
}
