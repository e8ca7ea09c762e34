//! The signed-in account: profile reads, username changes, and step-up
//! authenticator enrollment.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{FlowError, Result};
use crate::http::{self, ApiClient};

/// Profile of the signed-in account.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct UserProfile {
    pub user_id: String,
    pub user_name: String,
    #[serde(rename = "user_email")]
    pub email: String,
    #[serde(rename = "user_avatar", default)]
    pub avatar: String,
    #[serde(default)]
    pub role: String,
    #[serde(rename = "register_at", default)]
    pub registered_at: String,
    #[serde(rename = "is_banned", default)]
    pub banned: bool,
    #[serde(rename = "otp_enabled", default)]
    pub step_up_enabled: bool,
}

#[derive(Debug, Deserialize)]
struct ProfileResponse {
    user_info: Option<UserProfile>,
}

/// Provisioning material for enrolling a one-time-code authenticator.
#[derive(Debug, Clone, Deserialize)]
pub struct TotpEnrollment {
    pub secret: String,
    #[serde(rename = "qr_code")]
    pub otpauth_url: String,
    pub issuer: String,
    pub account: String,
    #[serde(rename = "exp_time", default)]
    pub expires_in: i64,
}

#[derive(Debug, Deserialize)]
struct EnrollmentConfirmResponse {
    recovery_codes: Vec<String>,
}

#[derive(Debug, Serialize)]
struct UpdateUsernameRequest<'a> {
    username: &'a str,
}

#[derive(Debug, Serialize)]
struct EnrollmentConfirmRequest<'a> {
    code: &'a str,
}

/// Authenticated operations on the signed-in account.
pub struct ProfileClient {
    api: Arc<ApiClient>,
}

impl ProfileClient {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self { api }
    }

    pub async fn fetch(&self) -> Result<UserProfile> {
        let data: ProfileResponse =
            http::require_payload(self.api.get_json("account/info", &[]).await?, "profile")?;
        http::require_payload(data.user_info, "profile")
    }

    /// Change the display username. Input is trimmed; an empty name is
    /// rejected locally.
    pub async fn update_username(&self, new_name: &str) -> Result<()> {
        let trimmed = new_name.trim();
        if trimmed.is_empty() {
            return Err(FlowError::validation("username", "enter a username"));
        }
        self.api
            .post_unit("account/username", &UpdateUsernameRequest { username: trimmed })
            .await
    }

    /// Start enrolling a one-time-code authenticator; returns the
    /// provisioning secret and otpauth payload to present to the user.
    pub async fn begin_totp_enrollment(&self) -> Result<TotpEnrollment> {
        http::require_payload(
            self.api.get_json("account/totp/generate", &[]).await?,
            "authenticator enrollment",
        )
    }

    /// Confirm enrollment with the first generated code; returns the
    /// recovery codes. A wrong first code is a business error.
    pub async fn confirm_totp_enrollment(&self, code: &str) -> Result<Vec<String>> {
        let trimmed = code.trim();
        if trimmed.is_empty() {
            return Err(FlowError::validation("code", "enter the authenticator code"));
        }
        let data: EnrollmentConfirmResponse = http::require_payload(
            self.api
                .post_json("account/totp/verify", &EnrollmentConfirmRequest { code: trimmed })
                .await?,
            "authenticator confirmation",
        )?;
        Ok(data.recovery_codes)
    }
}
