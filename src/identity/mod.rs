//! Identities bound to the active session.

use std::sync::Arc;

use serde::Deserialize;

use crate::http::{self, ApiClient};

/// One account bound to the session. Read-only to this crate.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Identity {
    #[serde(rename = "uuid")]
    pub id: String,
    pub display_name: String,
    pub email: String,
    #[serde(default)]
    pub avatar: String,
    #[serde(default)]
    pub is_primary: bool,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IdentityListResponse {
    identities: Option<Vec<Identity>>,
}

/// Lists the identities bound to the session and tracks the selected
/// one. A listing failure leaves an empty list (the failure itself is
/// published by the http layer) so dependent UI never blocks on it.
pub struct MultiIdentityDirectory {
    api: Arc<ApiClient>,
    identities: Vec<Identity>,
    selected: Option<String>,
}

impl MultiIdentityDirectory {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self {
            api,
            identities: Vec::new(),
            selected: None,
        }
    }

    /// Fetch the identity list, replacing the cached one. Order is the
    /// backend's.
    pub async fn refresh(&mut self) -> &[Identity] {
        match self.fetch().await {
            Ok(identities) => self.identities = identities,
            Err(err) => {
                tracing::warn!(error = %err, "identity listing failed");
                self.identities.clear();
            }
        }
        if let Some(selected) = &self.selected {
            if !self.identities.iter().any(|identity| &identity.id == selected) {
                self.selected = None;
            }
        }
        &self.identities
    }

    async fn fetch(&self) -> crate::error::Result<Vec<Identity>> {
        let data: IdentityListResponse = http::require_payload(
            self.api.get_json("account/identities", &[]).await?,
            "identity listing",
        )?;
        Ok(data.identities.unwrap_or_default())
    }

    pub fn list(&self) -> &[Identity] {
        &self.identities
    }

    /// Select an identity by id; returns false when the id is unknown.
    pub fn select(&mut self, id: &str) -> bool {
        if self.identities.iter().any(|identity| identity.id == id) {
            self.selected = Some(id.to_string());
            true
        } else {
            false
        }
    }

    /// The explicitly selected identity, else the primary, else the
    /// first listed.
    pub fn selected(&self) -> Option<&Identity> {
        if let Some(id) = &self.selected {
            return self.identities.iter().find(|identity| &identity.id == id);
        }
        self.identities
            .iter()
            .find(|identity| identity.is_primary)
            .or_else(|| self.identities.first())
    }
}
