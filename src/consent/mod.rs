//! OAuth authorization/consent exchange for third-party clients.
//!
//! Parses the inbound authorization request, fetches the requesting
//! client's metadata, renders requested scopes as permission
//! descriptions, and resolves the request to an approval redirect or a
//! denial redirect. Reads the session (bearer attach) but never writes
//! session state.

pub mod scopes;

pub use scopes::{describe, describe_all, PermissionDescription};

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::ClientConfig;
use crate::http::{self, ApiClient};

/// An inbound authorization request, immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthRequest {
    pub client_id: String,
    pub redirect_uri: Option<String>,
    pub response_type: String,
    pub scope: String,
    pub state: Option<String>,
}

impl OAuthRequest {
    /// Parse from a raw query string (`client_id=…&scope=…`). Returns
    /// `None` when `client_id` is missing or empty; nothing else is
    /// required at parse time.
    pub fn parse_query(query: &str) -> Option<Self> {
        let mut client_id = None;
        let mut redirect_uri = None;
        let mut response_type = None;
        let mut scope = None;
        let mut state = None;
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "client_id" => client_id = Some(value.into_owned()),
                "redirect_uri" => redirect_uri = Some(value.into_owned()),
                "response_type" => response_type = Some(value.into_owned()),
                "scope" => scope = Some(value.into_owned()),
                "state" => state = Some(value.into_owned()),
                _ => {}
            }
        }
        let client_id = client_id.filter(|id| !id.is_empty())?;
        Some(Self {
            client_id,
            redirect_uri,
            response_type: response_type.unwrap_or_else(|| "code".to_string()),
            scope: scope.unwrap_or_default(),
            state,
        })
    }
}

/// Metadata about the application requesting access.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientMetadata {
    #[serde(rename = "client_name")]
    pub name: String,
    #[serde(rename = "created_by")]
    pub creator: String,
    #[serde(rename = "avatar")]
    pub icon: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub permissions: Vec<String>,
}

/// Where the consent exchange currently stands. `Approved` and
/// `Rejected` are terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsentState {
    Init,
    Loading,
    AwaitingDecision,
    Processing,
    Approved { redirect: String },
    Rejected { redirect: String },
    Error { message: String },
}

impl ConsentState {
    /// Whether a decision has settled; no further decisions are
    /// accepted past this point.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved { .. } | Self::Rejected { .. })
    }
}

#[derive(Debug, Serialize)]
struct ClientInfoRequest<'a> {
    client_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct AuthorizeResponse {
    redirect_url: String,
}

/// Drives one authorization request from parsing to a terminal
/// decision.
///
/// # Example
/// ```no_run
/// # async fn example(api: std::sync::Arc<authflow::http::ApiClient>) {
/// use authflow::config::ClientConfig;
/// use authflow::consent::{ConsentState, OAuthConsentController};
///
/// let config = ClientConfig::new("https://id.example.net/api/v0");
/// let mut consent = OAuthConsentController::new(api, &config);
/// consent.begin("client_id=abc&scope=openid").await;
/// if let ConsentState::AwaitingDecision = consent.state() {
///     for permission in consent.permissions() {
///         println!("{}", permission.summary);
///     }
/// }
/// # }
/// ```
pub struct OAuthConsentController {
    api: Arc<ApiClient>,
    landing_path: String,
    state: ConsentState,
    request: Option<OAuthRequest>,
    metadata: Option<ClientMetadata>,
}

impl OAuthConsentController {
    pub fn new(api: Arc<ApiClient>, config: &ClientConfig) -> Self {
        Self {
            api,
            landing_path: config.landing_path.clone(),
            state: ConsentState::Init,
            request: None,
            metadata: None,
        }
    }

    pub fn state(&self) -> &ConsentState {
        &self.state
    }

    pub fn request(&self) -> Option<&OAuthRequest> {
        self.request.as_ref()
    }

    pub fn client_metadata(&self) -> Option<&ClientMetadata> {
        self.metadata.as_ref()
    }

    /// The requested scopes rendered for the consent screen, in
    /// request order.
    pub fn permissions(&self) -> Vec<PermissionDescription> {
        self.request
            .as_ref()
            .map(|request| scopes::describe_all(&request.scope))
            .unwrap_or_default()
    }

    /// Parse the triggering request and load the client's metadata.
    ///
    /// A request without `client_id` settles in `Error` without any
    /// remote call. Only meaningful from `Init`; later calls return the
    /// current state unchanged.
    pub async fn begin(&mut self, query: &str) -> &ConsentState {
        if self.state != ConsentState::Init {
            return &self.state;
        }
        let Some(request) = OAuthRequest::parse_query(query) else {
            self.state = ConsentState::Error {
                message: "the authorization request is missing client_id".to_string(),
            };
            return &self.state;
        };

        self.state = ConsentState::Loading;
        let payload = ClientInfoRequest {
            client_id: &request.client_id,
        };
        let fetched = self
            .api
            .post_json("oauth/client", &payload)
            .await
            .and_then(|data| http::require_payload(data, "client metadata"));
        match fetched {
            Ok(metadata) => {
                self.metadata = Some(metadata);
                self.request = Some(request);
                self.state = ConsentState::AwaitingDecision;
            }
            Err(err) => {
                self.state = ConsentState::Error {
                    message: err.to_string(),
                };
            }
        }
        &self.state
    }

    /// Approve the request: ask the backend for the authorization
    /// redirect. Terminal states are settled; re-deciding is a no-op.
    pub async fn approve(&mut self) -> &ConsentState {
        if self.state != ConsentState::AwaitingDecision {
            // covers terminal states: a settled decision stays settled
            return &self.state;
        }
        // request is always present once AwaitingDecision is reached
        let Some(request) = self.request.clone() else {
            return &self.state;
        };

        self.state = ConsentState::Processing;
        let mut query: Vec<(&str, &str)> = vec![
            ("client_id", &request.client_id),
            ("response_type", &request.response_type),
            ("scope", &request.scope),
        ];
        if let Some(redirect_uri) = request.redirect_uri.as_deref() {
            query.push(("redirect_uri", redirect_uri));
        }
        if let Some(state) = request.state.as_deref() {
            query.push(("state", state));
        }

        let authorized = self
            .api
            .get_json::<AuthorizeResponse>("oauth/authorize", &query)
            .await
            .and_then(|data| http::require_payload(data, "authorization"));
        match authorized {
            Ok(response) => {
                self.state = ConsentState::Approved {
                    redirect: response.redirect_url,
                };
            }
            Err(err) => {
                self.state = ConsentState::Error {
                    message: err.to_string(),
                };
            }
        }
        &self.state
    }

    /// Reject the request. No remote call: the denial redirect is built
    /// from the request's `redirect_uri` with `error=access_denied` and
    /// the original `state` appended, or falls back to the landing path.
    pub fn reject(&mut self) -> &ConsentState {
        if self.state != ConsentState::AwaitingDecision {
            return &self.state;
        }
        let redirect = self
            .request
            .as_ref()
            .map(|request| denial_redirect(request, &self.landing_path))
            .unwrap_or_else(|| self.landing_path.clone());
        self.state = ConsentState::Rejected { redirect };
        &self.state
    }
}

fn denial_redirect(request: &OAuthRequest, fallback: &str) -> String {
    let Some(parsed) = request
        .redirect_uri
        .as_deref()
        .and_then(|uri| Url::parse(uri).ok())
    else {
        return fallback.to_string();
    };
    let mut url = parsed;
    {
        let mut pairs = url.query_pairs_mut();
        pairs.append_pair("error", "access_denied");
        if let Some(state) = request.state.as_deref() {
            pairs.append_pair("state", state);
        }
    }
    url.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(redirect_uri: Option<&str>, state: Option<&str>) -> OAuthRequest {
        OAuthRequest {
            client_id: "abc".to_string(),
            redirect_uri: redirect_uri.map(String::from),
            response_type: "code".to_string(),
            scope: "openid".to_string(),
            state: state.map(String::from),
        }
    }

    #[test]
    fn parse_query_requires_client_id() {
        assert!(OAuthRequest::parse_query("scope=openid").is_none());
        assert!(OAuthRequest::parse_query("client_id=").is_none());
        let parsed = OAuthRequest::parse_query("client_id=abc&scope=openid%20email").unwrap();
        assert_eq!(parsed.client_id, "abc");
        assert_eq!(parsed.scope, "openid email");
        assert_eq!(parsed.response_type, "code");
    }

    #[test]
    fn denial_redirect_appends_error_and_state() {
        let built = denial_redirect(
            &request(Some("https://client.example/cb"), Some("xyz")),
            "/",
        );
        assert_eq!(built, "https://client.example/cb?error=access_denied&state=xyz");
    }

    #[test]
    fn denial_redirect_keeps_existing_query() {
        let built = denial_redirect(
            &request(Some("https://client.example/cb?app=1"), None),
            "/",
        );
        assert_eq!(built, "https://client.example/cb?app=1&error=access_denied");
    }

    #[test]
    fn denial_redirect_falls_back_to_landing() {
        assert_eq!(denial_redirect(&request(None, Some("xyz")), "/"), "/");
    }
}
