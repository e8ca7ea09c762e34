//! Remote-call plumbing: one request path, one classification function.
//!
//! Every backend response travels through [`ApiClient::execute`], which
//! decodes the shared `{ status, msg, data, type }` envelope, resolves
//! failures to exactly one [`FlowError`] kind, publishes the matching
//! event topic, and clears the session on any 401.

use std::sync::Arc;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::ClientConfig;
use crate::error::{FlowError, Result};
use crate::events::{ErrorEvent, ErrorEventBus, MessageKind};
use crate::session::SessionStore;

/// Shared response envelope. `status` is the application status and may
/// differ from the HTTP status; `type` carries the message kind for
/// transient domain messages.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: u16,
    #[serde(default)]
    msg: String,
    data: Option<T>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

/// Thin request/response client over the identity backend.
///
/// Attaches the current session token as a bearer credential whenever a
/// valid session exists, on every outbound call.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    sessions: Arc<dyn SessionStore>,
    events: Arc<ErrorEventBus>,
}

impl ApiClient {
    pub fn new(
        config: &ClientConfig,
        sessions: Arc<dyn SessionStore>,
        events: Arc<ErrorEventBus>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            sessions,
            events,
        }
    }

    pub(crate) async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<Option<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self.http.post(self.endpoint(path)).json(body);
        self.execute(path, request).await
    }

    /// POST whose response carries no payload of interest.
    pub(crate) async fn post_unit<B>(&self, path: &str, body: &B) -> Result<()>
    where
        B: Serialize + ?Sized,
    {
        let _: Option<serde_json::Value> = self.post_json(path, body).await?;
        Ok(())
    }

    pub(crate) async fn get_json<T>(&self, path: &str, query: &[(&str, &str)]) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        let request = self.http.get(self.endpoint(path)).query(query);
        self.execute(path, request).await
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn execute<T>(&self, path: &str, request: reqwest::RequestBuilder) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        let mut request = request;
        if let Some(session) = self.sessions.read_valid()? {
            request = request.bearer_auth(session.token);
        }

        tracing::debug!(path, "issuing request");
        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => return Err(self.report(path, FlowError::from(err))),
        };

        let http_status = response.status();
        if http_status == StatusCode::UNAUTHORIZED {
            return Err(self.report(path, FlowError::Unauthorized));
        }
        if http_status.is_server_error() {
            return Err(self.report(
                path,
                FlowError::server(http_status.as_u16(), "the server reported a fault"),
            ));
        }

        let envelope: Envelope<T> = match response.json().await {
            Ok(envelope) => envelope,
            Err(err) => return Err(self.report(path, FlowError::from(err))),
        };

        match classify(envelope.status, &envelope.msg, envelope.kind.as_deref()) {
            Some(err) => Err(self.report(path, err)),
            None => Ok(envelope.data),
        }
    }

    /// Publish the event matching a classified failure and, for 401s,
    /// clear the session. The only side-effect point on the error path.
    fn report(&self, path: &str, err: FlowError) -> FlowError {
        tracing::warn!(path, error = %err, "remote call failed");
        match &err {
            FlowError::Unauthorized => {
                if let Err(clear_err) = self.sessions.clear() {
                    tracing::warn!(error = %clear_err, "failed to clear session after 401");
                }
                self.events.publish(ErrorEvent::Unauthorized);
            }
            FlowError::Network(message) => {
                self.events.publish(ErrorEvent::Network {
                    message: message.clone(),
                });
            }
            FlowError::Server { status, message } => {
                self.events.publish(ErrorEvent::Server {
                    status: *status,
                    message: message.clone(),
                });
            }
            FlowError::Business { kind, message } => {
                self.events.publish(ErrorEvent::Message {
                    kind: *kind,
                    text: message.clone(),
                });
            }
            FlowError::Validation { .. } | FlowError::Storage(_) => {}
        }
        err
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Map an application envelope to a failure, or `None` on success.
///
/// The single classification function: 401 is an authorization failure,
/// 5xx a server fault, 418 a transient domain message whose kind rides
/// in `type`, and any other non-2xx a handled domain failure.
fn classify(status: u16, msg: &str, kind: Option<&str>) -> Option<FlowError> {
    match status {
        200..=299 => None,
        401 => Some(FlowError::Unauthorized),
        418 => Some(FlowError::Business {
            kind: MessageKind::from_wire(kind),
            message: msg.to_string(),
        }),
        500..=599 => Some(FlowError::server(status, msg)),
        _ => Some(FlowError::Business {
            kind: MessageKind::Error,
            message: msg.to_string(),
        }),
    }
}

/// Unwrap the payload of a successful envelope that must carry one.
pub(crate) fn require_payload<T>(data: Option<T>, what: &str) -> Result<T> {
    data.ok_or_else(|| FlowError::server(200, format!("{what} response was missing its payload")))
}
