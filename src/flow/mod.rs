//! The top-level login/register/step-up state machine.
//!
//! Composes the account probe, the credential login service, the
//! registration service and the session store into one flow with a
//! closed set of states. All mode decisions live in [`FlowState`]; there
//! are no ambient boolean flags, so two modes can never be true at once.

pub mod login;
pub mod probe;
pub mod register;

pub use login::CredentialLoginService;
pub use probe::{AccountProbe, Identifier, ProbeOutcome};
pub use register::{CodePurpose, RegistrationService, RegistrationTicket, VerificationClient};

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::config::ClientConfig;
use crate::error::{FlowError, Result};
use crate::events::{ErrorEvent, ErrorEventBus};
use crate::http::ApiClient;
use crate::session::SessionStore;

/// The flow is in exactly one of these states at any instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    Idle,
    /// An existence probe is the current step. The flow stays here when
    /// the backend answer is ambiguous; only a definite answer moves on.
    Probing,
    LoginReady {
        step_up_required: bool,
    },
    /// Password accepted locally; a step-up code is still needed before
    /// the remote login call is made.
    StepUpPending,
    RegisterReady,
    Authenticated,
    Failed,
}

/// How a submission was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// The submission drove the flow to the returned state.
    Settled(FlowState),
    /// A remote call was already outstanding, or the result arrived
    /// after the flow had moved on; nothing was queued or applied.
    Ignored,
}

#[derive(Debug)]
struct FlowInner {
    state: FlowState,
    identifier: Option<Identifier>,
    step_up_required: bool,
    in_flight: bool,
    epoch: u64,
    destination: Option<String>,
}

impl FlowInner {
    /// Drop everything tied to the current identifier so nothing leaks
    /// between unrelated flows.
    fn clear_flow_local(&mut self) {
        self.identifier = None;
        self.step_up_required = false;
    }
}

/// Orchestrates probe → (login | registration) → session.
///
/// At most one remote call is in flight per controller; a submission
/// while one is outstanding is an ignored no-op, never queued. A
/// superseded call's result is discarded by epoch comparison instead of
/// being applied to a flow that has moved on.
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use authflow::config::ClientConfig;
/// use authflow::events::ErrorEventBus;
/// use authflow::flow::AuthFlowController;
/// use authflow::session::MemorySessionStore;
///
/// let config = ClientConfig::new("https://id.example.net/api/v0");
/// let flow = AuthFlowController::new(
///     &config,
///     Arc::new(MemorySessionStore::new()),
///     Arc::new(ErrorEventBus::new()),
/// );
/// ```
pub struct AuthFlowController {
    probe: AccountProbe,
    login: CredentialLoginService,
    register: RegistrationService,
    events: Arc<ErrorEventBus>,
    landing_path: String,
    inner: Mutex<FlowInner>,
}

impl AuthFlowController {
    pub fn new(
        config: &ClientConfig,
        sessions: Arc<dyn SessionStore>,
        events: Arc<ErrorEventBus>,
    ) -> Self {
        let api = Arc::new(ApiClient::new(config, sessions.clone(), events.clone()));
        Self::with_api(api, config, sessions, events)
    }

    /// Build around a shared [`ApiClient`] (one client can serve this
    /// controller plus consent and identity lookups).
    pub fn with_api(
        api: Arc<ApiClient>,
        config: &ClientConfig,
        sessions: Arc<dyn SessionStore>,
        events: Arc<ErrorEventBus>,
    ) -> Self {
        Self {
            probe: AccountProbe::new(api.clone()),
            login: CredentialLoginService::new(
                api.clone(),
                sessions.clone(),
                config.session.clone(),
            ),
            register: RegistrationService::new(api, sessions, config.session.clone()),
            events,
            landing_path: config.landing_path.clone(),
            inner: Mutex::new(FlowInner {
                state: FlowState::Idle,
                identifier: None,
                step_up_required: false,
                in_flight: false,
                epoch: 0,
                destination: None,
            }),
        }
    }

    pub async fn state(&self) -> FlowState {
        self.inner.lock().await.state
    }

    /// The identifier the current flow is about, if one was submitted.
    pub async fn identifier(&self) -> Option<Identifier> {
        self.inner.lock().await.identifier.clone()
    }

    /// Remember where to navigate once the flow reaches
    /// `Authenticated` (typically the destination a route gate
    /// preserved).
    pub async fn set_post_login_destination(&self, path: impl Into<String>) {
        self.inner.lock().await.destination = Some(path.into());
    }

    /// Where to navigate after authentication; the landing path when no
    /// destination was preserved.
    pub async fn post_login_destination(&self) -> String {
        self.inner
            .lock()
            .await
            .destination
            .clone()
            .unwrap_or_else(|| self.landing_path.clone())
    }

    /// Abandon the current flow and return to `Idle`. Any outstanding
    /// call's result is discarded when it lands.
    pub async fn reset(&self) {
        let mut inner = self.inner.lock().await;
        inner.state = FlowState::Idle;
        inner.clear_flow_local();
        inner.in_flight = false;
        inner.epoch += 1;
    }

    /// Probe an identifier and branch the flow.
    ///
    /// Accepted from any state; flow-local state from a previous
    /// identifier is discarded first. Malformed input fails locally
    /// without a remote call and without changing state.
    pub async fn submit_identifier(&self, raw: &str) -> Result<Submission> {
        let identifier = Identifier::parse(raw)?;

        let epoch = {
            let mut inner = self.inner.lock().await;
            if inner.in_flight {
                return Ok(Submission::Ignored);
            }
            inner.clear_flow_local();
            inner.identifier = Some(identifier.clone());
            inner.state = FlowState::Probing;
            inner.in_flight = true;
            inner.epoch += 1;
            inner.epoch
        };

        let result = self.probe.probe(&identifier).await;

        let mut inner = self.inner.lock().await;
        if inner.epoch != epoch {
            return Ok(Submission::Ignored);
        }
        inner.in_flight = false;
        match result {
            Ok(ProbeOutcome::Exists { step_up_required }) => {
                inner.step_up_required = step_up_required;
                inner.state = FlowState::LoginReady { step_up_required };
                Ok(Submission::Settled(inner.state))
            }
            Ok(ProbeOutcome::NotFound) => {
                inner.state = FlowState::RegisterReady;
                Ok(Submission::Settled(inner.state))
            }
            Ok(ProbeOutcome::Unknown) => {
                // indeterminate account state: do not guess a branch
                drop(inner);
                let message = "account status response was incomplete";
                self.events.publish(ErrorEvent::Server {
                    status: 200,
                    message: message.to_string(),
                });
                Err(FlowError::server(200, message))
            }
            Err(err) => {
                inner.state = FlowState::Idle;
                Err(err)
            }
        }
    }

    /// Submit the password (and step-up code when required).
    ///
    /// When the probe flagged step-up and no code is supplied, the
    /// password only advances the flow to `StepUpPending`; the remote
    /// login call is never issued without the code. A credential
    /// rejection keeps the current state so the user can retry without
    /// re-probing.
    pub async fn submit_credentials(
        &self,
        password: &str,
        step_up_code: Option<&str>,
        remember: bool,
        captcha: Option<&str>,
    ) -> Result<Submission> {
        let (identifier, epoch) = {
            let mut inner = self.inner.lock().await;
            if inner.in_flight {
                return Ok(Submission::Ignored);
            }
            match inner.state {
                FlowState::LoginReady { .. } | FlowState::StepUpPending => {}
                _ => {
                    return Err(FlowError::validation(
                        "state",
                        "no login is in progress for this flow",
                    ))
                }
            }
            if password.is_empty() {
                return Err(FlowError::validation("password", "enter your password"));
            }
            if inner.step_up_required && step_up_code.is_none() {
                inner.state = FlowState::StepUpPending;
                return Ok(Submission::Settled(inner.state));
            }
            let identifier = inner
                .identifier
                .clone()
                .ok_or_else(|| FlowError::validation("state", "no identifier was submitted"))?;
            inner.in_flight = true;
            inner.epoch += 1;
            (identifier, inner.epoch)
        };

        let result = self
            .login
            .login(&identifier, password, step_up_code, remember, captcha)
            .await;
        self.settle_attempt(epoch, result.map(|_| ())).await
    }

    /// Submit the registration form for a probed-unknown identifier.
    pub async fn submit_registration(
        &self,
        username: Option<&str>,
        password: &str,
        ticket: &RegistrationTicket,
    ) -> Result<Submission> {
        let (identifier, epoch) = {
            let mut inner = self.inner.lock().await;
            if inner.in_flight {
                return Ok(Submission::Ignored);
            }
            if inner.state != FlowState::RegisterReady {
                return Err(FlowError::validation(
                    "state",
                    "no registration is in progress for this flow",
                ));
            }
            let identifier = inner
                .identifier
                .clone()
                .ok_or_else(|| FlowError::validation("state", "no identifier was submitted"))?;
            inner.in_flight = true;
            inner.epoch += 1;
            (identifier, inner.epoch)
        };

        let result = self
            .register
            .register(username, &identifier, password, ticket)
            .await;
        self.settle_attempt(epoch, result.map(|_| ())).await
    }

    /// Apply the outcome of a login/registration attempt, unless the
    /// flow moved on while the call was outstanding.
    async fn settle_attempt(&self, epoch: u64, result: Result<()>) -> Result<Submission> {
        let mut inner = self.inner.lock().await;
        if inner.epoch != epoch {
            return Ok(Submission::Ignored);
        }
        inner.in_flight = false;
        match result {
            Ok(()) => {
                inner.state = FlowState::Authenticated;
                Ok(Submission::Settled(inner.state))
            }
            Err(err) if err.is_retryable_in_place() => {
                // wrong credentials or a local precondition: same state,
                // the user may try again without re-probing
                Err(err)
            }
            Err(err) => {
                inner.state = FlowState::Failed;
                Err(err)
            }
        }
    }
}
