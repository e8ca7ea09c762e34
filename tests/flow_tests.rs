//! Integration tests for the login/register/step-up flow: probe
//! branching, step-up gating, in-flight idempotence, and session
//! persistence policy.

mod support;

use std::sync::Arc;

use chrono::{Duration, Utc};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use authflow::error::ErrorKind;
use authflow::events::{ErrorEvent, ErrorEventBus, Topic};
use authflow::flow::{AuthFlowController, CodePurpose, FlowState, Submission, VerificationClient};
use authflow::session::{MemorySessionStore, SessionStore};

use support::{config_for, envelope, failure, EventRecorder};

fn controller_for(
    server: &MockServer,
) -> (
    AuthFlowController,
    Arc<MemorySessionStore>,
    Arc<ErrorEventBus>,
) {
    let sessions = Arc::new(MemorySessionStore::new());
    let events = Arc::new(ErrorEventBus::new());
    let flow = AuthFlowController::new(&config_for(server), sessions.clone(), events.clone());
    (flow, sessions, events)
}

async fn mount_probe(server: &MockServer, body: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path("/account/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

// ---------------------------------------------------------------------------
// Probe branching
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_identifier_transitions_to_register_ready() {
    let server = MockServer::start().await;
    mount_probe(&server, envelope(json!({ "exists": false }))).await;

    let (flow, _, _) = controller_for(&server);
    let submission = flow.submit_identifier("new@user.test").await.unwrap();

    assert_eq!(submission, Submission::Settled(FlowState::RegisterReady));
    assert_eq!(flow.state().await, FlowState::RegisterReady);
}

#[tokio::test]
async fn known_identifier_transitions_to_login_ready() {
    let server = MockServer::start().await;
    mount_probe(
        &server,
        envelope(json!({
            "exists": true,
            "user_info": { "email": "known@user.test", "step_up_enabled": false }
        })),
    )
    .await;

    let (flow, _, _) = controller_for(&server);
    flow.submit_identifier("known@user.test").await.unwrap();

    assert_eq!(
        flow.state().await,
        FlowState::LoginReady {
            step_up_required: false
        }
    );
}

#[tokio::test]
async fn step_up_flag_rides_into_login_ready() {
    let server = MockServer::start().await;
    mount_probe(
        &server,
        envelope(json!({
            "exists": true,
            "user_info": { "email": "known@user.test", "step_up_enabled": true }
        })),
    )
    .await;

    let (flow, _, _) = controller_for(&server);
    flow.submit_identifier("known@user.test").await.unwrap();

    assert_eq!(
        flow.state().await,
        FlowState::LoginReady {
            step_up_required: true
        }
    );
}

#[tokio::test]
async fn ambiguous_probe_payload_stays_in_probing() {
    let server = MockServer::start().await;
    // backend answered, but the existence flag is absent
    mount_probe(&server, envelope(json!({ "user_info": null }))).await;

    let (flow, _, events) = controller_for(&server);
    let recorder = EventRecorder::attach(&events);
    let err = flow.submit_identifier("vague@user.test").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Server);
    assert_eq!(flow.state().await, FlowState::Probing);
    assert_eq!(recorder.topics(), vec![Topic::ServerError]);

    // the flow is not stuck: a fresh submission is not ignored
    let retry = flow.submit_identifier("vague@user.test").await;
    assert!(!matches!(retry, Ok(Submission::Ignored)));
}

#[tokio::test]
async fn probe_failure_reports_and_returns_to_idle() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/account/status"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let (flow, _, events) = controller_for(&server);
    let recorder = EventRecorder::attach(&events);
    let err = flow.submit_identifier("down@user.test").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Server);
    assert_eq!(flow.state().await, FlowState::Idle);
    assert_eq!(recorder.topics(), vec![Topic::ServerError]);
}

#[tokio::test]
async fn duplicate_submissions_honor_exactly_one_probe() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/account/status"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(envelope(json!({ "exists": true })))
                .set_delay(std::time::Duration::from_millis(100)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let flow = Arc::new(controller_for(&server).0);
    let first = flow.submit_identifier("known@user.test");
    let second = flow.submit_identifier("known@user.test");
    let (first, second) = tokio::join!(first, second);

    let outcomes = [first.unwrap(), second.unwrap()];
    assert!(outcomes.contains(&Submission::Ignored));
    assert!(outcomes
        .iter()
        .any(|outcome| matches!(outcome, Submission::Settled(FlowState::LoginReady { .. }))));
}

// ---------------------------------------------------------------------------
// Login submissions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn wrong_credentials_keep_login_ready_and_allow_retry() {
    let server = MockServer::start().await;
    mount_probe(&server, envelope(json!({ "exists": true }))).await;
    Mock::given(method("POST"))
        .and(path("/account/login"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(failure(404, "wrong password")),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/account/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!({
            "token": "tok-1",
            "expires_in": 86400
        }))))
        .mount(&server)
        .await;

    let (flow, sessions, events) = controller_for(&server);
    let recorder = EventRecorder::attach(&events);
    flow.submit_identifier("known@user.test").await.unwrap();

    let err = flow
        .submit_credentials("bad-password", None, false, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Business);
    assert_eq!(
        flow.state().await,
        FlowState::LoginReady {
            step_up_required: false
        }
    );
    assert!(sessions.read().unwrap().is_none());
    assert_eq!(recorder.topics(), vec![Topic::Message]);

    // retry without re-probing succeeds
    flow.submit_credentials("right-password", None, false, None)
        .await
        .unwrap();
    assert_eq!(flow.state().await, FlowState::Authenticated);
    let session = sessions.read().unwrap().unwrap();
    assert_eq!(session.token, "tok-1");
    assert!(!session.remember);
}

#[tokio::test]
async fn server_fault_during_login_is_terminal() {
    let server = MockServer::start().await;
    mount_probe(&server, envelope(json!({ "exists": true }))).await;
    Mock::given(method("POST"))
        .and(path("/account/login"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let (flow, sessions, events) = controller_for(&server);
    let recorder = EventRecorder::attach(&events);
    flow.submit_identifier("known@user.test").await.unwrap();

    let err = flow
        .submit_credentials("pw", None, false, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Server);
    assert_eq!(flow.state().await, FlowState::Failed);
    assert!(sessions.read().unwrap().is_none());
    assert_eq!(recorder.topics(), vec![Topic::ServerError]);
}

#[tokio::test]
async fn login_401_clears_preexisting_session() {
    let server = MockServer::start().await;
    mount_probe(&server, envelope(json!({ "exists": true }))).await;
    Mock::given(method("POST"))
        .and(path("/account/login"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let (flow, sessions, events) = controller_for(&server);
    sessions
        .save(&authflow::session::Session {
            token: "stale-token".to_string(),
            expires_at: Utc::now() + Duration::days(1),
            remember: false,
        })
        .unwrap();
    let recorder = EventRecorder::attach(&events);
    flow.submit_identifier("known@user.test").await.unwrap();

    let err = flow
        .submit_credentials("pw", None, false, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Auth);
    // the attempt implies the previous session is no longer authoritative
    assert!(sessions.read().unwrap().is_none());
    assert_eq!(flow.state().await, FlowState::Failed);
    assert_eq!(recorder.topics(), vec![Topic::Unauthorized]);
}

#[tokio::test]
async fn short_window_applies_when_not_remembered() {
    let server = MockServer::start().await;
    mount_probe(&server, envelope(json!({ "exists": true }))).await;
    Mock::given(method("POST"))
        .and(path("/account/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!({
            "token": "tok-short",
            "expires_in": 86400
        }))))
        .mount(&server)
        .await;

    let (flow, sessions, _) = controller_for(&server);
    flow.submit_identifier("known@user.test").await.unwrap();
    flow.submit_credentials("pw", None, false, None).await.unwrap();

    let session = sessions.read().unwrap().unwrap();
    let remaining = session.expires_at - Utc::now();
    assert!(remaining <= Duration::days(1));
    assert!(remaining > Duration::hours(23));
}

// ---------------------------------------------------------------------------
// Step-up verification
// ---------------------------------------------------------------------------

#[tokio::test]
async fn missing_step_up_code_never_reaches_the_wire() {
    let server = MockServer::start().await;
    mount_probe(
        &server,
        envelope(json!({
            "exists": true,
            "user_info": { "step_up_enabled": true }
        })),
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/account/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!({}))))
        .expect(0)
        .mount(&server)
        .await;

    let (flow, _, _) = controller_for(&server);
    flow.submit_identifier("known@user.test").await.unwrap();

    let submission = flow
        .submit_credentials("correct-password", None, true, None)
        .await
        .unwrap();
    assert_eq!(submission, Submission::Settled(FlowState::StepUpPending));
    assert_eq!(flow.state().await, FlowState::StepUpPending);
}

#[tokio::test]
async fn step_up_login_with_code_authenticates() {
    let server = MockServer::start().await;
    mount_probe(
        &server,
        envelope(json!({
            "exists": true,
            "user_info": { "step_up_enabled": true }
        })),
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/account/login"))
        .and(body_partial_json(json!({
            "username": "known@user.test",
            "password": "correct-password",
            "otp_code": "123456"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!({
            "token": "tok-2",
            "expires_in": 86400
        }))))
        .expect(1)
        .mount(&server)
        .await;

    let (flow, sessions, _) = controller_for(&server);
    flow.submit_identifier("known@user.test").await.unwrap();
    flow.submit_credentials("correct-password", None, true, None)
        .await
        .unwrap();
    flow.submit_credentials("correct-password", Some("123456"), true, None)
        .await
        .unwrap();

    assert_eq!(flow.state().await, FlowState::Authenticated);
    let session = sessions.read().unwrap().unwrap();
    assert_eq!(session.token, "tok-2");
    assert!(session.remember);
}

// ---------------------------------------------------------------------------
// Registration
// ---------------------------------------------------------------------------

#[tokio::test]
async fn registration_scenario_persists_remembered_session() {
    let server = MockServer::start().await;
    mount_probe(&server, envelope(json!({ "exists": false }))).await;
    Mock::given(method("POST"))
        .and(path("/account/verifycode"))
        .and(query_param("usefor", "register"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!({
            "temp_code": "tmp-1",
            "expires_in": 1800
        }))))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/account/register"))
        .and(body_partial_json(json!({
            "username": "new",
            "useremail": "new@user.test",
            "temp_code": "tmp-1"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!({
            "token": "tok-3",
            "expires_in": 86400
        }))))
        .expect(1)
        .mount(&server)
        .await;

    let (flow, sessions, _) = controller_for(&server);
    flow.submit_identifier("new@user.test").await.unwrap();
    assert_eq!(flow.state().await, FlowState::RegisterReady);

    let verification = VerificationClient::new(Arc::new(authflow::http::ApiClient::new(
        &config_for(&server),
        sessions.clone(),
        Arc::new(ErrorEventBus::new()),
    )));
    let identifier = flow.identifier().await.unwrap();
    let ticket = verification
        .confirm_code(&identifier, "882211", CodePurpose::Register)
        .await
        .unwrap();
    assert!(ticket.is_verified());

    // username defaults to the identifier's local part
    flow.submit_registration(None, "chosen-password", &ticket)
        .await
        .unwrap();

    assert_eq!(flow.state().await, FlowState::Authenticated);
    let session = sessions.read().unwrap().unwrap();
    assert!(session.remember);
    let remaining = session.expires_at - Utc::now();
    assert!(remaining > Duration::days(29));
    assert!(remaining <= Duration::days(30));
}

#[tokio::test]
async fn unverified_ticket_is_rejected_before_any_remote_call() {
    let server = MockServer::start().await;
    mount_probe(&server, envelope(json!({ "exists": false }))).await;
    Mock::given(method("POST"))
        .and(path("/account/sendcode"))
        .and(query_param("usefor", "register"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!(null))))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/account/register"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!({}))))
        .expect(0)
        .mount(&server)
        .await;

    let (flow, sessions, _) = controller_for(&server);
    flow.submit_identifier("new@user.test").await.unwrap();

    let verification = VerificationClient::new(Arc::new(authflow::http::ApiClient::new(
        &config_for(&server),
        sessions,
        Arc::new(ErrorEventBus::new()),
    )));
    let identifier = flow.identifier().await.unwrap();
    let pending = verification
        .send_code(&identifier, CodePurpose::Register, None)
        .await
        .unwrap();

    let err = flow
        .submit_registration(None, "chosen-password", &pending)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(flow.state().await, FlowState::RegisterReady);
}

#[tokio::test]
async fn send_code_cooldown_surfaces_as_business_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/account/sendcode"))
        .and(query_param("usefor", "register"))
        .respond_with(ResponseTemplate::new(429).set_body_json(failure(
            429,
            "a code was sent recently, wait before requesting another",
        )))
        .mount(&server)
        .await;

    let (_sessions, events, api) = support::harness(&server);
    let recorder = EventRecorder::attach(&events);
    let verification = VerificationClient::new(api);
    let identifier = authflow::flow::Identifier::parse("new@user.test").unwrap();

    let err = verification
        .send_code(&identifier, CodePurpose::Register, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Business);
    assert_eq!(recorder.topics(), vec![Topic::Message]);
}

// ---------------------------------------------------------------------------
// Superseding flows
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fresh_identifier_discards_previous_flow_state() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/account/status"))
        .and(body_partial_json(json!({ "username": "first@user.test" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!({
            "exists": true,
            "user_info": { "step_up_enabled": true }
        }))))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/account/status"))
        .and(body_partial_json(json!({ "username": "second@user.test" })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(envelope(json!({ "exists": false }))),
        )
        .mount(&server)
        .await;

    let (flow, _, _) = controller_for(&server);
    flow.submit_identifier("first@user.test").await.unwrap();
    assert_eq!(
        flow.state().await,
        FlowState::LoginReady {
            step_up_required: true
        }
    );

    // switching identifiers drops the step-up flag with the old flow
    flow.submit_identifier("second@user.test").await.unwrap();
    assert_eq!(flow.state().await, FlowState::RegisterReady);
    assert_eq!(
        flow.identifier().await.unwrap().as_str(),
        "second@user.test"
    );
}

#[tokio::test]
async fn network_failure_is_published_not_swallowed() {
    // point at a closed port: the request never reaches a server
    let config = authflow::config::ClientConfig::new("http://127.0.0.1:1/api/v0");
    let sessions = Arc::new(MemorySessionStore::new());
    let events = Arc::new(ErrorEventBus::new());
    let recorder = EventRecorder::attach(&events);
    let flow = AuthFlowController::new(&config, sessions, events);

    let err = flow.submit_identifier("user@example.net").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Network);
    assert_eq!(flow.state().await, FlowState::Idle);
    assert!(matches!(
        recorder.events().as_slice(),
        [ErrorEvent::Network { .. }]
    ));
}
