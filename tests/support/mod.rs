#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use serde_json::{json, Value};
use wiremock::MockServer;

use authflow::config::ClientConfig;
use authflow::events::{ErrorEvent, ErrorEventBus, Topic};
use authflow::http::ApiClient;
use authflow::session::MemorySessionStore;

/// Config pointed at a mock backend.
pub fn config_for(server: &MockServer) -> ClientConfig {
    ClientConfig::new(server.uri())
}

/// Store + bus + api client wired against a mock backend.
pub fn harness(
    server: &MockServer,
) -> (Arc<MemorySessionStore>, Arc<ErrorEventBus>, Arc<ApiClient>) {
    let sessions = Arc::new(MemorySessionStore::new());
    let events = Arc::new(ErrorEventBus::new());
    let api = Arc::new(ApiClient::new(
        &config_for(server),
        sessions.clone(),
        events.clone(),
    ));
    (sessions, events, api)
}

/// A successful response envelope.
pub fn envelope(data: Value) -> Value {
    json!({ "status": 200, "msg": "success", "data": data })
}

/// A failed response envelope with an application status.
pub fn failure(status: u16, msg: &str) -> Value {
    json!({ "status": status, "msg": msg })
}

/// Captures every published event for later assertions.
pub struct EventRecorder {
    seen: Arc<Mutex<Vec<ErrorEvent>>>,
}

impl EventRecorder {
    pub fn attach(bus: &ErrorEventBus) -> Self {
        let seen = Arc::new(Mutex::new(Vec::new()));
        for topic in [
            Topic::Unauthorized,
            Topic::NetworkError,
            Topic::ServerError,
            Topic::Message,
        ] {
            let sink = seen.clone();
            bus.subscribe(topic, move |event| {
                sink.lock().expect("recorder lock poisoned").push(event.clone());
            });
        }
        Self { seen }
    }

    pub fn events(&self) -> Vec<ErrorEvent> {
        self.seen.lock().expect("recorder lock poisoned").clone()
    }

    pub fn topics(&self) -> Vec<Topic> {
        self.events().iter().map(ErrorEvent::topic).collect()
    }
}
