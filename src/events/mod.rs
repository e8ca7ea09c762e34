//! Typed error-event channel between the orchestration core and the
//! presentation layer.
//!
//! Remote-call failures are classified once (http module) and published
//! here; presentation code subscribes per topic. The bus is passed by
//! `Arc`, never held as a global, so the core stays testable without a
//! live UI.

use std::sync::{Arc, Mutex};

/// Severity of a transient message surfaced to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Success,
    Error,
    Warn,
}

impl MessageKind {
    /// Parse the wire `type` field; anything unrecognized is an error.
    pub(crate) fn from_wire(value: Option<&str>) -> Self {
        match value {
            Some("success") => Self::Success,
            Some("warn") => Self::Warn,
            _ => Self::Error,
        }
    }
}

/// The bounded set of topics the core publishes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topic {
    Unauthorized,
    NetworkError,
    ServerError,
    Message,
}

/// A classified failure, published then discarded.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorEvent {
    /// The backend rejected the session credential. Publication of this
    /// event always coincides with a session clear.
    Unauthorized,
    /// No response reached the client.
    Network { message: String },
    /// The backend reported a fault.
    Server { status: u16, message: String },
    /// A handled domain failure with a human-readable message.
    Message { kind: MessageKind, text: String },
}

impl ErrorEvent {
    /// The single topic this event is delivered on.
    pub fn topic(&self) -> Topic {
        match self {
            Self::Unauthorized => Topic::Unauthorized,
            Self::Network { .. } => Topic::NetworkError,
            Self::Server { .. } => Topic::ServerError,
            Self::Message { .. } => Topic::Message,
        }
    }
}

type Handler = Box<dyn Fn(&ErrorEvent) + Send + Sync>;

/// Publish/subscribe channel with a bounded topic set.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use authflow::events::{ErrorEvent, ErrorEventBus, Topic};
///
/// let bus = Arc::new(ErrorEventBus::new());
/// bus.subscribe(Topic::Unauthorized, |_| println!("signed out"));
/// bus.publish(ErrorEvent::Unauthorized);
/// ```
#[derive(Default)]
pub struct ErrorEventBus {
    subscribers: Mutex<Vec<(Topic, Handler)>>,
}

impl ErrorEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for one topic.
    pub fn subscribe(&self, topic: Topic, handler: impl Fn(&ErrorEvent) + Send + Sync + 'static) {
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.push((topic, Box::new(handler)));
        }
    }

    /// Deliver an event to every handler subscribed to its topic.
    pub fn publish(&self, event: ErrorEvent) {
        let topic = event.topic();
        tracing::debug!(?topic, "publishing error event");
        if let Ok(subs) = self.subscribers.lock() {
            for (t, handler) in subs.iter() {
                if *t == topic {
                    handler(&event);
                }
            }
        }
    }
}

impl std::fmt::Debug for ErrorEventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.subscribers.lock().map(|s| s.len()).unwrap_or(0);
        f.debug_struct("ErrorEventBus")
            .field("subscribers", &count)
            .finish()
    }
}

/// Presentation capability consumed by bus subscribers.
///
/// `toast` is transient; `alert` blocks until dismissed. Implementations
/// live in the embedding application.
pub trait Notifier: Send + Sync {
    fn toast(&self, kind: MessageKind, text: &str);
    fn alert(&self, title: &str, body: &str);
}

/// Default notifier that logs through tracing.
#[derive(Debug, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn toast(&self, kind: MessageKind, text: &str) {
        tracing::info!(?kind, text, "notification");
    }

    fn alert(&self, title: &str, body: &str) {
        tracing::warn!(title, body, "blocking notification");
    }
}

/// Subscribe the standard topics to a notifier.
///
/// Transient business messages become toasts; connectivity and server
/// faults become blocking alerts; an unauthorized event becomes an
/// error toast prompting a fresh sign-in.
pub fn route_to_notifier(bus: &ErrorEventBus, notifier: Arc<dyn Notifier>) {
    let n = notifier.clone();
    bus.subscribe(Topic::Unauthorized, move |_| {
        n.toast(
            MessageKind::Error,
            "Your session is no longer valid, please sign in again",
        );
    });

    let n = notifier.clone();
    bus.subscribe(Topic::NetworkError, move |event| {
        if let ErrorEvent::Network { message } = event {
            n.alert("Connection lost", message);
        }
    });

    let n = notifier.clone();
    bus.subscribe(Topic::ServerError, move |event| {
        if let ErrorEvent::Server { message, .. } = event {
            n.alert("Server fault", message);
        }
    });

    bus.subscribe(Topic::Message, move |event| {
        if let ErrorEvent::Message { kind, text } = event {
            notifier.toast(*kind, text);
        }
    });
}
