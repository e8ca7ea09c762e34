//! Convenience re-exports for common use.

pub use crate::config::{ClientConfig, SessionPolicy};
pub use crate::consent::{ConsentState, OAuthConsentController, OAuthRequest};
pub use crate::error::{ErrorKind, FlowError, Result};
pub use crate::events::{ErrorEvent, ErrorEventBus, MessageKind, Notifier, Topic};
pub use crate::flow::{
    AuthFlowController, CodePurpose, FlowState, Identifier, ProbeOutcome, RegistrationTicket,
    Submission, VerificationClient,
};
pub use crate::http::ApiClient;
pub use crate::identity::{Identity, MultiIdentityDirectory};
pub use crate::profile::{ProfileClient, UserProfile};
pub use crate::session::{
    FileSessionStore, MemorySessionStore, RouteDecision, RouteGate, Session, SessionStore,
};
