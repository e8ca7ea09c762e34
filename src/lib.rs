//! Authflow — client-side authentication and session orchestration.
//!
//! Drives the multi-step account flow a client performs around a remote
//! identity backend: probe an identifier, branch into password login
//! (with optional step-up verification) or email-verified registration,
//! resolve OAuth consent requests for third-party clients, and keep one
//! persisted session that is invalidated the moment the backend stops
//! honoring it.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use authflow::prelude::*;
//!
//! # async fn example() -> authflow::error::Result<()> {
//! let config = ClientConfig::from_env();
//! let sessions = Arc::new(MemorySessionStore::new());
//! let events = Arc::new(ErrorEventBus::new());
//!
//! let flow = AuthFlowController::new(&config, sessions, events);
//! flow.submit_identifier("user@example.net").await?;
//! if let FlowState::LoginReady { .. } = flow.state().await {
//!     flow.submit_credentials("secret", None, true, None).await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod consent;
pub mod error;
pub mod events;
pub mod flow;
pub mod http;
pub mod identity;
pub mod prelude;
pub mod profile;
pub mod session;
