//! Contact, conversation and message lifecycle orchestration.
//!
//! [`orchestrator::Core`] is the single entry point UIs drive: it owns the
//! local identity and sequences [`ssyk_crypto`] operations against two
//! pluggable collaborators, [`store::Store`] and [`relay::Relay`], behind
//! one mutex, matching the single blocking-mutex state design in
//! `wraith-chat::state::AppState`.

pub mod error;
pub mod model;
pub mod orchestrator;
pub mod relay;
pub mod store;

pub use error::CoreError;
pub use model::{Contact, ContactStatus, Conversation, Message};
pub use orchestrator::{Core, Event};
pub use relay::{AckResponse, Relay, RecvResponse, SendRequest};
pub use store::Store;

pub type Result<T> = std::result::Result<T, CoreError>;
