//! The orchestrator's error taxonomy.
//!
//! Mirrors `wraith_core::node::error::NodeError`'s shape: one enum, one
//! `#[from]` conversion per collaborator, recovery semantics documented per
//! variant rather than encoded in the type.

use thiserror::Error;

/// Errors surfaced by [`crate::orchestrator::Core`].
///
/// Recovery rules: `MalformedInput`/`WrongState` write no state.
/// `StoreError` is fatal to the current operation; the transcript it would
/// have advanced is not persisted. `RelayError` on an outbound call leaves
/// state already persisted (retry is safe, idempotent on `convo_id`); on an
/// inbound call nothing changed, the relay is expected to re-deliver.
/// `HandshakeFailed` is fatal per contact, leaving it in its prior state.
/// `DecryptFailed` is fatal per conversation: the conversation is marked
/// broken and no further opens are attempted against it.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Bad hex, wrong length, or an oversized plaintext.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// The contact's current status disallows this operation.
    #[error("wrong state: {0}")]
    WrongState(String),

    /// Persistence failed.
    #[error("store error: {0}")]
    StoreError(String),

    /// The relay transport failed.
    #[error("relay error: {0}")]
    RelayError(String),

    /// The Noise handshake rejected a message.
    #[error("handshake failed: {0}")]
    HandshakeFailed(String),

    /// AEAD authentication failed; the conversation is now broken.
    #[error("decrypt failed: conversation is broken")]
    DecryptFailed,

    /// The requested contact or conversation does not exist.
    #[error("not found: {0}")]
    NotFound(String),
}

impl From<ssyk_crypto::CryptoError> for CoreError {
    fn from(err: ssyk_crypto::CryptoError) -> Self {
        use ssyk_crypto::CryptoError as E;
        match err {
            E::MalformedAddress(s) => CoreError::MalformedInput(format!("malformed address: {s}")),
            E::HandshakeFailed(s) => CoreError::HandshakeFailed(s),
            E::WrongState { expected, found } => {
                CoreError::WrongState(format!("expected {expected}, found {found}"))
            }
            E::DecryptFailed => CoreError::DecryptFailed,
            E::PlaintextTooLarge { len, max } => {
                CoreError::MalformedInput(format!("plaintext too large: {len} bytes exceeds {max}"))
            }
            E::CorruptState(s) => CoreError::StoreError(format!("corrupt serialized state: {s}")),
        }
    }
}
