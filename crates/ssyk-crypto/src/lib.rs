//! Cryptographic state machine for Sasayaki.
//!
//! Binds together the Noise-IK handshake ([`handshake`]), the two-level
//! ratchet that spawns per-conversation key material from per-peer root
//! state ([`ratchet`]), and the authenticated-envelope construction that
//! seals/opens individual messages ([`envelope`]). The symmetric duplex
//! primitive consumed by all three is defined as the [`transcript::DuplexTranscript`]
//! trait, with [`transcript::DuplexState`] as the concrete, swappable
//! implementation.

pub mod address;
pub mod envelope;
pub mod handshake;
pub mod identity;
pub mod ratchet;
pub mod transcript;

pub use address::{Address, ConversationId};
pub use envelope::{EnvelopeCodec, RecvState, SendState};
pub use handshake::{HandshakeBlob, HandshakeEngine};
pub use identity::Identity;
pub use ratchet::RatchetEngine;
pub use transcript::{DuplexState, DuplexTranscript};

use thiserror::Error;

/// Errors surfaced by the cryptographic core.
///
/// Mirrors the recovery rules in the error-handling design: malformed input
/// and wrong-state errors write no state; `HandshakeFailed` is fatal per
/// contact; `DecryptFailed` is fatal per conversation.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// A hex-encoded address did not decode to exactly 32 bytes.
    #[error("malformed address: {0}")]
    MalformedAddress(String),

    /// The Noise handshake rejected a message (bad static key, bad MAC).
    #[error("handshake failed: {0}")]
    HandshakeFailed(String),

    /// The operation was attempted from a handshake phase that disallows it.
    #[error("wrong handshake state: expected {expected}, found {found}")]
    WrongState {
        /// The phase the operation required.
        expected: &'static str,
        /// The phase the handshake was actually in.
        found: &'static str,
    },

    /// AEAD authentication failed on open; the transcript must be discarded.
    #[error("decrypt failed: authentication tag mismatch")]
    DecryptFailed,

    /// Plaintext exceeded the 65535 - 1000 byte bound.
    #[error("plaintext too large: {len} bytes exceeds the {max} byte bound")]
    PlaintextTooLarge {
        /// The plaintext length that was rejected.
        len: usize,
        /// The maximum allowed length.
        max: usize,
    },

    /// A serialized transcript or handshake blob failed to deserialize.
    #[error("corrupt serialized state: {0}")]
    CorruptState(String),
}

pub type Result<T> = std::result::Result<T, CryptoError>;
