//! Authenticated envelope sealing/opening.
//!
//! Binds ciphertext to the conversation and both participants via an
//! 80-byte associated-data tuple, and enforces the orientation discipline
//! (`SendState` only ever goes to `seal`, `RecvState` only ever to `open`)
//! with distinct newtypes rather than a single direction-agnostic blob.

use crate::{Address, ConversationId, CryptoError, DuplexState, DuplexTranscript};

/// Largest plaintext a Relay round-trip can carry, after framing and
/// envelope overhead.
pub const MAX_PLAINTEXT_LEN: usize = 65535 - 1000;

/// A serialized per-conversation transcript oriented for sealing only.
pub struct SendState(Vec<u8>);

impl SendState {
    /// Wrap a freshly derived or recovered transcript for outbound use.
    pub fn new(transcript: DuplexState) -> Self {
        Self(transcript.serialize())
    }

    /// Serialized bytes, for persistence.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Wrap previously persisted bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

/// A serialized per-conversation transcript oriented for opening only.
pub struct RecvState(Vec<u8>);

impl RecvState {
    /// Wrap a freshly derived or recovered transcript for inbound use.
    pub fn new(transcript: DuplexState) -> Self {
        Self(transcript.serialize())
    }

    /// Serialized bytes, for persistence.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Wrap previously persisted bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

fn associated_data(convo_id: &ConversationId, sender: &Address, receiver: &Address) -> [u8; 80] {
    let mut ad = [0u8; 80];
    ad[0..16].copy_from_slice(convo_id.as_bytes());
    ad[16..48].copy_from_slice(sender.as_bytes());
    ad[48..80].copy_from_slice(receiver.as_bytes());
    ad
}

/// Seals/opens individual messages against a conversation's directional
/// transcripts.
pub struct EnvelopeCodec;

impl EnvelopeCodec {
    /// Seal `plaintext` for `convo_id` travelling from `sender` to
    /// `receiver`, advancing and returning the new `send_state`.
    pub fn seal(
        send_state: SendState,
        convo_id: &ConversationId,
        sender: &Address,
        receiver: &Address,
        plaintext: &[u8],
    ) -> crate::Result<(Vec<u8>, SendState)> {
        if plaintext.len() > MAX_PLAINTEXT_LEN {
            return Err(CryptoError::PlaintextTooLarge {
                len: plaintext.len(),
                max: MAX_PLAINTEXT_LEN,
            });
        }
        let mut transcript = DuplexState::recover(send_state.as_bytes())?;
        let ad = associated_data(convo_id, sender, receiver);
        let ciphertext = transcript.seal_aead(plaintext, &ad);
        Ok((ciphertext, SendState::new(transcript)))
    }

    /// Open `ciphertext` for `convo_id` travelling from `sender` to
    /// `receiver`. On failure the caller must not persist `recv_state`;
    /// the conversation is fatally broken (see the error-handling design).
    pub fn open(
        recv_state: RecvState,
        convo_id: &ConversationId,
        sender: &Address,
        receiver: &Address,
        ciphertext: &[u8],
    ) -> crate::Result<(Vec<u8>, RecvState)> {
        let mut transcript = DuplexState::recover(recv_state.as_bytes())?;
        let ad = associated_data(convo_id, sender, receiver);
        let plaintext = transcript
            .open_aead(ciphertext, &ad)
            .ok_or(CryptoError::DecryptFailed)?;
        Ok((plaintext, RecvState::new(transcript)))
    }
}
