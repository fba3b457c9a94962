//! Spawns per-conversation transcripts from a peer's root transcript.
//!
//! Per-message key material is just `DuplexState::seal_aead`/`open_aead` on
//! the conversation transcript [`crate::envelope`] already drives directly;
//! the only distinct operation here is forking a root into a conversation.

use crate::transcript::DuplexState;
use crate::DuplexTranscript;

/// Forks a peer's root transcript into per-conversation send/receive
/// transcripts.
pub struct RatchetEngine;

impl RatchetEngine {
    /// `derive_conversation(root) -> (new_root, t_init, t_resp)`.
    ///
    /// Both sides of a conversation must produce identical `t_init`/`t_resp`
    /// from identical root bytes; the caller orients them into
    /// `(send_state, recv_state)` depending on who initiated the
    /// conversation. `new_root` replaces the stored root so the same root
    /// is never forked twice.
    pub fn derive_conversation(root: &[u8]) -> crate::Result<(Vec<u8>, DuplexState, DuplexState)> {
        let t = DuplexState::recover(root)?;

        let mut t_init = t.clone();
        t_init.ad(true, b"initiator");
        t_init.ratchet(32);

        let mut t_resp = t.clone();
        t_resp.ad(true, b"responder");
        t_resp.ratchet(32);

        let mut new_root = t;
        new_root.ratchet(32);

        Ok((new_root.serialize(), t_init, t_resp))
    }
}
