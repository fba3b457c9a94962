//! Persistent entities: contacts, conversations, messages.

use ssyk_crypto::{Address, ConversationId};

/// A contact's position in the handshake lifecycle.
///
/// Encoded on the wire as `{WaitingForAccept=0, WaitingToAccept=1, Added=2}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactStatus {
    /// We called `addContact`; waiting for the peer's `msg2`.
    WaitingForAccept = 0,
    /// The peer sent us `msg1`; waiting for us to `acceptContact`.
    WaitingToAccept = 1,
    /// Handshake complete; both root transcripts are live.
    Added = 2,
}

/// The per-peer root: identity, handshake progress, and (once `Added`) the
/// two root transcripts conversations fork from.
///
/// Invariant: `status == Added` iff `handshake_blob` is absent and both
/// roots are present.
#[derive(Debug, Clone)]
pub struct Contact {
    pub address: Address,
    pub name: String,
    pub status: ContactStatus,
    pub handshake_blob: Option<Vec<u8>>,
    pub root_send: Option<Vec<u8>>,
    pub root_recv: Option<Vec<u8>>,
    pub created_at: i64,
}

impl Contact {
    pub fn is_consistent(&self) -> bool {
        match self.status {
            ContactStatus::Added => {
                self.handshake_blob.is_none()
                    && self.root_send.is_some()
                    && self.root_recv.is_some()
            }
            ContactStatus::WaitingForAccept | ContactStatus::WaitingToAccept => {
                self.root_send.is_none() && self.root_recv.is_none()
            }
        }
    }
}

/// A named thread of messages with one contact.
///
/// A conversation exists only while its parent contact is `Added`; it is
/// never deleted except by the contact's cascade. `broken` is set once an
/// open against `recv_state` fails authentication -- per the error-handling
/// design, a decrypt failure is fatal per conversation, so the conversation
/// is retired rather than retried.
#[derive(Debug, Clone)]
pub struct Conversation {
    pub convo_id: ConversationId,
    pub peer_address: Address,
    pub title: String,
    pub created_at: i64,
    pub last_message_at: i64,
    pub send_state: Vec<u8>,
    pub recv_state: Vec<u8>,
    pub broken: bool,
}

/// A single message within a conversation. Append-only, never mutated.
#[derive(Debug, Clone)]
pub struct Message {
    pub id: i64,
    pub convo_id: ConversationId,
    pub peer_address: Address,
    pub timestamp: i64,
    pub sender_is_me: bool,
    pub content: Vec<u8>,
}
