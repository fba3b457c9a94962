//! The sasayaki-state struct: sequences handshake, ratchet and envelope
//! operations against the `Store` and `Relay` collaborators behind one
//! mutex, the way `wraith_chat::state::AppState` wraps its `Database`
//! behind a single `Mutex` rather than per-resource locks. Every public
//! method here takes `&self`, so it is callable from any UI without extra
//! synchronization.

use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use rand_core::OsRng;
use ssyk_crypto::{
    Address, ConversationId, EnvelopeCodec, HandshakeBlob, HandshakeEngine, Identity,
    RatchetEngine, RecvState, SendState,
};
use tracing::{debug, warn};

use crate::model::{Contact, ContactStatus, Conversation, Message};
use crate::relay::{Relay, SendRequest};
use crate::store::Store;
use crate::CoreError;

fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the Unix epoch")
        .as_secs() as i64
}

/// Outcomes of [`Core::receive_next_envelope`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// No envelope was pending.
    NoPendingEnvelope,
    /// A stranger's handshake `msg1` arrived; a `WaitingToAccept` contact
    /// was created.
    ContactRequestArrived { peer_address: Address },
    /// The peer's `msg2` completed a handshake we initiated.
    ContactEstablished { peer_address: Address },
    /// An envelope arrived from a contact we still owe `msg2`; deferred.
    Stalled { peer_address: Address },
    /// A previously-unseen `convo_id` arrived and was opened successfully.
    NewConversation {
        convo_id: ConversationId,
        peer_address: Address,
        title: String,
    },
    /// A message on a known conversation was opened successfully.
    NewMessage {
        convo_id: ConversationId,
        peer_address: Address,
        content: Vec<u8>,
    },
    /// Decryption failed; the conversation is now permanently broken.
    ConversationBroken {
        convo_id: ConversationId,
        peer_address: Address,
    },
}

struct CoreState<S, R> {
    store: S,
    relay: R,
}

/// The orchestrator: owns the local identity and the two pluggable
/// collaborators, and exposes the seven lifecycle operations.
pub struct Core<S: Store, R: Relay> {
    identity: Identity,
    state: Mutex<CoreState<S, R>>,
}

impl<S: Store, R: Relay> Core<S, R> {
    pub fn new(identity: Identity, store: S, relay: R) -> Self {
        Self {
            identity,
            state: Mutex::new(CoreState { store, relay }),
        }
    }

    /// Our own stable address.
    pub fn address(&self) -> Address {
        self.identity.address()
    }

    /// Initiator path, step 1.
    pub fn add_contact(&self, peer_address_hex: &str, peer_name: &str) -> crate::Result<()> {
        let peer_address = Address::from_hex(peer_address_hex)?;
        let mut guard = self.state.lock().expect("core mutex poisoned");

        if guard.store.get_contact(&peer_address)?.is_some() {
            return Err(CoreError::WrongState(format!(
                "contact {peer_address} already exists"
            )));
        }

        let (msg1, blob) =
            HandshakeEngine::initiate(&mut OsRng, &self.identity, peer_address.as_bytes());

        let contact = Contact {
            address: peer_address,
            name: peer_name.to_string(),
            status: ContactStatus::WaitingForAccept,
            handshake_blob: Some(blob.serialize()),
            root_send: None,
            root_recv: None,
            created_at: now(),
        };
        guard.store.insert_contact(&contact)?;

        let convo_id = ConversationId::generate(&mut OsRng);
        let request = SendRequest {
            to_address: peer_address.to_hex(),
            convo_id: convo_id.to_hex(),
            content: hex::encode(&msg1).into_bytes(),
        };
        guard.relay.send(&request)?;
        debug!(peer = %peer_address, "sent contact request");
        Ok(())
    }

    /// Responder path, step 1. Normally triggered internally by
    /// [`Core::receive_next_envelope`]; exposed directly for callers that
    /// already have `msg1` out of band.
    pub fn receive_contact_request(
        &self,
        peer_address_hex: &str,
        peer_name: &str,
        msg1: &[u8],
    ) -> crate::Result<()> {
        let peer_address = Address::from_hex(peer_address_hex)?;
        let mut guard = self.state.lock().expect("core mutex poisoned");

        if guard.store.get_contact(&peer_address)?.is_some() {
            return Err(CoreError::WrongState(format!(
                "contact {peer_address} already exists"
            )));
        }

        let contact = Contact {
            address: peer_address,
            name: peer_name.to_string(),
            status: ContactStatus::WaitingToAccept,
            handshake_blob: Some(msg1.to_vec()),
            root_send: None,
            root_recv: None,
            created_at: now(),
        };
        guard.store.insert_contact(&contact)?;
        Ok(())
    }

    /// Responder path, step 2.
    pub fn accept_contact(&self, peer_address_hex: &str) -> crate::Result<()> {
        let peer_address = Address::from_hex(peer_address_hex)?;
        let mut guard = self.state.lock().expect("core mutex poisoned");

        let mut contact = guard
            .store
            .get_contact(&peer_address)?
            .ok_or_else(|| CoreError::NotFound(format!("no contact {peer_address}")))?;
        if !matches!(contact.status, ContactStatus::WaitingToAccept) {
            return Err(CoreError::WrongState(
                "contact is not awaiting accept".into(),
            ));
        }

        let msg1 = contact
            .handshake_blob
            .clone()
            .expect("WaitingToAccept contact always carries msg1");
        let (msg2, root_send, root_recv) =
            HandshakeEngine::respond(&mut OsRng, &self.identity, peer_address.as_bytes(), &msg1)?;

        contact.status = ContactStatus::Added;
        contact.handshake_blob = None;
        contact.root_send = Some(root_send.serialize());
        contact.root_recv = Some(root_recv.serialize());
        debug_assert!(contact.is_consistent());
        guard.store.update_contact(&contact)?;

        let convo_id = ConversationId::generate(&mut OsRng);
        let request = SendRequest {
            to_address: peer_address.to_hex(),
            convo_id: convo_id.to_hex(),
            content: hex::encode(&msg2).into_bytes(),
        };
        guard.relay.send(&request)?;
        debug!(peer = %peer_address, "accepted contact");
        Ok(())
    }

    /// Initiator path, step 2. Normally triggered internally by
    /// [`Core::receive_next_envelope`].
    pub fn finish_handshake(&self, peer_address_hex: &str, msg2: &[u8]) -> crate::Result<()> {
        let peer_address = Address::from_hex(peer_address_hex)?;
        let mut guard = self.state.lock().expect("core mutex poisoned");
        Self::finish_handshake_locked(&self.identity, &mut guard, peer_address, msg2)
    }

    fn finish_handshake_locked(
        identity: &Identity,
        guard: &mut CoreState<S, R>,
        peer_address: Address,
        msg2: &[u8],
    ) -> crate::Result<()> {
        let mut contact = guard
            .store
            .get_contact(&peer_address)?
            .ok_or_else(|| CoreError::NotFound(format!("no contact {peer_address}")))?;
        if !matches!(contact.status, ContactStatus::WaitingForAccept) {
            return Err(CoreError::WrongState(
                "contact is not awaiting finish".into(),
            ));
        }

        let blob_bytes = contact
            .handshake_blob
            .clone()
            .expect("WaitingForAccept contact always carries a handshake blob");
        let blob = HandshakeBlob::recover(&blob_bytes)?;
        let (root_send, root_recv) =
            HandshakeEngine::finalize(identity, peer_address.as_bytes(), blob, msg2)?;

        contact.status = ContactStatus::Added;
        contact.handshake_blob = None;
        contact.root_send = Some(root_send.serialize());
        contact.root_recv = Some(root_recv.serialize());
        debug_assert!(contact.is_consistent());
        guard.store.update_contact(&contact)?;
        Ok(())
    }

    /// Send a message, optionally starting a new conversation.
    ///
    /// Returns the `convo_id` the message was sent under (freshly generated
    /// when `convo_id` is `None`).
    pub fn send_message(
        &self,
        convo_id: Option<ConversationId>,
        peer_address_hex: &str,
        content: &[u8],
    ) -> crate::Result<ConversationId> {
        let peer_address = Address::from_hex(peer_address_hex)?;
        let mut guard = self.state.lock().expect("core mutex poisoned");

        let mut contact = guard
            .store
            .get_contact(&peer_address)?
            .ok_or_else(|| CoreError::NotFound(format!("no contact {peer_address}")))?;
        if !matches!(contact.status, ContactStatus::Added) {
            return Err(CoreError::WrongState("contact is not yet added".into()));
        }

        let (convo_id, send_state) = match convo_id {
            None => {
                let root_send = contact
                    .root_send
                    .clone()
                    .expect("Added contact always has root_send");
                let (new_root, conv_init, conv_resp) =
                    RatchetEngine::derive_conversation(&root_send)?;
                contact.root_send = Some(new_root);
                guard.store.update_contact(&contact)?;

                let convo_id = ConversationId::generate(&mut OsRng);
                let conversation = Conversation {
                    convo_id,
                    peer_address,
                    title: String::from_utf8_lossy(content).into_owned(),
                    created_at: now(),
                    last_message_at: now(),
                    send_state: conv_init.serialize(),
                    recv_state: conv_resp.serialize(),
                    broken: false,
                };
                guard.store.insert_conversation(&conversation)?;
                (convo_id, SendState::new(conv_init))
            }
            Some(id) => {
                let conversation = guard
                    .store
                    .get_conversation(&id, &peer_address)?
                    .ok_or_else(|| CoreError::NotFound(format!("no conversation {id}")))?;
                if conversation.broken {
                    return Err(CoreError::DecryptFailed);
                }
                (id, SendState::from_bytes(conversation.send_state))
            }
        };

        let (ciphertext, new_send_state) = EnvelopeCodec::seal(
            send_state,
            &convo_id,
            &self.identity.address(),
            &peer_address,
            content,
        )?;

        // Persist the advanced send_state and the new Message before
        // handing the envelope to the Relay: a crash after send but before
        // persist would leave the peer able to decrypt a reply we could
        // never decrypt back.
        let mut conversation = guard
            .store
            .get_conversation(&convo_id, &peer_address)?
            .ok_or_else(|| CoreError::NotFound(format!("no conversation {convo_id}")))?;
        conversation.send_state = new_send_state.as_bytes().to_vec();
        conversation.last_message_at = now();
        guard.store.update_conversation(&conversation)?;

        let message = Message {
            id: 0,
            convo_id,
            peer_address,
            timestamp: now(),
            sender_is_me: true,
            content: content.to_vec(),
        };
        guard.store.append_message(&message)?;

        let request = SendRequest {
            to_address: peer_address.to_hex(),
            convo_id: convo_id.to_hex(),
            content: ciphertext,
        };
        guard.relay.send(&request)?;

        Ok(convo_id)
    }

    /// Pull one envelope from the Relay and dispatch it by the sender's
    /// contact status.
    pub fn receive_next_envelope(&self) -> crate::Result<Event> {
        let mut guard = self.state.lock().expect("core mutex poisoned");

        let envelope = match guard.relay.recv()? {
            Some(envelope) => envelope,
            None => return Ok(Event::NoPendingEnvelope),
        };
        let peer_address = Address::from_hex(&envelope.from_address)?;
        let existing_contact = guard.store.get_contact(&peer_address)?;

        match existing_contact {
            None => {
                let msg1 = hex::decode(&envelope.content).map_err(|_| {
                    CoreError::MalformedInput("handshake content is not valid hex".into())
                })?;
                let contact = Contact {
                    address: peer_address,
                    name: String::new(),
                    status: ContactStatus::WaitingToAccept,
                    handshake_blob: Some(msg1),
                    root_send: None,
                    root_recv: None,
                    created_at: now(),
                };
                guard.store.insert_contact(&contact)?;
                Ok(Event::ContactRequestArrived { peer_address })
            }
            Some(contact) if matches!(contact.status, ContactStatus::WaitingForAccept) => {
                let decoded = hex::decode(&envelope.content).map_err(|_| {
                    CoreError::MalformedInput("handshake content is not valid hex".into())
                })?;

                // msg1 is 96 bytes, msg2 is 48. A 96-byte payload arriving
                // while we're WaitingForAccept means the peer independently
                // called addContact toward us at the same time we called
                // it toward them -- not a continuation of our own
                // handshake. Resolve the collision deterministically: the
                // lexicographically lower address becomes the responder.
                if decoded.len() != 48 {
                    if self.identity.address() < peer_address {
                        guard.store.delete_contact(&peer_address)?;
                        let new_contact = Contact {
                            address: peer_address,
                            name: contact.name,
                            status: ContactStatus::WaitingToAccept,
                            handshake_blob: Some(decoded),
                            root_send: None,
                            root_recv: None,
                            created_at: now(),
                        };
                        guard.store.insert_contact(&new_contact)?;
                        return Ok(Event::ContactRequestArrived { peer_address });
                    }
                    warn!(peer = %peer_address, "addContact collision, deferring as higher address");
                    return Ok(Event::Stalled { peer_address });
                }

                Self::finish_handshake_locked(&self.identity, &mut guard, peer_address, &decoded)?;
                Ok(Event::ContactEstablished { peer_address })
            }
            Some(contact) if matches!(contact.status, ContactStatus::WaitingToAccept) => {
                Ok(Event::Stalled { peer_address })
            }
            Some(mut contact) => {
                let convo_id = ConversationId::from_hex(&envelope.convo_id)?;
                let existing_conversation = guard.store.get_conversation(&convo_id, &peer_address)?;

                match existing_conversation {
                    None => {
                        let root_recv = contact
                            .root_recv
                            .clone()
                            .expect("Added contact always has root_recv");
                        let (new_root, conv_init, conv_resp) =
                            RatchetEngine::derive_conversation(&root_recv)?;
                        contact.root_recv = Some(new_root);
                        guard.store.update_contact(&contact)?;

                        // We are the responder for this conversation: we
                        // receive with conv_init, send with conv_resp.
                        let (plaintext, new_recv_state) = EnvelopeCodec::open(
                            RecvState::new(conv_init),
                            &convo_id,
                            &peer_address,
                            &self.identity.address(),
                            &envelope.content,
                        )?;

                        let title = String::from_utf8_lossy(&plaintext).into_owned();
                        let conversation = Conversation {
                            convo_id,
                            peer_address,
                            title: title.clone(),
                            created_at: now(),
                            last_message_at: now(),
                            send_state: conv_resp.serialize(),
                            recv_state: new_recv_state.as_bytes().to_vec(),
                            broken: false,
                        };
                        guard.store.insert_conversation(&conversation)?;
                        Ok(Event::NewConversation {
                            convo_id,
                            peer_address,
                            title,
                        })
                    }
                    Some(mut conversation) => {
                        if conversation.broken {
                            return Ok(Event::ConversationBroken {
                                convo_id,
                                peer_address,
                            });
                        }
                        let recv_state = RecvState::from_bytes(conversation.recv_state.clone());
                        match EnvelopeCodec::open(
                            recv_state,
                            &convo_id,
                            &peer_address,
                            &self.identity.address(),
                            &envelope.content,
                        ) {
                            Ok((plaintext, new_recv_state)) => {
                                conversation.recv_state = new_recv_state.as_bytes().to_vec();
                                conversation.last_message_at = now();
                                guard.store.update_conversation(&conversation)?;

                                let message = Message {
                                    id: 0,
                                    convo_id,
                                    peer_address,
                                    timestamp: now(),
                                    sender_is_me: false,
                                    content: plaintext.clone(),
                                };
                                guard.store.append_message(&message)?;
                                Ok(Event::NewMessage {
                                    convo_id,
                                    peer_address,
                                    content: plaintext,
                                })
                            }
                            Err(_) => {
                                conversation.broken = true;
                                guard.store.update_conversation(&conversation)?;
                                warn!(%convo_id, peer = %peer_address, "conversation marked broken after decrypt failure");
                                Ok(Event::ConversationBroken {
                                    convo_id,
                                    peer_address,
                                })
                            }
                        }
                    }
                }
            }
        }
    }

    /// Remove a contact, cascade-removing its conversations and messages.
    pub fn delete_contact(&self, peer_address_hex: &str) -> crate::Result<()> {
        let peer_address = Address::from_hex(peer_address_hex)?;
        let mut guard = self.state.lock().expect("core mutex poisoned");
        guard.store.delete_contact(&peer_address)?;
        Ok(())
    }
}
