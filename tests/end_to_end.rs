//! Wires a real `SqliteStore` and an `ssyk_core::Relay` double through
//! `Core` for full multi-crate conversation scenarios that no single
//! crate's unit tests can exercise on their own.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use rand_core::OsRng;
use ssyk_core::{AckResponse, Core, CoreError, Event, RecvResponse, Relay, SendRequest};
use ssyk_crypto::Identity;
use ssyk_relay::InMemoryRelay;
use ssyk_store::SqliteStore;

/// A relay double that hands the test full control over delivery: every
/// sent envelope is captured in `sent` rather than auto-delivered, so a
/// test can replay them to the peer in whatever order or shape it wants.
#[derive(Clone, Default)]
struct ScriptedRelay {
    sent: Arc<Mutex<Vec<SendRequest>>>,
    inbox: Arc<Mutex<VecDeque<RecvResponse>>>,
}

impl ScriptedRelay {
    fn deliver(&self, from_address: &str, request: &SendRequest) {
        self.inbox.lock().unwrap().push_back(RecvResponse {
            from_address: from_address.to_string(),
            convo_id: request.convo_id.clone(),
            content: request.content.clone(),
        });
    }
}

impl Relay for ScriptedRelay {
    fn send(&mut self, request: &SendRequest) -> Result<AckResponse, CoreError> {
        self.sent.lock().unwrap().push(request.clone());
        Ok(AckResponse {
            success: true,
            error: String::new(),
        })
    }

    fn recv(&mut self) -> Result<Option<RecvResponse>, CoreError> {
        Ok(self.inbox.lock().unwrap().pop_front())
    }
}

/// Drives a full handshake, then two independently-ratcheted conversations
/// in each direction, checking each conversation's messages stay isolated.
#[test]
fn handshake_and_two_independent_conversations() {
    let alice_identity = Identity::generate(&mut OsRng);
    let bob_identity = Identity::generate(&mut OsRng);
    let alice_address = alice_identity.address();
    let bob_address = bob_identity.address();

    let (alice_relay, bob_relay) =
        InMemoryRelay::paired(alice_address.to_hex(), bob_address.to_hex());
    let alice = Core::new(alice_identity, SqliteStore::in_memory().unwrap(), alice_relay);
    let bob = Core::new(bob_identity, SqliteStore::in_memory().unwrap(), bob_relay);

    alice.add_contact(&bob_address.to_hex(), "bob").unwrap();
    assert!(matches!(
        bob.receive_next_envelope().unwrap(),
        Event::ContactRequestArrived { .. }
    ));
    bob.accept_contact(&alice_address.to_hex()).unwrap();
    assert!(matches!(
        alice.receive_next_envelope().unwrap(),
        Event::ContactEstablished { .. }
    ));

    let work_convo = alice
        .send_message(None, &bob_address.to_hex(), b"Work")
        .unwrap();
    let personal_convo = alice
        .send_message(None, &bob_address.to_hex(), b"Personal")
        .unwrap();
    assert_ne!(work_convo, personal_convo);

    let mut titles = Vec::new();
    for _ in 0..2 {
        match bob.receive_next_envelope().unwrap() {
            Event::NewConversation { title, .. } => titles.push(title),
            other => panic!("unexpected event: {other:?}"),
        }
    }
    titles.sort();
    assert_eq!(titles, vec!["Personal".to_string(), "Work".to_string()]);

    alice
        .send_message(Some(work_convo), &bob_address.to_hex(), b"ship it")
        .unwrap();
    alice
        .send_message(Some(personal_convo), &bob_address.to_hex(), b"dinner tonight?")
        .unwrap();

    let mut by_convo = std::collections::HashMap::new();
    for _ in 0..2 {
        match bob.receive_next_envelope().unwrap() {
            Event::NewMessage {
                convo_id, content, ..
            } => {
                by_convo.insert(convo_id, content);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
    assert_eq!(by_convo[&work_convo], b"ship it");
    assert_eq!(by_convo[&personal_convo], b"dinner tonight?");
}

/// Messages must be opened in the order they were sealed; delivering a
/// later message before an earlier one desynchronizes the duplex ratchet
/// and the conversation is marked broken rather than silently corrupted.
#[test]
fn out_of_order_delivery_breaks_the_conversation() {
    let alice_identity = Identity::generate(&mut OsRng);
    let bob_identity = Identity::generate(&mut OsRng);
    let alice_address = alice_identity.address();
    let bob_address = bob_identity.address();

    let alice_relay = ScriptedRelay::default();
    let bob_relay = ScriptedRelay::default();
    let alice = Core::new(
        alice_identity,
        SqliteStore::in_memory().unwrap(),
        alice_relay.clone(),
    );
    let bob = Core::new(
        bob_identity,
        SqliteStore::in_memory().unwrap(),
        bob_relay.clone(),
    );

    alice.add_contact(&bob_address.to_hex(), "bob").unwrap();
    bob_relay.deliver(
        &alice_address.to_hex(),
        alice_relay.sent.lock().unwrap().last().unwrap(),
    );
    bob.receive_next_envelope().unwrap();

    bob.accept_contact(&alice_address.to_hex()).unwrap();
    alice_relay.deliver(
        &bob_address.to_hex(),
        bob_relay.sent.lock().unwrap().last().unwrap(),
    );
    alice.receive_next_envelope().unwrap();

    let convo_id = alice
        .send_message(None, &bob_address.to_hex(), b"hello")
        .unwrap();
    bob_relay.deliver(
        &alice_address.to_hex(),
        alice_relay.sent.lock().unwrap().last().unwrap(),
    );
    bob.receive_next_envelope().unwrap();

    alice
        .send_message(Some(convo_id), &bob_address.to_hex(), b"first")
        .unwrap();
    alice
        .send_message(Some(convo_id), &bob_address.to_hex(), b"second")
        .unwrap();

    let sent = alice_relay.sent.lock().unwrap();
    let first = sent[sent.len() - 2].clone();
    let second = sent[sent.len() - 1].clone();
    drop(sent);

    // Deliver to Bob in reverse order.
    bob_relay.deliver(&alice_address.to_hex(), &second);
    bob_relay.deliver(&alice_address.to_hex(), &first);

    match bob.receive_next_envelope().unwrap() {
        Event::ConversationBroken { convo_id: got, .. } => assert_eq!(got, convo_id),
        other => panic!("expected the ratchet desync to break the conversation, got {other:?}"),
    }
}

/// A ciphertext sealed for one `convo_id` cannot be opened under a
/// different one: the codec binds the sender, receiver and `convo_id` into
/// its associated data.
#[test]
fn tampering_with_associated_data_is_rejected() {
    let alice_identity = Identity::generate(&mut OsRng);
    let bob_identity = Identity::generate(&mut OsRng);
    let alice_address = alice_identity.address();
    let bob_address = bob_identity.address();

    let alice_relay = ScriptedRelay::default();
    let bob_relay = ScriptedRelay::default();
    let alice = Core::new(
        alice_identity,
        SqliteStore::in_memory().unwrap(),
        alice_relay.clone(),
    );
    let bob = Core::new(
        bob_identity,
        SqliteStore::in_memory().unwrap(),
        bob_relay.clone(),
    );

    alice.add_contact(&bob_address.to_hex(), "bob").unwrap();
    bob_relay.deliver(
        &alice_address.to_hex(),
        alice_relay.sent.lock().unwrap().last().unwrap(),
    );
    bob.receive_next_envelope().unwrap();

    bob.accept_contact(&alice_address.to_hex()).unwrap();
    alice_relay.deliver(
        &bob_address.to_hex(),
        bob_relay.sent.lock().unwrap().last().unwrap(),
    );
    alice.receive_next_envelope().unwrap();

    let convo_id = alice
        .send_message(None, &bob_address.to_hex(), b"hello")
        .unwrap();
    bob_relay.deliver(
        &alice_address.to_hex(),
        alice_relay.sent.lock().unwrap().last().unwrap(),
    );
    bob.receive_next_envelope().unwrap();

    alice
        .send_message(Some(convo_id), &bob_address.to_hex(), b"trust me")
        .unwrap();
    let mut tampered = alice_relay.sent.lock().unwrap().last().unwrap().clone();
    tampered.convo_id = ssyk_crypto::ConversationId::generate(&mut OsRng).to_hex();
    bob_relay.deliver(&alice_address.to_hex(), &tampered);

    // The tampered convo_id sends this down the "new conversation" path
    // with both a fresh ratchet fork and the wrong associated data, so
    // authentication fails outright.
    let result = bob.receive_next_envelope();
    assert!(matches!(result, Err(CoreError::DecryptFailed)));

    // The real conversation's state was never touched by the tampered
    // envelope; sending on it still works.
    let send_result = bob.send_message(Some(convo_id), &alice_address.to_hex(), b"still fine");
    assert!(send_result.is_ok());
}
