//! A `Core` built on a file-backed `SqliteStore` must survive a process
//! restart: reopening the store and reconstructing `Core` from the saved
//! identity bytes picks up exactly where the previous process left off.

use rand_core::OsRng;
use ssyk_core::{Core, Event};
use ssyk_crypto::Identity;
use ssyk_relay::InMemoryRelay;
use ssyk_store::SqliteStore;

#[test]
fn conversation_state_survives_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let alice_db = dir.path().join("alice.db");

    let alice_identity = Identity::generate(&mut OsRng);
    let bob_identity = Identity::generate(&mut OsRng);
    let alice_private = *alice_identity.private_bytes();
    let alice_address = alice_identity.address();
    let bob_address = bob_identity.address();

    let (alice_relay, bob_relay) =
        InMemoryRelay::paired(alice_address.to_hex(), bob_address.to_hex());
    let bob = Core::new(bob_identity, SqliteStore::in_memory().unwrap(), bob_relay);

    let convo_id = {
        let alice = Core::new(
            alice_identity,
            SqliteStore::open(&alice_db).unwrap(),
            alice_relay,
        );
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

        let convo_id = alice
            .send_message(None, &bob_address.to_hex(), b"General")
            .unwrap();
        assert!(matches!(
            bob.receive_next_envelope().unwrap(),
            Event::NewConversation { .. }
        ));
        convo_id
        // `alice` (and its SqliteStore connection) is dropped here,
        // simulating the process exiting.
    };

    // Reopen the same database file and reconstruct the identity from its
    // saved private-key bytes, the way the CLI reloads an encrypted
    // keyfile on the next run.
    let reopened_store = SqliteStore::open(&alice_db).unwrap();
    let reloaded_identity = Identity::from_private_bytes(alice_private);
    assert_eq!(reloaded_identity.address(), alice_address);

    let (alice_relay_2, _unused) =
        InMemoryRelay::paired(alice_address.to_hex(), bob_address.to_hex());
    let alice = Core::new(reloaded_identity, reopened_store, alice_relay_2);

    // The conversation persisted, and the ratchet continues from where it
    // left off rather than restarting.
    let resumed_convo_id = alice
        .send_message(Some(convo_id), &bob_address.to_hex(), b"still here")
        .unwrap();
    assert_eq!(resumed_convo_id, convo_id);
}

#[test]
fn contact_and_message_rows_are_queryable_after_reopen() {
    use ssyk_core::Store;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("contacts.db");

    let alice_identity = Identity::generate(&mut OsRng);
    let bob_identity = Identity::generate(&mut OsRng);
    let alice_address = alice_identity.address();
    let bob_address = bob_identity.address();

    let (alice_relay, bob_relay) =
        InMemoryRelay::paired(alice_address.to_hex(), bob_address.to_hex());
    let bob = Core::new(bob_identity, SqliteStore::in_memory().unwrap(), bob_relay);

    {
        let alice = Core::new(alice_identity, SqliteStore::open(&db_path).unwrap(), alice_relay);
        alice.add_contact(&bob_address.to_hex(), "bob").unwrap();
        bob.receive_next_envelope().unwrap();
        bob.accept_contact(&alice_address.to_hex()).unwrap();
        alice.receive_next_envelope().unwrap();
        alice
            .send_message(None, &bob_address.to_hex(), b"hello from before the restart")
            .unwrap();
    }

    let mut reopened = SqliteStore::open(&db_path).unwrap();
    let contacts = reopened.list_contacts().unwrap();
    assert_eq!(contacts.len(), 1);
    assert_eq!(contacts[0].address, bob_address);
    assert!(matches!(
        contacts[0].status,
        ssyk_core::ContactStatus::Added
    ));
}
