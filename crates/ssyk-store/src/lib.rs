//! `rusqlite`-backed implementation of `ssyk_core::Store`.
//!
//! Schema and query shape follow `wraith_chat`'s `Database` (`CREATE TABLE IF
//! NOT EXISTS`, `query_row`/`.optional()`, `query_map` into owned structs);
//! the bundled SQLite build keeps this crate dependency-free at the system
//! level the same way the workspace already does for every other `rusqlite`
//! consumer.

use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};
use ssyk_core::{Contact, ContactStatus, Conversation, CoreError, Message, Store};
use ssyk_crypto::{Address, ConversationId};
use tracing::debug;

/// A SQLite-backed `Store`. Holds one connection; callers are expected to
/// reach it only through `Core`'s own mutex, as the trait documents.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) the database file at `path` and ensure its schema.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, CoreError> {
        let conn = Connection::open(path.as_ref())
            .map_err(|e| CoreError::StoreError(format!("failed to open database: {e}")))?;
        let store = Self { conn };
        store.create_tables()?;
        Ok(store)
    }

    /// An ephemeral in-memory store, for tests and quick experiments.
    pub fn in_memory() -> Result<Self, CoreError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| CoreError::StoreError(format!("failed to open in-memory database: {e}")))?;
        let store = Self { conn };
        store.create_tables()?;
        Ok(store)
    }

    fn create_tables(&self) -> Result<(), CoreError> {
        self.conn
            .execute(
                "CREATE TABLE IF NOT EXISTS contacts (
                    public_key TEXT PRIMARY KEY,
                    name TEXT NOT NULL,
                    status INTEGER NOT NULL,
                    handshake_blob BLOB,
                    root_send BLOB,
                    root_recv BLOB,
                    created_at INTEGER NOT NULL
                )",
                [],
            )
            .map_err(sql_err("create contacts table"))?;

        self.conn
            .execute(
                "CREATE TABLE IF NOT EXISTS conversations (
                    convo_id TEXT NOT NULL,
                    public_key TEXT NOT NULL,
                    title TEXT NOT NULL,
                    created_at INTEGER NOT NULL,
                    last_message_at INTEGER NOT NULL,
                    send_state BLOB NOT NULL,
                    recv_state BLOB NOT NULL,
                    broken INTEGER NOT NULL DEFAULT 0,
                    PRIMARY KEY (convo_id, public_key),
                    FOREIGN KEY (public_key) REFERENCES contacts(public_key)
                )",
                [],
            )
            .map_err(sql_err("create conversations table"))?;

        self.conn
            .execute(
                "CREATE TABLE IF NOT EXISTS messages (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    convo_id TEXT NOT NULL,
                    public_key TEXT NOT NULL,
                    ts INTEGER NOT NULL,
                    sender_is_me INTEGER NOT NULL,
                    content BLOB NOT NULL,
                    FOREIGN KEY (convo_id, public_key) REFERENCES conversations(convo_id, public_key)
                )",
                [],
            )
            .map_err(sql_err("create messages table"))?;

        self.conn
            .execute(
                "CREATE INDEX IF NOT EXISTS idx_messages_conversation
                 ON messages(convo_id, public_key, ts)",
                [],
            )
            .map_err(sql_err("create messages index"))?;

        self.conn
            .execute(
                "CREATE INDEX IF NOT EXISTS idx_conversations_contact
                 ON conversations(public_key)",
                [],
            )
            .map_err(sql_err("create conversations index"))?;

        Ok(())
    }
}

fn sql_err(context: &'static str) -> impl Fn(rusqlite::Error) -> CoreError {
    move |e| CoreError::StoreError(format!("{context}: {e}"))
}

fn status_to_int(status: ContactStatus) -> i64 {
    status as i64
}

fn status_from_int(value: i64) -> Result<ContactStatus, CoreError> {
    match value {
        0 => Ok(ContactStatus::WaitingForAccept),
        1 => Ok(ContactStatus::WaitingToAccept),
        2 => Ok(ContactStatus::Added),
        other => Err(CoreError::StoreError(format!(
            "unrecognized contact status {other}"
        ))),
    }
}

fn contact_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Result<Contact, CoreError>> {
    let public_key: String = row.get(0)?;
    let status_int: i64 = row.get(2)?;

    let address = match Address::from_hex(&public_key) {
        Ok(a) => a,
        Err(e) => return Ok(Err(CoreError::StoreError(format!("corrupt address: {e}")))),
    };
    let status = match status_from_int(status_int) {
        Ok(s) => s,
        Err(e) => return Ok(Err(e)),
    };

    Ok(Ok(Contact {
        address,
        name: row.get(1)?,
        status,
        handshake_blob: row.get(3)?,
        root_send: row.get(4)?,
        root_recv: row.get(5)?,
        created_at: row.get(6)?,
    }))
}

fn conversation_from_row(
    row: &rusqlite::Row<'_>,
) -> rusqlite::Result<Result<Conversation, CoreError>> {
    let convo_id_hex: String = row.get(0)?;
    let public_key: String = row.get(1)?;

    let convo_id = match ConversationId::from_hex(&convo_id_hex) {
        Ok(id) => id,
        Err(e) => return Ok(Err(CoreError::StoreError(format!("corrupt convo_id: {e}")))),
    };
    let peer_address = match Address::from_hex(&public_key) {
        Ok(a) => a,
        Err(e) => return Ok(Err(CoreError::StoreError(format!("corrupt address: {e}")))),
    };
    let broken_int: i64 = row.get(7)?;

    Ok(Ok(Conversation {
        convo_id,
        peer_address,
        title: row.get(2)?,
        created_at: row.get(3)?,
        last_message_at: row.get(4)?,
        send_state: row.get(5)?,
        recv_state: row.get(6)?,
        broken: broken_int != 0,
    }))
}

fn message_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Result<Message, CoreError>> {
    let convo_id_hex: String = row.get(1)?;
    let public_key: String = row.get(2)?;

    let convo_id = match ConversationId::from_hex(&convo_id_hex) {
        Ok(id) => id,
        Err(e) => return Ok(Err(CoreError::StoreError(format!("corrupt convo_id: {e}")))),
    };
    let peer_address = match Address::from_hex(&public_key) {
        Ok(a) => a,
        Err(e) => return Ok(Err(CoreError::StoreError(format!("corrupt address: {e}")))),
    };
    let sender_is_me_int: i64 = row.get(4)?;

    Ok(Ok(Message {
        id: row.get(0)?,
        convo_id,
        peer_address,
        timestamp: row.get(3)?,
        sender_is_me: sender_is_me_int != 0,
        content: row.get(5)?,
    }))
}

impl Store for SqliteStore {
    fn insert_contact(&mut self, contact: &Contact) -> Result<(), CoreError> {
        let rows = self
            .conn
            .execute(
                "INSERT INTO contacts
                    (public_key, name, status, handshake_blob, root_send, root_recv, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    contact.address.to_hex(),
                    contact.name,
                    status_to_int(contact.status),
                    contact.handshake_blob,
                    contact.root_send,
                    contact.root_recv,
                    contact.created_at,
                ],
            )
            .map_err(|e| {
                if e.to_string().contains("UNIQUE constraint failed") {
                    CoreError::WrongState(format!("contact {} already exists", contact.address))
                } else {
                    CoreError::StoreError(format!("insert_contact: {e}"))
                }
            })?;
        debug!(rows, address = %contact.address, "inserted contact");
        Ok(())
    }

    fn get_contact(&mut self, address: &Address) -> Result<Option<Contact>, CoreError> {
        self.conn
            .query_row(
                "SELECT public_key, name, status, handshake_blob, root_send, root_recv, created_at
                 FROM contacts WHERE public_key = ?1",
                params![address.to_hex()],
                contact_from_row,
            )
            .optional()
            .map_err(sql_err("get_contact"))?
            .transpose()
    }

    fn list_contacts(&mut self) -> Result<Vec<Contact>, CoreError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT public_key, name, status, handshake_blob, root_send, root_recv, created_at
                 FROM contacts ORDER BY name ASC",
            )
            .map_err(sql_err("list_contacts"))?;
        let rows = stmt
            .query_map([], contact_from_row)
            .map_err(sql_err("list_contacts"))?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(sql_err("list_contacts"))??);
        }
        Ok(out)
    }

    fn update_contact(&mut self, contact: &Contact) -> Result<(), CoreError> {
        self.conn
            .execute(
                "UPDATE contacts SET name = ?2, status = ?3, handshake_blob = ?4,
                    root_send = ?5, root_recv = ?6 WHERE public_key = ?1",
                params![
                    contact.address.to_hex(),
                    contact.name,
                    status_to_int(contact.status),
                    contact.handshake_blob,
                    contact.root_send,
                    contact.root_recv,
                ],
            )
            .map_err(sql_err("update_contact"))?;
        Ok(())
    }

    fn delete_contact(&mut self, address: &Address) -> Result<(), CoreError> {
        let hex = address.to_hex();
        self.conn
            .execute("DELETE FROM messages WHERE public_key = ?1", params![hex])
            .map_err(sql_err("delete_contact (messages)"))?;
        self.conn
            .execute(
                "DELETE FROM conversations WHERE public_key = ?1",
                params![hex],
            )
            .map_err(sql_err("delete_contact (conversations)"))?;
        self.conn
            .execute("DELETE FROM contacts WHERE public_key = ?1", params![hex])
            .map_err(sql_err("delete_contact (contacts)"))?;
        Ok(())
    }

    fn insert_conversation(&mut self, conversation: &Conversation) -> Result<(), CoreError> {
        self.conn
            .execute(
                "INSERT INTO conversations
                    (convo_id, public_key, title, created_at, last_message_at,
                     send_state, recv_state, broken)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    conversation.convo_id.to_hex(),
                    conversation.peer_address.to_hex(),
                    conversation.title,
                    conversation.created_at,
                    conversation.last_message_at,
                    conversation.send_state,
                    conversation.recv_state,
                    conversation.broken as i64,
                ],
            )
            .map_err(sql_err("insert_conversation"))?;
        Ok(())
    }

    fn get_conversation(
        &mut self,
        convo_id: &ConversationId,
        peer_address: &Address,
    ) -> Result<Option<Conversation>, CoreError> {
        self.conn
            .query_row(
                "SELECT convo_id, public_key, title, created_at, last_message_at,
                        send_state, recv_state, broken
                 FROM conversations WHERE convo_id = ?1 AND public_key = ?2",
                params![convo_id.to_hex(), peer_address.to_hex()],
                conversation_from_row,
            )
            .optional()
            .map_err(sql_err("get_conversation"))?
            .transpose()
    }

    fn update_conversation(&mut self, conversation: &Conversation) -> Result<(), CoreError> {
        self.conn
            .execute(
                "UPDATE conversations SET title = ?3, last_message_at = ?4,
                    send_state = ?5, recv_state = ?6, broken = ?7
                 WHERE convo_id = ?1 AND public_key = ?2",
                params![
                    conversation.convo_id.to_hex(),
                    conversation.peer_address.to_hex(),
                    conversation.title,
                    conversation.last_message_at,
                    conversation.send_state,
                    conversation.recv_state,
                    conversation.broken as i64,
                ],
            )
            .map_err(sql_err("update_conversation"))?;
        Ok(())
    }

    fn append_message(&mut self, message: &Message) -> Result<(), CoreError> {
        self.conn
            .execute(
                "INSERT INTO messages (convo_id, public_key, ts, sender_is_me, content)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    message.convo_id.to_hex(),
                    message.peer_address.to_hex(),
                    message.timestamp,
                    message.sender_is_me as i64,
                    message.content,
                ],
            )
            .map_err(sql_err("append_message"))?;
        Ok(())
    }

    fn list_messages(
        &mut self,
        convo_id: &ConversationId,
        peer_address: &Address,
    ) -> Result<Vec<Message>, CoreError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, convo_id, public_key, ts, sender_is_me, content
                 FROM messages WHERE convo_id = ?1 AND public_key = ?2 ORDER BY ts ASC, id ASC",
            )
            .map_err(sql_err("list_messages"))?;
        let rows = stmt
            .query_map(
                params![convo_id.to_hex(), peer_address.to_hex()],
                message_from_row,
            )
            .map_err(sql_err("list_messages"))?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(sql_err("list_messages"))??);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_core::{OsRng, RngCore};

    fn rand_address() -> Address {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        Address::from_bytes(bytes)
    }

    fn rand_convo_id() -> ConversationId {
        ConversationId::generate(&mut OsRng)
    }

    #[test]
    fn insert_and_get_contact_roundtrip() {
        let mut store = SqliteStore::in_memory().unwrap();
        let contact = Contact {
            address: rand_address(),
            name: "alice".into(),
            status: ContactStatus::WaitingForAccept,
            handshake_blob: Some(vec![1, 2, 3]),
            root_send: None,
            root_recv: None,
            created_at: 1000,
        };
        store.insert_contact(&contact).unwrap();

        let fetched = store.get_contact(&contact.address).unwrap().unwrap();
        assert_eq!(fetched.name, "alice");
        assert_eq!(fetched.status, ContactStatus::WaitingForAccept);
        assert_eq!(fetched.handshake_blob, Some(vec![1, 2, 3]));
    }

    #[test]
    fn duplicate_insert_is_rejected() {
        let mut store = SqliteStore::in_memory().unwrap();
        let contact = Contact {
            address: rand_address(),
            name: "alice".into(),
            status: ContactStatus::WaitingForAccept,
            handshake_blob: None,
            root_send: None,
            root_recv: None,
            created_at: 1000,
        };
        store.insert_contact(&contact).unwrap();
        let result = store.insert_contact(&contact);
        assert!(matches!(result, Err(CoreError::WrongState(_))));
    }

    #[test]
    fn delete_contact_cascades_conversations_and_messages() {
        let mut store = SqliteStore::in_memory().unwrap();
        let contact = Contact {
            address: rand_address(),
            name: "bob".into(),
            status: ContactStatus::Added,
            handshake_blob: None,
            root_send: Some(vec![0; 32]),
            root_recv: Some(vec![0; 32]),
            created_at: 1000,
        };
        store.insert_contact(&contact).unwrap();

        let convo_id = rand_convo_id();
        let conversation = Conversation {
            convo_id,
            peer_address: contact.address,
            title: "General".into(),
            created_at: 1000,
            last_message_at: 1000,
            send_state: vec![0; 32],
            recv_state: vec![0; 32],
            broken: false,
        };
        store.insert_conversation(&conversation).unwrap();
        store
            .append_message(&Message {
                id: 0,
                convo_id,
                peer_address: contact.address,
                timestamp: 1000,
                sender_is_me: true,
                content: b"hi".to_vec(),
            })
            .unwrap();

        store.delete_contact(&contact.address).unwrap();

        assert!(store.get_contact(&contact.address).unwrap().is_none());
        assert!(store
            .get_conversation(&convo_id, &contact.address)
            .unwrap()
            .is_none());
        assert!(store
            .list_messages(&convo_id, &contact.address)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn conversation_broken_flag_persists() {
        let mut store = SqliteStore::in_memory().unwrap();
        let contact = Contact {
            address: rand_address(),
            name: "carol".into(),
            status: ContactStatus::Added,
            handshake_blob: None,
            root_send: Some(vec![0; 32]),
            root_recv: Some(vec![0; 32]),
            created_at: 1000,
        };
        store.insert_contact(&contact).unwrap();

        let convo_id = rand_convo_id();
        let mut conversation = Conversation {
            convo_id,
            peer_address: contact.address,
            title: "General".into(),
            created_at: 1000,
            last_message_at: 1000,
            send_state: vec![0; 32],
            recv_state: vec![0; 32],
            broken: false,
        };
        store.insert_conversation(&conversation).unwrap();

        conversation.broken = true;
        store.update_conversation(&conversation).unwrap();

        let fetched = store
            .get_conversation(&convo_id, &contact.address)
            .unwrap()
            .unwrap();
        assert!(fetched.broken);
    }

    #[test]
    fn reopening_the_same_file_survives_a_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ssyk.db");
        let address = rand_address();

        {
            let mut store = SqliteStore::open(&path).unwrap();
            store
                .insert_contact(&Contact {
                    address,
                    name: "dave".into(),
                    status: ContactStatus::WaitingForAccept,
                    handshake_blob: Some(vec![9; 64]),
                    root_send: None,
                    root_recv: None,
                    created_at: 1000,
                })
                .unwrap();
        }

        let mut reopened = SqliteStore::open(&path).unwrap();
        let contact = reopened.get_contact(&address).unwrap().unwrap();
        assert_eq!(contact.name, "dave");
        assert_eq!(contact.handshake_blob, Some(vec![9; 64]));
    }
}
