//! Durable persistence, as a collaborator trait.
//!
//! `ssyk-store` ships a `rusqlite`-backed implementation; tests use an
//! in-memory one. The `insert_contact` implementation must reject a second
//! insert for an address that already has a row -- that rejection is how
//! the orchestrator detects the concurrent-`addContact` collision in
//! `orchestrator::Core::receive_contact_request`.

use ssyk_crypto::{Address, ConversationId};

use crate::model::{Contact, Conversation, Message};
use crate::CoreError;

/// Durable mapping of contacts, conversations and messages.
///
/// Implementations are expected to serialize their own internal access
/// (e.g. behind a single SQLite connection and a mutex); `Core` itself only
/// ever calls through one mutex-guarded handle, but the trait does not
/// assume that's the only caller.
pub trait Store: Send {
    /// Insert a new contact row. Must fail if `address` already has a row.
    fn insert_contact(&mut self, contact: &Contact) -> Result<(), CoreError>;

    fn get_contact(&mut self, address: &Address) -> Result<Option<Contact>, CoreError>;

    fn list_contacts(&mut self) -> Result<Vec<Contact>, CoreError>;

    /// Overwrite an existing contact row in place.
    fn update_contact(&mut self, contact: &Contact) -> Result<(), CoreError>;

    /// Remove a contact and cascade-remove its conversations and messages.
    fn delete_contact(&mut self, address: &Address) -> Result<(), CoreError>;

    fn insert_conversation(&mut self, conversation: &Conversation) -> Result<(), CoreError>;

    fn get_conversation(
        &mut self,
        convo_id: &ConversationId,
        peer_address: &Address,
    ) -> Result<Option<Conversation>, CoreError>;

    fn update_conversation(&mut self, conversation: &Conversation) -> Result<(), CoreError>;

    fn append_message(&mut self, message: &Message) -> Result<(), CoreError>;

    fn list_messages(
        &mut self,
        convo_id: &ConversationId,
        peer_address: &Address,
    ) -> Result<Vec<Message>, CoreError>;
}
