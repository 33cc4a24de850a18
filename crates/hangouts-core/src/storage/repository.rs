//! Identity-scoped repository over the durable store
//!
//! All storage keys are derived here, once, from the owning identity:
//! `{identity}-hangouts`, `{identity}-{peer}-messages`,
//! `{identity}-unread-hangouts` and `{identity}-offline-hangouts`.

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::DurableStore;
use crate::errors::{HangoutError, Result, StorageError};
use crate::protocol::{Hangout, Intent, Message};
use crate::types::Identity;

/// Typed access to one identity's records
pub struct HangoutRepository {
    identity: Identity,
    store: Box<dyn DurableStore>,
}

impl HangoutRepository {
    pub fn new(identity: Identity, store: Box<dyn DurableStore>) -> Self {
        Self { identity, store }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    // ------------------------------------------------------------------------
    // Keys
    // ------------------------------------------------------------------------

    pub fn hangouts_key(&self) -> String {
        format!("{}-hangouts", self.identity)
    }

    pub fn messages_key(&self, peer: &Identity) -> String {
        format!("{}-{}-messages", self.identity, peer)
    }

    pub fn unread_key(&self) -> String {
        format!("{}-unread-hangouts", self.identity)
    }

    pub fn offline_key(&self) -> String {
        format!("{}-offline-hangouts", self.identity)
    }

    // ------------------------------------------------------------------------
    // Records
    // ------------------------------------------------------------------------

    pub fn load_hangouts(&self) -> Result<Vec<Hangout>> {
        self.read_list(&self.hangouts_key())
    }

    pub fn save_hangouts(&mut self, hangouts: &[Hangout]) -> Result<()> {
        let key = self.hangouts_key();
        self.write_list(&key, hangouts)
    }

    pub fn load_messages(&self, peer: &Identity) -> Result<Vec<Message>> {
        self.read_list(&self.messages_key(peer))
    }

    pub fn save_messages(&mut self, peer: &Identity, messages: &[Message]) -> Result<()> {
        let key = self.messages_key(peer);
        self.write_list(&key, messages)
    }

    pub fn load_unread(&self) -> Result<Vec<Hangout>> {
        self.read_list(&self.unread_key())
    }

    pub fn save_unread(&mut self, unread: &[Hangout]) -> Result<()> {
        let key = self.unread_key();
        self.write_list(&key, unread)
    }

    pub fn load_offline(&self) -> Result<Vec<Intent>> {
        self.read_list(&self.offline_key())
    }

    pub fn save_offline(&mut self, intents: &[Intent]) -> Result<()> {
        let key = self.offline_key();
        self.write_list(&key, intents)
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    /// Missing keys read as an empty list; anything that is not a list of
    /// `T` is reported as corrupt.
    fn read_list<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>> {
        match self.store.get(key)? {
            None => Ok(Vec::new()),
            Some(value) => serde_json::from_value(value).map_err(|e| {
                HangoutError::Storage(StorageError::Corrupt {
                    key: key.to_string(),
                    reason: e.to_string(),
                })
            }),
        }
    }

    fn write_list<T: Serialize>(&mut self, key: &str, items: &[T]) -> Result<()> {
        let value = serde_json::to_value(items)?;
        self.store.set(key, value)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::HangoutState;
    use crate::storage::{DurableStore, MemoryStore};
    use crate::types::Timestamp;
    use serde_json::json;

    fn repository(store: &MemoryStore) -> HangoutRepository {
        HangoutRepository::new(Identity::new("alice"), Box::new(store.clone()))
    }

    #[test]
    fn test_keys_are_namespaced_by_identity() {
        let repo = repository(&MemoryStore::new());
        assert_eq!(repo.hangouts_key(), "alice-hangouts");
        assert_eq!(repo.messages_key(&"bob".into()), "alice-bob-messages");
        assert_eq!(repo.unread_key(), "alice-unread-hangouts");
        assert_eq!(repo.offline_key(), "alice-offline-hangouts");
    }

    #[test]
    fn test_missing_lists_read_empty() {
        let repo = repository(&MemoryStore::new());
        assert!(repo.load_hangouts().unwrap().is_empty());
        assert!(repo.load_messages(&"bob".into()).unwrap().is_empty());
        assert!(repo.load_offline().unwrap().is_empty());
    }

    #[test]
    fn test_hangouts_round_trip_through_store() {
        let store = MemoryStore::new();
        let mut repo = repository(&store);
        let hangout = Hangout::new("bob".into(), HangoutState::Inviter, Timestamp::new(1));
        repo.save_hangouts(std::slice::from_ref(&hangout)).unwrap();

        assert_eq!(repo.load_hangouts().unwrap(), vec![hangout]);
        assert!(store.get("alice-hangouts").unwrap().is_some());
    }

    #[test]
    fn test_non_list_value_is_corrupt() {
        let mut store = MemoryStore::new();
        store.set("alice-hangouts", json!({"oops": true})).unwrap();
        let repo = repository(&store);
        assert!(matches!(
            repo.load_hangouts(),
            Err(HangoutError::Storage(StorageError::Corrupt { .. }))
        ));
    }
}
