//! Synchronized store
//!
//! Pairs the durable repository with the in-memory projection. Every write
//! goes through a `commit_*` method that persists first and then dispatches
//! the matching action, so the two never drift apart.

use hangouts_core::{
    Action, Hangout, HangoutRepository, HangoutStore, Identity, Intent, Message, Projection,
    Result,
};
use tracing::{debug, error, warn};

/// One durable record together with its content
#[derive(Debug, Clone)]
enum Record {
    Hangouts(Vec<Hangout>),
    Messages(Identity, Vec<Message>),
    Unread(Vec<Hangout>),
    Offline(Vec<Intent>),
}

/// Position in the undo journal returned by [`SyncedStore::begin`]
#[must_use]
#[derive(Debug)]
pub struct Checkpoint {
    mark: usize,
    nested: bool,
}

pub struct SyncedStore {
    repository: HangoutRepository,
    store: HangoutStore,
    /// Previous contents of every record written since the outermost `begin`
    journal: Vec<Record>,
    recording: bool,
}

impl SyncedStore {
    pub fn new(repository: HangoutRepository) -> Self {
        Self {
            repository,
            store: HangoutStore::new(),
            journal: Vec::new(),
            recording: false,
        }
    }

    pub fn identity(&self) -> &Identity {
        self.repository.identity()
    }

    pub fn state(&self) -> &Projection {
        self.store.state()
    }

    pub fn focused_peer(&self) -> Option<&Identity> {
        self.store.state().focused_peer()
    }

    /// Number of actions applied to the projection so far
    pub fn dispatched(&self) -> u64 {
        self.store.dispatched()
    }

    // ---- Reads (durable store is the source of truth) ----

    pub fn hangouts(&self) -> Result<Vec<Hangout>> {
        self.repository.load_hangouts()
    }

    pub fn messages(&self, peer: &Identity) -> Result<Vec<Message>> {
        self.repository.load_messages(peer)
    }

    pub fn unread(&self) -> Result<Vec<Hangout>> {
        self.repository.load_unread()
    }

    pub fn offline(&self) -> Result<Vec<Intent>> {
        self.repository.load_offline()
    }

    // ---- Paired writes ----

    pub fn commit_hangouts(&mut self, hangouts: Vec<Hangout>) -> Result<()> {
        self.commit(Record::Hangouts(hangouts))
    }

    pub fn commit_messages(&mut self, peer: Identity, messages: Vec<Message>) -> Result<()> {
        self.commit(Record::Messages(peer, messages))
    }

    pub fn commit_unread(&mut self, unread: Vec<Hangout>) -> Result<()> {
        self.commit(Record::Unread(unread))
    }

    pub fn commit_offline(&mut self, intents: Vec<Intent>) -> Result<()> {
        self.commit(Record::Offline(intents))
    }

    /// Projection-only transitions (channel status, focus, search, drafts)
    pub fn dispatch(&mut self, action: Action) {
        self.store.dispatch(action);
    }

    // ---- Steps ----

    /// Start recording the previous contents of every record written from
    /// here on. Checkpoints nest; only the outermost one clears the journal.
    pub fn begin(&mut self) -> Checkpoint {
        let checkpoint = Checkpoint {
            mark: self.journal.len(),
            nested: self.recording,
        };
        self.recording = true;
        checkpoint
    }

    /// Close a checkpoint. Unless `keep` is set, every record written since
    /// `begin` is put back, in reverse order, with its projection dispatch.
    pub fn end(&mut self, checkpoint: Checkpoint, keep: bool) {
        if !keep {
            self.roll_back_to(checkpoint.mark);
        }
        if !checkpoint.nested {
            self.recording = false;
            self.journal.clear();
        }
    }

    /// Run `f` as one step: either all of its writes stay or none do
    pub fn transaction<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let checkpoint = self.begin();
        let result = f(self);
        self.end(checkpoint, result.is_ok());
        result
    }

    fn commit(&mut self, record: Record) -> Result<()> {
        let previous = if self.recording {
            Some(self.current(&record)?)
        } else {
            None
        };
        self.write(record)?;
        self.journal.extend(previous);
        Ok(())
    }

    fn current(&self, record: &Record) -> Result<Record> {
        Ok(match record {
            Record::Hangouts(_) => Record::Hangouts(self.hangouts()?),
            Record::Messages(peer, _) => Record::Messages(peer.clone(), self.messages(peer)?),
            Record::Unread(_) => Record::Unread(self.unread()?),
            Record::Offline(_) => Record::Offline(self.offline()?),
        })
    }

    /// Persist first, then dispatch the matching action
    fn write(&mut self, record: Record) -> Result<()> {
        match record {
            Record::Hangouts(hangouts) => {
                self.repository.save_hangouts(&hangouts)?;
                self.store.dispatch(Action::HangoutsUpdated { hangouts });
            }
            Record::Messages(peer, messages) => {
                self.repository.save_messages(&peer, &messages)?;
                self.store.dispatch(Action::MessagesUpdated { peer, messages });
            }
            Record::Unread(unread) => {
                self.repository.save_unread(&unread)?;
                self.store.dispatch(Action::UnreadUpdated { unread });
            }
            Record::Offline(intents) => {
                self.repository.save_offline(&intents)?;
                debug!(queued = intents.len(), "offline buffer written");
                self.store.dispatch(Action::OfflineUpdated {
                    queued: intents.len(),
                });
            }
        }
        Ok(())
    }

    fn roll_back_to(&mut self, mark: usize) {
        let undo = self.journal.split_off(mark.min(self.journal.len()));
        if undo.is_empty() {
            return;
        }
        warn!(records = undo.len(), "step failed, restoring previous records");
        for record in undo.into_iter().rev() {
            if let Err(e) = self.write(record) {
                error!("Failed to restore a record after a failed step: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hangouts_core::{HangoutError, HangoutState, RecordingStore, Timestamp};

    fn synced() -> (SyncedStore, RecordingStore) {
        let memory = RecordingStore::new();
        let repository = HangoutRepository::new("alice".into(), Box::new(memory.clone()));
        (SyncedStore::new(repository), memory)
    }

    #[test]
    fn test_commit_writes_then_dispatches() {
        let (mut synced, memory) = synced();
        let bob = Hangout::new("bob".into(), HangoutState::Inviter, Timestamp::new(1));

        synced.commit_hangouts(vec![bob.clone()]).unwrap();

        assert_eq!(memory.write_log(), vec!["alice-hangouts".to_string()]);
        assert_eq!(synced.dispatched(), 1);
        assert_eq!(synced.state().hangouts, vec![bob.clone()]);
        assert_eq!(synced.hangouts().unwrap(), vec![bob]);
    }

    #[test]
    fn test_offline_commit_updates_queue_count() {
        let (mut synced, memory) = synced();
        let intent = Intent::new("bob".into(), HangoutState::Inviter, Timestamp::new(1));

        synced.commit_offline(vec![intent.clone()]).unwrap();
        assert_eq!(synced.state().queued, 1);
        assert_eq!(synced.offline().unwrap(), vec![intent]);

        synced.commit_offline(Vec::new()).unwrap();
        assert_eq!(synced.state().queued, 0);
        assert_eq!(memory.write_log().len(), 2);
    }

    #[test]
    fn test_projection_dispatch_does_not_write() {
        let (mut synced, memory) = synced();
        synced.dispatch(Action::ChannelConnecting);
        assert!(memory.write_log().is_empty());
        assert_eq!(synced.dispatched(), 1);
    }

    #[test]
    fn test_failed_transaction_restores_every_record() {
        let (mut synced, memory) = synced();
        let bob = Hangout::new("bob".into(), HangoutState::Inviter, Timestamp::new(1));
        synced.commit_hangouts(vec![bob.clone()]).unwrap();
        memory.fail_writes_to("alice-offline-hangouts");

        let result = synced.transaction(|synced| {
            let carol = Hangout::new("carol".into(), HangoutState::Inviter, Timestamp::new(2));
            synced.commit_hangouts(vec![bob.clone(), carol.clone()])?;
            synced.commit_unread(vec![carol])?;
            let intent = Intent::new("carol".into(), HangoutState::Inviter, Timestamp::new(2));
            synced.commit_offline(vec![intent])
        });

        assert!(matches!(result, Err(HangoutError::Storage(_))));
        assert_eq!(synced.hangouts().unwrap(), vec![bob.clone()]);
        assert!(synced.unread().unwrap().is_empty());
        assert_eq!(synced.state().hangouts, vec![bob]);
        assert!(synced.state().unread.is_empty());
        assert_eq!(
            memory.write_log(),
            vec![
                "alice-hangouts",
                "alice-hangouts",
                "alice-unread-hangouts",
                "alice-unread-hangouts",
                "alice-hangouts",
            ]
        );
    }

    #[test]
    fn test_nested_transaction_keeps_outer_writes() {
        let (mut synced, memory) = synced();
        let bob = Hangout::new("bob".into(), HangoutState::Inviter, Timestamp::new(1));
        memory.fail_writes_to("alice-unread-hangouts");

        let checkpoint = synced.begin();
        synced.commit_hangouts(vec![bob.clone()]).unwrap();
        let inner = synced.transaction(|synced| synced.commit_unread(vec![bob.clone()]));
        assert!(inner.is_err());
        synced.end(checkpoint, true);

        assert_eq!(synced.hangouts().unwrap(), vec![bob]);
        assert!(synced.journal.is_empty());
    }
}
