//! Outbound intents and the offline buffer
//!
//! Intents are applied optimistically before anything reaches the wire. When
//! the channel is down they are persisted in the offline buffer and replayed,
//! once each, the next time the channel opens.

use hangouts_core::{Action, Effect, Intent, OutboundFrame, Result};
use tracing::{debug, info};

use crate::lifecycle::ChannelLifecycle;
use crate::sync::SyncedStore;

/// What happened to a submitted intent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// Handed to the live channel
    Sent(Effect),
    /// Stored in the offline buffer
    Buffered,
}

#[derive(Debug, Default)]
pub struct OutboundQueue {
    /// Generation of the last Open that was flushed
    flushed_generation: Option<u64>,
}

impl OutboundQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `intent` locally, then send it or buffer it
    pub fn submit(
        &mut self,
        synced: &mut SyncedStore,
        lifecycle: &ChannelLifecycle,
        intent: Intent,
    ) -> Result<Submission> {
        Self::apply_optimistic(synced, &intent)?;
        synced.dispatch(Action::SendingStarted {
            intent: intent.clone(),
        });

        if lifecycle.is_open() {
            let frame = OutboundFrame::from_intent(&intent, false).encode()?;
            let effect = lifecycle.send_frame(frame)?;
            synced.dispatch(Action::SendingFulfilled);
            debug!(peer = %intent.peer, command = %intent.command, "intent sent");
            return Ok(Submission::Sent(effect));
        }

        let mut offline = synced.offline()?;
        offline.push(intent);
        synced.commit_offline(offline)?;
        info!(state = %lifecycle.state(), "channel not open, intent buffered");
        Ok(Submission::Buffered)
    }

    /// Replay the offline buffer after the channel entered Open.
    ///
    /// Each buffered entry is sent once, marked as an offline replay, and
    /// removed from the buffer by id. A second call within the same
    /// generation sends nothing.
    pub fn flush(
        &mut self,
        synced: &mut SyncedStore,
        lifecycle: &ChannelLifecycle,
    ) -> Result<Vec<Effect>> {
        let generation = lifecycle.generation();
        if !lifecycle.is_open() || self.flushed_generation == Some(generation) {
            return Ok(Vec::new());
        }

        let offline = synced.offline()?;
        if offline.is_empty() {
            self.flushed_generation = Some(generation);
            return Ok(Vec::new());
        }

        let mut effects = Vec::with_capacity(offline.len());
        let mut sent = Vec::with_capacity(offline.len());
        for intent in &offline {
            let frame = OutboundFrame::from_intent(intent, true).encode()?;
            effects.push(lifecycle.send_frame(frame)?);
            sent.push(intent.id);
        }

        let remaining: Vec<Intent> = offline
            .into_iter()
            .filter(|intent| !sent.contains(&intent.id))
            .collect();
        synced.commit_offline(remaining)?;
        synced.dispatch(Action::SendingFulfilled);
        // a failed replay leaves the generation unflushed
        self.flushed_generation = Some(generation);

        info!(
            replayed = effects.len(),
            generation,
            "offline buffer replayed"
        );
        Ok(effects)
    }

    /// Optimistic hangout and message-log writes for an intent
    fn apply_optimistic(synced: &mut SyncedStore, intent: &Intent) -> Result<()> {
        let mut hangouts = synced.hangouts()?;
        let hangout = intent.to_hangout();
        match hangouts.iter_mut().find(|h| h.peer == intent.peer) {
            Some(existing) => *existing = hangout,
            None => hangouts.push(hangout),
        }
        synced.commit_hangouts(hangouts)?;

        if let Some(message) = intent.to_message(synced.identity()) {
            let mut messages = synced.messages(&intent.peer)?;
            messages.push(message);
            synced.commit_messages(intent.peer.clone(), messages)?;
        }
        Ok(())
    }
}
