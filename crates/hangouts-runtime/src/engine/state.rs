//! Engine state
//!
//! Everything the engine task owns. Commands and events are applied here
//! synchronously; the task only moves messages between channels.

use std::sync::Arc;

use hangouts_core::{
    Command, Effect, Event, HangoutRepository, Projection, Result, ServerConfig, TimeSource,
};
use serde::Serialize;
use tracing::debug;

use super::handlers::{CommandHandlers, EventHandlers};
use crate::collaborators::Session;
use crate::lifecycle::ChannelLifecycle;
use crate::outbound::OutboundQueue;
use crate::reconciler::{Navigation, Reconciler};
use crate::sync::SyncedStore;

/// Counters kept by the engine
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    pub commands_processed: u64,
    pub events_processed: u64,
    pub effects_generated: u64,
    pub frames_reconciled: u64,
    pub frames_rejected: u64,
    pub stale_events: u64,
    pub intents_sent: u64,
    pub intents_buffered: u64,
    pub intents_replayed: u64,
}

/// Result of one engine step
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Step {
    pub effects: Vec<Effect>,
    pub navigation: Option<Navigation>,
    /// Query to run against the remote directory
    pub search: Option<String>,
    pub shutdown: bool,
}

impl Step {
    pub fn effect(effect: Effect) -> Self {
        Self {
            effects: vec![effect],
            ..Self::default()
        }
    }
}

pub struct EngineState {
    pub session: Session,
    pub server: ServerConfig,
    pub synced: SyncedStore,
    pub lifecycle: ChannelLifecycle,
    pub outbound: OutboundQueue,
    pub reconciler: Reconciler,
    pub time_source: Arc<dyn TimeSource>,
    pub stats: EngineStats,
}

impl EngineState {
    pub fn new(
        session: Session,
        server: ServerConfig,
        repository: HangoutRepository,
        time_source: Arc<dyn TimeSource>,
    ) -> Self {
        Self {
            session,
            server,
            synced: SyncedStore::new(repository),
            lifecycle: ChannelLifecycle::new(),
            outbound: OutboundQueue::new(),
            reconciler: Reconciler::new(time_source.clone()),
            time_source,
            stats: EngineStats::default(),
        }
    }

    pub fn projection(&self) -> &Projection {
        self.synced.state()
    }

    /// Apply one command. A failed command leaves the durable store as it was.
    pub fn handle_command(&mut self, command: Command) -> Result<Step> {
        self.stats.commands_processed += 1;
        let checkpoint = self.synced.begin();
        let result = self.apply_command(command);
        self.synced.end(checkpoint, result.is_ok());
        let step = result?;
        self.stats.effects_generated += step.effects.len() as u64;
        Ok(step)
    }

    /// Apply one event. Events from a replaced connection are dropped; a
    /// failed event leaves the durable store as it was.
    pub fn handle_event(&mut self, event: Event) -> Result<Step> {
        self.stats.events_processed += 1;
        if let Some(connection_id) = event.connection_id() {
            if !self.lifecycle.is_current(connection_id) {
                self.stats.stale_events += 1;
                debug!(
                    connection_id,
                    current = self.lifecycle.connection_id(),
                    "dropping event from replaced connection"
                );
                return Ok(Step::default());
            }
        }

        let checkpoint = self.synced.begin();
        let result = self.apply_event(event);
        self.synced.end(checkpoint, result.is_ok());
        let step = result?;
        self.stats.effects_generated += step.effects.len() as u64;
        Ok(step)
    }

    fn apply_command(&mut self, command: Command) -> Result<Step> {
        let step = match command {
            Command::Load => CommandHandlers::handle_load(self)?,
            Command::Connect => CommandHandlers::handle_connect(self)?,
            Command::Disconnect => CommandHandlers::handle_disconnect(self)?,
            Command::SubmitIntent {
                peer,
                command,
                email,
                text,
            } => CommandHandlers::handle_submit_intent(self, peer, command, email, text)?,
            Command::OpenConversation { peer } => {
                CommandHandlers::handle_open_conversation(self, peer)?
            }
            Command::CloseConversation => CommandHandlers::handle_close_conversation(self),
            Command::MessageTextChanged { text } => {
                CommandHandlers::handle_message_text_changed(self, text)
            }
            Command::Search { query } => CommandHandlers::handle_search(self, query)?,
            Command::Shutdown => CommandHandlers::handle_shutdown(self),
        };
        Ok(step)
    }

    fn apply_event(&mut self, event: Event) -> Result<Step> {
        let step = match event {
            Event::ChannelOpened { .. } => EventHandlers::handle_opened(self)?,
            Event::FrameReceived { frame, .. } => EventHandlers::handle_frame(self, &frame)?,
            Event::ChannelClosing { .. } => EventHandlers::handle_closing(self)?,
            Event::ChannelClosed { reason, .. } => EventHandlers::handle_closed(self, reason)?,
            Event::ChannelError { error, .. } => EventHandlers::handle_error(self, error)?,
            Event::SearchCompleted { query, result } => {
                EventHandlers::handle_search_completed(self, query, result)
            }
        };
        Ok(step)
    }
}
