//! Engine task
//!
//! Single task that owns all engine state. Commands from the UI and events
//! from the transport are processed one at a time, so every step runs to
//! completion before the next starts.

use std::sync::Arc;

use hangouts_core::{
    CommandReceiver, Effect, EffectSender, Event, EventReceiver, EventSender, HangoutError,
    ProjectionSender, Result,
};
use tracing::{debug, error, info, warn};

use super::state::{EngineState, EngineStats, Step};
use crate::collaborators::{Navigator, PeerDirectory};

pub struct EngineTask {
    state: EngineState,
    command_receiver: CommandReceiver,
    event_receiver: EventReceiver,
    /// Used to feed search results back into the loop
    event_sender: EventSender,
    effect_sender: EffectSender,
    projection_sender: ProjectionSender,
    navigator: Arc<dyn Navigator>,
    directory: Arc<dyn PeerDirectory>,
    running: bool,
}

impl EngineTask {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        state: EngineState,
        command_receiver: CommandReceiver,
        event_receiver: EventReceiver,
        event_sender: EventSender,
        effect_sender: EffectSender,
        projection_sender: ProjectionSender,
        navigator: Arc<dyn Navigator>,
        directory: Arc<dyn PeerDirectory>,
    ) -> Self {
        Self {
            state,
            command_receiver,
            event_receiver,
            event_sender,
            effect_sender,
            projection_sender,
            navigator,
            directory,
            running: true,
        }
    }

    pub fn stats(&self) -> &EngineStats {
        &self.state.stats
    }

    /// Run until shutdown, an unrecoverable error, or the command channel closes
    pub async fn run(mut self) -> Result<EngineStats> {
        info!(identity = %self.state.session.identity, "engine task starting");
        self.publish();

        while self.running {
            tokio::select! {
                command = self.command_receiver.recv() => {
                    match command {
                        Some(command) => {
                            debug!(?command, "command received");
                            let result = self.state.handle_command(command);
                            if let Err(e) = self.complete("command", result).await {
                                error!("Unrecoverable error processing command, stopping engine: {}", e);
                                return Err(e);
                            }
                        }
                        None => {
                            info!("Command channel closed, shutting down");
                            break;
                        }
                    }
                }

                Some(event) = self.event_receiver.recv() => {
                    debug!(?event, "event received");
                    let result = self.state.handle_event(event);
                    if let Err(e) = self.complete("event", result).await {
                        error!("Unrecoverable error processing event, stopping engine: {}", e);
                        return Err(e);
                    }
                }
            }
        }

        info!(stats = ?self.state.stats, "engine task stopped");
        Ok(self.state.stats)
    }

    /// Carry out a step, or classify the error that prevented it.
    /// Only unrecoverable errors are returned.
    async fn complete(&mut self, input: &str, result: Result<Step>) -> Result<()> {
        let step = match result {
            Ok(step) => step,
            Err(e) if e.is_unrecoverable() => return Err(e),
            Err(HangoutError::Reconcile(e)) => {
                warn!(input, "inbound frame rejected: {}", e);
                self.publish();
                return Ok(());
            }
            Err(e) => {
                error!(input, "step dropped: {}", e);
                self.publish();
                return Ok(());
            }
        };

        for effect in step.effects {
            self.send_effect(effect).await?;
        }
        if let Some(navigation) = step.navigation {
            self.navigator.navigate(&navigation.peer, navigation.route);
        }
        if let Some(query) = step.search {
            self.spawn_search(query);
        }
        if step.shutdown {
            self.running = false;
        }
        self.publish();
        Ok(())
    }

    async fn send_effect(&mut self, effect: Effect) -> Result<()> {
        self.effect_sender
            .send(effect)
            .await
            .map_err(|_| HangoutError::channel_error("Failed to send effect to transport"))
    }

    fn spawn_search(&self, query: String) {
        let directory = self.directory.clone();
        let session = self.state.session.clone();
        let events = self.event_sender.clone();
        tokio::spawn(async move {
            let result = directory
                .find(&query, &session)
                .await
                .map_err(|e| e.to_string());
            if events
                .send(Event::SearchCompleted { query, result })
                .await
                .is_err()
            {
                debug!("engine gone before search completed");
            }
        });
    }

    fn publish(&self) {
        self.projection_sender
            .send_replace(self.state.projection().clone());
    }
}
