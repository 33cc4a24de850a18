//! Command and event handlers
//!
//! Each handler applies one input to the engine state and returns the step
//! the task has to carry out.

use hangouts_core::{
    Action, Effect, HangoutError, HangoutState, Identity, InboundFrame, Intent, Result,
};
use tracing::{debug, info, warn};

use super::state::{EngineState, Step};
use crate::lifecycle::LifecycleEvent;
use crate::outbound::Submission;
use crate::unread::UnreadTracker;

// ----------------------------------------------------------------------------
// Command Handlers
// ----------------------------------------------------------------------------

pub struct CommandHandlers;

impl CommandHandlers {
    /// Hydrate the projection from the durable store
    pub fn handle_load(state: &mut EngineState) -> Result<Step> {
        let synced = &mut state.synced;
        let hangouts = synced.hangouts()?;
        let mut unread = synced.unread()?;
        let dropped = UnreadTracker::retain_known(&mut unread, &hangouts);
        if dropped > 0 {
            warn!(dropped, "unread entries without a hangout removed");
            synced.commit_unread(unread.clone())?;
        }
        let queued = synced.offline()?.len();

        info!(
            hangouts = hangouts.len(),
            unread = unread.len(),
            queued,
            "projection hydrated"
        );
        synced.dispatch(Action::Loaded {
            hangouts,
            unread,
            queued,
        });
        Ok(Step::default())
    }

    /// Open the channel, replacing any live connection
    pub fn handle_connect(state: &mut EngineState) -> Result<Step> {
        let url = state.server.connection_url(&state.session.identity)?;
        let transition = state.lifecycle.begin_connect();
        if transition.from != transition.to {
            debug!(from = %transition.from, "channel connecting");
        }
        state.synced.dispatch(Action::ChannelConnecting);
        Ok(Step::effect(Effect::Connect {
            connection_id: state.lifecycle.connection_id(),
            url: url.to_string(),
        }))
    }

    pub fn handle_disconnect(state: &mut EngineState) -> Result<Step> {
        let Some(effect) = state.lifecycle.close_effect() else {
            debug!(state = %state.lifecycle.state(), "nothing to disconnect");
            return Ok(Step::default());
        };
        state.lifecycle.apply(LifecycleEvent::Closing)?;
        state.synced.dispatch(Action::ChannelClosing);
        Ok(Step::effect(effect))
    }

    pub fn handle_submit_intent(
        state: &mut EngineState,
        peer: Identity,
        command: HangoutState,
        email: Option<String>,
        text: Option<String>,
    ) -> Result<Step> {
        if peer.is_empty() {
            warn!("intent without a peer dropped");
            return Ok(Step::default());
        }
        if peer == state.session.identity {
            warn!(%peer, "intent addressed to ourselves dropped");
            return Ok(Step::default());
        }

        let mut intent = Intent::new(peer, command, state.time_source.now()).with_email(email);
        if let Some(text) = text.filter(|t| !t.trim().is_empty()) {
            intent = intent.with_message(text);
        }

        let submission = state
            .outbound
            .submit(&mut state.synced, &state.lifecycle, intent)?;
        match submission {
            Submission::Sent(effect) => {
                state.stats.intents_sent += 1;
                Ok(Step::effect(effect))
            }
            Submission::Buffered => {
                state.stats.intents_buffered += 1;
                Ok(Step::default())
            }
        }
    }

    /// Focus a conversation and mark it read
    pub fn handle_open_conversation(state: &mut EngineState, peer: Identity) -> Result<Step> {
        let synced = &mut state.synced;
        let known = synced.hangouts()?.into_iter().find(|h| h.peer == peer);
        let hangout = match known {
            Some(hangout) => hangout,
            None => match synced.state().search_results.iter().find(|h| h.peer == peer) {
                Some(found) => found.clone(),
                None => {
                    warn!(%peer, "no hangout to open");
                    return Ok(Step::default());
                }
            },
        };

        let messages = synced.messages(&peer)?;
        synced.dispatch(Action::HangoutSelected { hangout, messages });
        UnreadTracker::clear(synced, &peer)?;
        Ok(Step::default())
    }

    pub fn handle_close_conversation(state: &mut EngineState) -> Step {
        state.synced.dispatch(Action::HangoutDeselected);
        Step::default()
    }

    pub fn handle_message_text_changed(state: &mut EngineState, text: String) -> Step {
        state.synced.dispatch(Action::MessageTextChanged { text });
        Step::default()
    }

    /// Search local hangouts first; fall back to the remote directory
    pub fn handle_search(state: &mut EngineState, query: String) -> Result<Step> {
        let synced = &mut state.synced;
        synced.dispatch(Action::SearchChanged {
            text: query.clone(),
        });

        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            synced.dispatch(Action::FetchSucceeded {
                hangouts: Vec::new(),
            });
            return Ok(Step::default());
        }

        let local: Vec<_> = synced
            .hangouts()?
            .into_iter()
            .filter(|h| h.peer.to_lowercase().contains(&needle))
            .collect();
        if !local.is_empty() {
            debug!(query = %query, found = local.len(), "search answered locally");
            synced.dispatch(Action::FetchSucceeded { hangouts: local });
            return Ok(Step::default());
        }

        synced.dispatch(Action::FetchStarted);
        Ok(Step {
            search: Some(query),
            ..Step::default()
        })
    }

    pub fn handle_shutdown(state: &mut EngineState) -> Step {
        info!("shutdown requested");
        Step {
            effects: state.lifecycle.close_effect().into_iter().collect(),
            shutdown: true,
            ..Step::default()
        }
    }
}

// ----------------------------------------------------------------------------
// Event Handlers
// ----------------------------------------------------------------------------

pub struct EventHandlers;

impl EventHandlers {
    /// Channel reached Open: publish readiness, then replay the offline buffer
    pub fn handle_opened(state: &mut EngineState) -> Result<Step> {
        let transition = state.lifecycle.apply(LifecycleEvent::Opened)?;
        state.synced.dispatch(Action::ChannelOpened);
        info!(
            connection_id = state.lifecycle.connection_id(),
            generation = state.lifecycle.generation(),
            "channel open"
        );

        if !transition.opened {
            return Ok(Step::default());
        }
        let effects = state.outbound.flush(&mut state.synced, &state.lifecycle)?;
        state.stats.intents_replayed += effects.len() as u64;
        Ok(Step {
            effects,
            ..Step::default()
        })
    }

    /// Decode and reconcile one inbound frame. Malformed frames change nothing.
    pub fn handle_frame(state: &mut EngineState, frame: &str) -> Result<Step> {
        let frame = match InboundFrame::decode(frame) {
            Ok(frame) => frame,
            Err(e) => {
                state.stats.frames_rejected += 1;
                return Err(HangoutError::Reconcile(e));
            }
        };
        let outcome = state.reconciler.reconcile(&mut state.synced, frame)?;
        state.stats.frames_reconciled += 1;
        Ok(Step {
            navigation: outcome.navigation,
            ..Step::default()
        })
    }

    pub fn handle_closing(state: &mut EngineState) -> Result<Step> {
        state.lifecycle.apply(LifecycleEvent::Closing)?;
        state.synced.dispatch(Action::ChannelClosing);
        Ok(Step::default())
    }

    pub fn handle_closed(state: &mut EngineState, reason: Option<String>) -> Result<Step> {
        let transition = state.lifecycle.apply(LifecycleEvent::Closed {
            reason: reason.clone(),
        })?;
        if transition.changed() {
            state.synced.dispatch(Action::ChannelClosed);
        }
        info!(reason = reason.as_deref().unwrap_or("none"), "channel closed");
        Ok(Step::default())
    }

    pub fn handle_error(state: &mut EngineState, error: String) -> Result<Step> {
        warn!(%error, state = %state.lifecycle.state(), "channel error");
        state.lifecycle.apply(LifecycleEvent::Error {
            error: error.clone(),
        })?;
        state.synced.dispatch(Action::ChannelError { error });
        Ok(Step::default())
    }

    /// Remote search finished; results for an outdated query are dropped
    pub fn handle_search_completed(
        state: &mut EngineState,
        query: String,
        result: std::result::Result<Vec<hangouts_core::Hangout>, String>,
    ) -> Step {
        if state.synced.state().search != query {
            debug!(query = %query, "stale search result dropped");
            return Step::default();
        }
        match result {
            Ok(hangouts) => state.synced.dispatch(Action::FetchSucceeded { hangouts }),
            Err(error) => {
                warn!(query = %query, %error, "peer search failed");
                state.synced.dispatch(Action::FetchFailed { error });
            }
        }
        Step::default()
    }
}
