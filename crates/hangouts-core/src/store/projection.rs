//! Hangout projection
//!
//! The in-memory state the UI reads, and the pure transition function over
//! [`Action`].

use serde::Serialize;

use super::action::Action;
use crate::channel::ChannelState;
use crate::protocol::{Hangout, Intent, Message};
use crate::types::Identity;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Projection {
    pub hangouts: Vec<Hangout>,
    /// Focused hangout
    pub hangout: Option<Hangout>,
    /// Message log of the focused hangout
    pub messages: Vec<Message>,
    pub unread: Vec<Hangout>,
    pub search: String,
    pub search_results: Vec<Hangout>,
    pub loading: bool,
    pub error: Option<String>,
    pub message_text: String,
    pub channel: ChannelState,
    pub channel_error: Option<String>,
    /// An intent has been created but not yet handed to the channel
    pub sending: bool,
    pub last_intent: Option<Intent>,
    /// Intents waiting in the offline buffer
    pub queued: usize,
    /// The durable store has been read back
    pub loaded: bool,
}

impl Projection {
    /// Channel-ready flag
    pub fn ready(&self) -> bool {
        self.channel == ChannelState::Open
    }

    pub fn focused_peer(&self) -> Option<&Identity> {
        self.hangout.as_ref().map(|h| &h.peer)
    }

    pub fn find(&self, peer: &Identity) -> Option<&Hangout> {
        self.hangouts.iter().find(|h| &h.peer == peer)
    }
}

/// Apply one action
pub fn reduce(mut state: Projection, action: Action) -> Projection {
    match action {
        Action::Loaded {
            hangouts,
            unread,
            queued,
        } => {
            state.hangouts = hangouts;
            state.unread = unread;
            state.queued = queued;
            state.sending = queued > 0;
            state.loaded = true;
        }
        Action::HangoutSelected { hangout, messages } => {
            state.hangout = Some(hangout);
            state.messages = messages;
            state.message_text.clear();
        }
        Action::HangoutDeselected => {
            state.hangout = None;
            state.messages.clear();
        }
        Action::SearchChanged { text } => {
            state.search = text;
            state.search_results.clear();
        }
        Action::FetchStarted => {
            state.loading = true;
            state.error = None;
        }
        Action::FetchSucceeded { hangouts } => {
            state.loading = false;
            state.search_results = hangouts;
        }
        Action::FetchFailed { error } => {
            state.loading = false;
            state.error = Some(error);
        }
        Action::MessageTextChanged { text } => {
            state.message_text = text;
        }
        Action::ChannelConnecting => {
            state.channel = ChannelState::Connecting;
        }
        Action::ChannelOpened => {
            state.channel = ChannelState::Open;
            state.channel_error = None;
        }
        Action::ChannelClosing => {
            state.channel = ChannelState::Closing;
        }
        Action::ChannelClosed => {
            state.channel = ChannelState::Closed;
        }
        Action::ChannelError { error } => {
            state.channel_error = Some(error);
        }
        Action::SendingStarted { intent } => {
            state.sending = true;
            state.message_text.clear();
            state.last_intent = Some(intent);
        }
        Action::SendingFulfilled => {
            state.sending = false;
        }
        Action::MessagesUpdated { peer, messages } => {
            if state.focused_peer() == Some(&peer) {
                state.messages = messages;
            }
        }
        Action::HangoutsUpdated { hangouts } => {
            if let Some(focused) = state.hangout.as_mut() {
                if let Some(fresh) = hangouts.iter().find(|h| h.peer == focused.peer) {
                    *focused = fresh.clone();
                }
            }
            state.hangouts = hangouts;
        }
        Action::UnreadUpdated { unread } => {
            state.unread = unread;
        }
        Action::OfflineUpdated { queued } => {
            state.queued = queued;
        }
    }
    state
}
