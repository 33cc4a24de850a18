//! Projection actions
//!
//! The closed vocabulary of transitions the projection accepts.

use crate::protocol::{Hangout, Intent, Message};
use crate::types::Identity;

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Hydrated from the durable store
    Loaded {
        hangouts: Vec<Hangout>,
        unread: Vec<Hangout>,
        queued: usize,
    },
    /// A conversation was focused
    HangoutSelected {
        hangout: Hangout,
        messages: Vec<Message>,
    },
    /// Focus dropped
    HangoutDeselected,
    SearchChanged {
        text: String,
    },
    FetchStarted,
    FetchSucceeded {
        hangouts: Vec<Hangout>,
    },
    FetchFailed {
        error: String,
    },
    MessageTextChanged {
        text: String,
    },
    ChannelConnecting,
    ChannelOpened,
    ChannelClosing,
    ChannelClosed,
    ChannelError {
        error: String,
    },
    SendingStarted {
        intent: Intent,
    },
    SendingFulfilled,
    MessagesUpdated {
        peer: Identity,
        messages: Vec<Message>,
    },
    HangoutsUpdated {
        hangouts: Vec<Hangout>,
    },
    UnreadUpdated {
        unread: Vec<Hangout>,
    },
    /// The offline buffer now holds `queued` intents
    OfflineUpdated {
        queued: usize,
    },
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Loaded { .. } => "Loaded",
            Action::HangoutSelected { .. } => "HangoutSelected",
            Action::HangoutDeselected => "HangoutDeselected",
            Action::SearchChanged { .. } => "SearchChanged",
            Action::FetchStarted => "FetchStarted",
            Action::FetchSucceeded { .. } => "FetchSucceeded",
            Action::FetchFailed { .. } => "FetchFailed",
            Action::MessageTextChanged { .. } => "MessageTextChanged",
            Action::ChannelConnecting => "ChannelConnecting",
            Action::ChannelOpened => "ChannelOpened",
            Action::ChannelClosing => "ChannelClosing",
            Action::ChannelClosed => "ChannelClosed",
            Action::ChannelError { .. } => "ChannelError",
            Action::SendingStarted { .. } => "SendingStarted",
            Action::SendingFulfilled => "SendingFulfilled",
            Action::MessagesUpdated { .. } => "MessagesUpdated",
            Action::HangoutsUpdated { .. } => "HangoutsUpdated",
            Action::UnreadUpdated { .. } => "UnreadUpdated",
            Action::OfflineUpdated { .. } => "OfflineUpdated",
        }
    }
}
