//! Hangout Records
//!
//! The per-peer relationship record, the per-peer message log entries, and
//! the outbound intent that produces both optimistically.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::state::HangoutState;
use crate::types::{Identity, Timestamp};

// ----------------------------------------------------------------------------
// Message Body
// ----------------------------------------------------------------------------

/// Message payload as carried inside hangouts and intents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageBody {
    pub text: String,
    pub timestamp: Timestamp,
}

// ----------------------------------------------------------------------------
// Hangout
// ----------------------------------------------------------------------------

/// Local record of the relationship with one peer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hangout {
    #[serde(rename = "username")]
    pub peer: Identity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub state: HangoutState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<MessageBody>,
    pub timestamp: Timestamp,
    #[serde(default)]
    pub delivered: bool,
    #[serde(default)]
    pub read: bool,
}

impl Hangout {
    pub fn new(peer: Identity, state: HangoutState, timestamp: Timestamp) -> Self {
        Self {
            peer,
            email: None,
            state,
            message: None,
            timestamp,
            delivered: false,
            read: false,
        }
    }

    pub fn with_message<T: Into<String>>(mut self, text: T) -> Self {
        self.message = Some(MessageBody {
            text: text.into(),
            timestamp: self.timestamp,
        });
        self
    }
}

// ----------------------------------------------------------------------------
// Message
// ----------------------------------------------------------------------------

/// Entry in a per-peer message log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub text: String,
    pub timestamp: Timestamp,
    #[serde(rename = "username")]
    pub author: Identity,
    #[serde(default)]
    pub delivered: bool,
    #[serde(default)]
    pub read: bool,
    /// Locally synthesized notice, never transmitted
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub system: bool,
}

impl Message {
    /// Message received from the peer inside a hangout push
    pub fn from_body(body: &MessageBody, author: Identity, read: bool) -> Self {
        Self {
            text: body.text.clone(),
            timestamp: body.timestamp,
            author,
            delivered: true,
            read,
            system: false,
        }
    }

    /// Locally generated notice
    pub fn system<T: Into<String>>(text: T, author: Identity, timestamp: Timestamp) -> Self {
        Self {
            text: text.into(),
            timestamp,
            author,
            delivered: true,
            read: true,
            system: true,
        }
    }
}

// ----------------------------------------------------------------------------
// Intent
// ----------------------------------------------------------------------------

/// Locally originated request that has not been acknowledged yet.
///
/// Intents buffered while the channel is down are the offline entries; they
/// are removed from the buffer by `id`, while `timestamp` is what the server
/// echoes back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intent {
    pub id: Uuid,
    #[serde(rename = "username")]
    pub peer: Identity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<MessageBody>,
    pub command: HangoutState,
    pub timestamp: Timestamp,
}

impl Intent {
    pub fn new(peer: Identity, command: HangoutState, timestamp: Timestamp) -> Self {
        Self {
            id: Uuid::new_v4(),
            peer,
            email: None,
            message: None,
            command,
            timestamp,
        }
    }

    pub fn with_message<T: Into<String>>(mut self, text: T) -> Self {
        self.message = Some(MessageBody {
            text: text.into(),
            timestamp: self.timestamp,
        });
        self
    }

    pub fn with_email(mut self, email: Option<String>) -> Self {
        self.email = email;
        self
    }

    /// Optimistic hangout written before the server confirms anything
    pub fn to_hangout(&self) -> Hangout {
        Hangout {
            peer: self.peer.clone(),
            email: self.email.clone(),
            state: self.command,
            message: self.message.clone(),
            timestamp: self.timestamp,
            delivered: false,
            read: true,
        }
    }

    /// Optimistic message-log entry authored by `me`
    pub fn to_message(&self, me: &Identity) -> Option<Message> {
        self.message.as_ref().map(|body| Message {
            text: body.text.clone(),
            timestamp: body.timestamp,
            author: me.clone(),
            delivered: false,
            read: true,
            system: false,
        })
    }
}
