//! Wire Format
//!
//! JSON frames exchanged over the hangouts channel. One outbound object per
//! intent; inbound objects are tagged by `type`.

use serde::{Deserialize, Serialize};

use super::hangout::{Hangout, Intent, MessageBody};
use super::state::HangoutState;
use crate::errors::ReconcileError;
use crate::types::{Identity, Timestamp};

// ----------------------------------------------------------------------------
// Outbound
// ----------------------------------------------------------------------------

/// Frame sent to the server for one intent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundFrame {
    pub username: Identity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<MessageBody>,
    pub command: HangoutState,
    pub timestamp: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offline: Option<bool>,
}

impl OutboundFrame {
    /// Build the frame for an intent; `offline` marks replays from the buffer
    pub fn from_intent(intent: &Intent, offline: bool) -> Self {
        Self {
            username: intent.peer.clone(),
            email: intent.email.clone(),
            message: intent.message.clone(),
            command: intent.command,
            timestamp: intent.timestamp,
            offline: offline.then_some(true),
        }
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// ----------------------------------------------------------------------------
// Inbound
// ----------------------------------------------------------------------------

/// Server push, tagged by `type`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum InboundFrame {
    /// The peer confirmed one of our intents
    #[serde(rename = "ACKHOWLEDGEMENT")]
    Acknowledgement { hangout: Hangout },
    /// The peer pushed a relationship event or message
    #[serde(rename = "HANGOUT")]
    Hangout { hangout: Hangout },
    /// Catch-up delivered on reconnect
    #[serde(rename = "UNREAD_HANGOUTS")]
    UnreadBatch { hangouts: Vec<Hangout> },
    /// Confirmation of an intent that was replayed from the offline buffer
    #[serde(rename = "OFFLINE_ACKN")]
    OfflineAcknowledgement { hangout: Hangout },
}

impl InboundFrame {
    /// Parse and validate a raw frame. Nothing is applied if this fails.
    pub fn decode(text: &str) -> Result<Self, ReconcileError> {
        let frame: InboundFrame =
            serde_json::from_str(text).map_err(|e| ReconcileError::MalformedFrame {
                reason: e.to_string(),
            })?;
        if frame.hangouts().any(|h| h.peer.is_empty()) {
            return Err(ReconcileError::EmptyPeer);
        }
        Ok(frame)
    }

    /// Wire tag of the frame
    pub fn kind(&self) -> &'static str {
        match self {
            InboundFrame::Acknowledgement { .. } => "ACKHOWLEDGEMENT",
            InboundFrame::Hangout { .. } => "HANGOUT",
            InboundFrame::UnreadBatch { .. } => "UNREAD_HANGOUTS",
            InboundFrame::OfflineAcknowledgement { .. } => "OFFLINE_ACKN",
        }
    }

    /// All hangouts carried by the frame
    pub fn hangouts(&self) -> impl Iterator<Item = &Hangout> {
        let slice: &[Hangout] = match self {
            InboundFrame::Acknowledgement { hangout }
            | InboundFrame::Hangout { hangout }
            | InboundFrame::OfflineAcknowledgement { hangout } => std::slice::from_ref(hangout),
            InboundFrame::UnreadBatch { hangouts } => hangouts,
        };
        slice.iter()
    }
}
