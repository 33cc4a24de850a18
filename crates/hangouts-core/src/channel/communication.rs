//! Channel Communication Types
//!
//! All communication with the engine task flows through these message types:
//! commands from the UI, events from the transport, effects back to the
//! transport.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::protocol::{Hangout, HangoutState};
use crate::types::Identity;

// ----------------------------------------------------------------------------
// Channel Lifecycle State
// ----------------------------------------------------------------------------

/// Lifecycle state of the duplex channel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelState {
    Connecting,
    Open,
    Closing,
    #[default]
    Closed,
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChannelState::Connecting => "Connecting",
            ChannelState::Open => "Open",
            ChannelState::Closing => "Closing",
            ChannelState::Closed => "Closed",
        };
        f.write_str(name)
    }
}

// ----------------------------------------------------------------------------
// Command: UI → Engine
// ----------------------------------------------------------------------------

/// Commands sent from the UI to the engine task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    /// Hydrate the projection from the durable store
    Load,
    /// Open the channel (replacing any live one)
    Connect,
    /// Close the channel
    Disconnect,
    /// Change the relationship with a peer and/or send a message
    SubmitIntent {
        peer: Identity,
        command: HangoutState,
        email: Option<String>,
        text: Option<String>,
    },
    /// Focus a conversation and mark it read
    OpenConversation { peer: Identity },
    /// Drop the focus
    CloseConversation,
    /// Draft text changed
    MessageTextChanged { text: String },
    /// Search for a peer, locally first
    Search { query: String },
    /// Stop the engine
    Shutdown,
}

// ----------------------------------------------------------------------------
// Event: Transport → Engine
// ----------------------------------------------------------------------------

/// Events delivered to the engine task. Transport events carry the id of the
/// connection that produced them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    ChannelOpened {
        connection_id: u64,
    },
    FrameReceived {
        connection_id: u64,
        frame: String,
    },
    ChannelClosing {
        connection_id: u64,
    },
    ChannelClosed {
        connection_id: u64,
        reason: Option<String>,
    },
    ChannelError {
        connection_id: u64,
        error: String,
    },
    /// Result of a peer search against the remote directory
    SearchCompleted {
        query: String,
        result: Result<Vec<Hangout>, String>,
    },
}

impl Event {
    /// Connection that produced the event, if it came from the transport
    pub fn connection_id(&self) -> Option<u64> {
        match self {
            Event::ChannelOpened { connection_id }
            | Event::FrameReceived { connection_id, .. }
            | Event::ChannelClosing { connection_id }
            | Event::ChannelClosed { connection_id, .. }
            | Event::ChannelError { connection_id, .. } => Some(*connection_id),
            Event::SearchCompleted { .. } => None,
        }
    }
}

// ----------------------------------------------------------------------------
// Effect: Engine → Transport
// ----------------------------------------------------------------------------

/// Side effects the transport task executes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    /// Drop any live connection and dial `url`
    Connect { connection_id: u64, url: String },
    /// Write one text frame
    Send { connection_id: u64, frame: String },
    /// Close the connection
    Close { connection_id: u64 },
}

impl Effect {
    pub fn connection_id(&self) -> u64 {
        match self {
            Effect::Connect { connection_id, .. }
            | Effect::Send { connection_id, .. }
            | Effect::Close { connection_id } => *connection_id,
        }
    }
}
