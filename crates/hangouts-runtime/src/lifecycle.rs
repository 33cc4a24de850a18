//! Channel Lifecycle State Machine
//!
//! Tracks the duplex channel through Connecting → Open → Closing → Closed.
//! Every connection attempt gets a fresh id so events from a replaced
//! connection can be told apart, and every entry into Open starts a new
//! generation for offline replay.

use std::fmt;

use hangouts_core::{ChannelState, ConnectionError, Effect, LifecycleError};

// ----------------------------------------------------------------------------
// Lifecycle Events
// ----------------------------------------------------------------------------

/// Inputs that drive the lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// The transport finished the handshake
    Opened,
    /// Close requested or started by the peer
    Closing,
    /// The connection is gone
    Closed { reason: Option<String> },
    /// The transport reported a failure; the state is left as is
    Error { error: String },
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleEvent::Opened => f.write_str("Opened"),
            LifecycleEvent::Closing => f.write_str("Closing"),
            LifecycleEvent::Closed { .. } => f.write_str("Closed"),
            LifecycleEvent::Error { .. } => f.write_str("Error"),
        }
    }
}

/// Outcome of a successful transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelTransition {
    pub from: ChannelState,
    pub to: ChannelState,
    /// Set when this transition entered Open
    pub opened: bool,
}

impl ChannelTransition {
    pub fn changed(&self) -> bool {
        self.from != self.to
    }
}

// ----------------------------------------------------------------------------
// Channel Lifecycle
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct ChannelLifecycle {
    state: ChannelState,
    connection_id: u64,
    generation: u64,
    last_error: Option<String>,
}

impl ChannelLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == ChannelState::Open
    }

    /// Id of the current connection attempt (0 before the first connect)
    pub fn connection_id(&self) -> u64 {
        self.connection_id
    }

    /// Number of times the channel has entered Open
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Whether an event tagged with `connection_id` belongs to the live connection
    pub fn is_current(&self, connection_id: u64) -> bool {
        self.connection_id != 0 && self.connection_id == connection_id
    }

    /// Start a new connection attempt from any state.
    ///
    /// A live connection is replaced wholesale: the caller is expected to
    /// dial the returned id, and events from the previous id become stale.
    pub fn begin_connect(&mut self) -> ChannelTransition {
        let from = self.state;
        self.connection_id += 1;
        self.state = ChannelState::Connecting;
        self.last_error = None;
        ChannelTransition {
            from,
            to: self.state,
            opened: false,
        }
    }

    /// Apply a transport event to the current connection
    pub fn apply(&mut self, event: LifecycleEvent) -> Result<ChannelTransition, LifecycleError> {
        let from = self.state;
        let to = match (from, &event) {
            (ChannelState::Connecting, LifecycleEvent::Opened) => ChannelState::Open,
            (ChannelState::Connecting | ChannelState::Open, LifecycleEvent::Closing) => {
                ChannelState::Closing
            }
            (_, LifecycleEvent::Closed { .. }) => ChannelState::Closed,
            (state, LifecycleEvent::Error { error }) => {
                self.last_error = Some(error.clone());
                state
            }
            (from, event) => {
                return Err(LifecycleError {
                    from,
                    event: event.to_string(),
                })
            }
        };

        let opened = to == ChannelState::Open && from != ChannelState::Open;
        if opened {
            self.generation += 1;
            self.last_error = None;
        }
        self.state = to;
        Ok(ChannelTransition { from, to, opened })
    }

    /// Frame an outbound payload for the live connection. Only defined while Open.
    pub fn send_frame(&self, frame: String) -> Result<Effect, ConnectionError> {
        if !self.is_open() {
            return Err(ConnectionError::NotOpen { state: self.state });
        }
        Ok(Effect::Send {
            connection_id: self.connection_id,
            frame,
        })
    }

    /// Close effect for the live connection, if there is one
    pub fn close_effect(&self) -> Option<Effect> {
        match self.state {
            ChannelState::Connecting | ChannelState::Open => Some(Effect::Close {
                connection_id: self.connection_id,
            }),
            ChannelState::Closing | ChannelState::Closed => None,
        }
    }
}
