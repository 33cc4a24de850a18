//! Channel Utilities
//!
//! Type aliases and constructors for the channels that connect the UI, the
//! engine task and the transport task.

use tokio::sync::{mpsc, watch};

use crate::channel::communication::{Command, Effect, Event};
use crate::config::ChannelConfig;
use crate::store::Projection;

pub type CommandSender = mpsc::Sender<Command>;
pub type CommandReceiver = mpsc::Receiver<Command>;
pub type EventSender = mpsc::Sender<Event>;
pub type EventReceiver = mpsc::Receiver<Event>;
pub type EffectSender = mpsc::Sender<Effect>;
pub type EffectReceiver = mpsc::Receiver<Effect>;
pub type ProjectionSender = watch::Sender<Projection>;
pub type ProjectionReceiver = watch::Receiver<Projection>;

// ----------------------------------------------------------------------------
// Channel Creation Utilities
// ----------------------------------------------------------------------------

/// Create bounded command channel (UI → Engine)
pub fn create_command_channel(config: &ChannelConfig) -> (CommandSender, CommandReceiver) {
    mpsc::channel(config.command_buffer_size)
}

/// Create bounded event channel (Transport → Engine)
pub fn create_event_channel(config: &ChannelConfig) -> (EventSender, EventReceiver) {
    mpsc::channel(config.event_buffer_size)
}

/// Create bounded effect channel (Engine → Transport)
pub fn create_effect_channel(config: &ChannelConfig) -> (EffectSender, EffectReceiver) {
    mpsc::channel(config.effect_buffer_size)
}

/// Create the projection watch channel (Engine → UI); readers always see the
/// latest snapshot
pub fn create_projection_channel(initial: Projection) -> (ProjectionSender, ProjectionReceiver) {
    watch::channel(initial)
}
