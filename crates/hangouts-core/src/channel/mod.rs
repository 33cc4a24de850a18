//! Channel Module
//!
//! Channel infrastructure between the UI, the engine task and the transport:
//! - `communication`: commands, events, effects and the channel lifecycle state
//! - `utils`: channel aliases and constructors

pub mod communication;
pub mod utils;

pub use communication::{ChannelState, Command, Effect, Event};
pub use utils::{
    create_command_channel, create_effect_channel, create_event_channel,
    create_projection_channel, CommandReceiver, CommandSender, EffectReceiver, EffectSender,
    EventReceiver, EventSender, ProjectionReceiver, ProjectionSender,
};
