//! Hangouts protocol: relationship states, records and the wire format

pub mod hangout;
pub mod state;
pub mod wire;

pub use hangout::{Hangout, Intent, Message, MessageBody};
pub use state::{FeatureRoute, HangoutState};
pub use wire::{InboundFrame, OutboundFrame};
