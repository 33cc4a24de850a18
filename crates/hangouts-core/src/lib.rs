//! Hangouts Core
//!
//! Data model, wire codec, durable store and projection for the hangouts
//! synchronization engine. Networking and the engine loop live in
//! `hangouts-runtime`.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod channel;
pub mod config;
pub mod errors;
pub mod protocol;
pub mod storage;
pub mod store;
pub mod types;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use channel::{
    create_command_channel, create_effect_channel, create_event_channel,
    create_projection_channel, ChannelState, Command, CommandReceiver, CommandSender, Effect,
    EffectReceiver, EffectSender, Event, EventReceiver, EventSender, ProjectionReceiver,
    ProjectionSender,
};
pub use config::{ChannelConfig, HangoutsConfig, ServerConfig, StorageBackend, StorageConfig};
pub use errors::{
    ConnectionError, FetchError, HangoutError, LifecycleError, ReconcileError, Result,
    StorageError,
};
pub use protocol::{
    FeatureRoute, Hangout, HangoutState, InboundFrame, Intent, Message, MessageBody,
    OutboundFrame,
};
pub use storage::{DurableStore, FileStore, HangoutRepository, MemoryStore, RecordingStore};
pub use store::{Action, HangoutStore, Projection};
pub use types::{Identity, ManualTimeSource, SystemTimeSource, TimeSource, Timestamp};
