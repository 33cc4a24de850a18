//! Hangouts Runtime
//!
//! The synchronization engine: a single task that owns the durable store and
//! the projection, reconciles server pushes, replays the offline buffer when
//! the channel opens, and drives a transport task through effects.

pub mod builder;
pub mod collaborators;
pub mod engine;
pub mod lifecycle;
pub mod outbound;
pub mod reconciler;
pub mod sync;
pub mod transport;
pub mod unread;

pub use builder::{open_store, EngineBuilder, EngineHandle};
pub use collaborators::{
    HttpPeerDirectory, Navigator, NoopNavigator, OfflineDirectory, PeerDirectory,
    RecordingNavigator, Session,
};
pub use engine::{EngineState, EngineStats, EngineTask, Step};
pub use lifecycle::{ChannelLifecycle, ChannelTransition, LifecycleEvent};
pub use outbound::{OutboundQueue, Submission};
pub use reconciler::{Navigation, ReconcileOutcome, Reconciler};
pub use sync::{Checkpoint, SyncedStore};
pub use transport::{MockTransport, MockTransportHandle, TransportTask, WebSocketTransport};
pub use unread::UnreadTracker;
