//! Transport tasks
//!
//! A transport executes [`Effect`](hangouts_core::Effect)s from the engine and
//! reports what happened on the wire as [`Event`](hangouts_core::Event)s,
//! tagged with the connection id the engine assigned.

pub mod mock;
pub mod websocket;

use async_trait::async_trait;
use hangouts_core::{EffectReceiver, EventSender, Result};

pub use mock::{MockTransport, MockTransportHandle};
pub use websocket::WebSocketTransport;

#[async_trait]
pub trait TransportTask: Send {
    /// Attach the channels created by the builder. Called once, before `run`.
    fn attach_channels(
        &mut self,
        event_sender: EventSender,
        effect_receiver: EffectReceiver,
    ) -> Result<()>;

    /// Execute effects until the effect channel closes
    async fn run(&mut self) -> Result<()>;

    fn name(&self) -> &'static str;
}
