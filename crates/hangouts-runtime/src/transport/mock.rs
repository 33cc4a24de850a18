//! Scriptable transport for tests and offline use
//!
//! Records every effect it receives. The paired [`MockTransportHandle`]
//! plays the server: it opens and closes connections and pushes frames.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use hangouts_core::{Effect, EffectReceiver, Event, EventSender, HangoutError, Result};
use tracing::debug;

use super::TransportTask;

#[derive(Debug, Default)]
struct MockShared {
    event_sender: Option<EventSender>,
    connection_id: Option<u64>,
    effects: Vec<Effect>,
}

pub struct MockTransport {
    shared: Arc<Mutex<MockShared>>,
    effect_receiver: Option<EffectReceiver>,
    auto_open: bool,
}

impl MockTransport {
    /// A transport that waits for the handle to open each connection
    pub fn new() -> (Self, MockTransportHandle) {
        let shared = Arc::new(Mutex::new(MockShared::default()));
        let transport = Self {
            shared: shared.clone(),
            effect_receiver: None,
            auto_open: false,
        };
        (transport, MockTransportHandle { shared })
    }

    /// Report every connection as open as soon as it is dialed
    pub fn auto_open(mut self) -> Self {
        self.auto_open = true;
        self
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MockShared>> {
        self.shared
            .lock()
            .map_err(|_| HangoutError::channel_error("mock transport state poisoned"))
    }
}

#[async_trait]
impl TransportTask for MockTransport {
    fn attach_channels(
        &mut self,
        event_sender: EventSender,
        effect_receiver: EffectReceiver,
    ) -> Result<()> {
        self.lock()?.event_sender = Some(event_sender);
        self.effect_receiver = Some(effect_receiver);
        Ok(())
    }

    async fn run(&mut self) -> Result<()> {
        let mut effects = self
            .effect_receiver
            .take()
            .ok_or_else(|| HangoutError::channel_error("mock transport has no effect channel"))?;

        while let Some(effect) = effects.recv().await {
            debug!(?effect, "mock transport effect");
            let (reply, events) = {
                let mut shared = self.lock()?;
                shared.effects.push(effect.clone());
                let reply = match effect {
                    Effect::Connect { connection_id, .. } => {
                        shared.connection_id = Some(connection_id);
                        self.auto_open
                            .then_some(Event::ChannelOpened { connection_id })
                    }
                    Effect::Close { connection_id } => {
                        if shared.connection_id == Some(connection_id) {
                            shared.connection_id = None;
                        }
                        Some(Event::ChannelClosed {
                            connection_id,
                            reason: None,
                        })
                    }
                    Effect::Send { .. } => None,
                };
                (reply, shared.event_sender.clone())
            };

            if let (Some(event), Some(events)) = (reply, events) {
                events
                    .send(event)
                    .await
                    .map_err(|_| HangoutError::channel_error("engine event channel closed"))?;
            }
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Server side of a [`MockTransport`]; clones share state
#[derive(Debug, Clone)]
pub struct MockTransportHandle {
    shared: Arc<Mutex<MockShared>>,
}

impl MockTransportHandle {
    fn read<T>(&self, f: impl FnOnce(&MockShared) -> T) -> Option<T> {
        self.shared.lock().ok().map(|shared| f(&shared))
    }

    /// Id of the dialed connection, if one is live
    pub fn connection_id(&self) -> Option<u64> {
        self.read(|shared| shared.connection_id).flatten()
    }

    /// Every effect received so far
    pub fn effects(&self) -> Vec<Effect> {
        self.read(|shared| shared.effects.clone()).unwrap_or_default()
    }

    /// Text frames written to the wire, in order
    pub fn sent_frames(&self) -> Vec<String> {
        self.effects()
            .into_iter()
            .filter_map(|effect| match effect {
                Effect::Send { frame, .. } => Some(frame),
                _ => None,
            })
            .collect()
    }

    /// Wait until a connection has been dialed
    pub async fn wait_for_connection(&self, timeout: Duration) -> Option<u64> {
        self.poll(timeout, || self.connection_id()).await
    }

    /// Wait until at least `count` frames have been sent
    pub async fn wait_for_frames(&self, count: usize, timeout: Duration) -> Vec<String> {
        self.poll(timeout, || {
            let frames = self.sent_frames();
            (frames.len() >= count).then_some(frames)
        })
        .await
        .unwrap_or_else(|| self.sent_frames())
    }

    pub async fn open(&self) -> Result<()> {
        let connection_id = self.live_connection()?;
        self.emit(Event::ChannelOpened { connection_id }).await
    }

    pub async fn push_frame<T: Into<String>>(&self, frame: T) -> Result<()> {
        let connection_id = self.live_connection()?;
        self.push_frame_on(connection_id, frame).await
    }

    /// Push a frame tagged with an arbitrary connection id
    pub async fn push_frame_on<T: Into<String>>(&self, connection_id: u64, frame: T) -> Result<()> {
        self.emit(Event::FrameReceived {
            connection_id,
            frame: frame.into(),
        })
        .await
    }

    /// The server dropped the connection
    pub async fn drop_connection<T: Into<String>>(&self, reason: T) -> Result<()> {
        let connection_id = self.live_connection()?;
        if let Ok(mut shared) = self.shared.lock() {
            shared.connection_id = None;
        }
        self.emit(Event::ChannelClosed {
            connection_id,
            reason: Some(reason.into()),
        })
        .await
    }

    pub async fn fail<T: Into<String>>(&self, error: T) -> Result<()> {
        let connection_id = self.live_connection()?;
        self.emit(Event::ChannelError {
            connection_id,
            error: error.into(),
        })
        .await
    }

    fn live_connection(&self) -> Result<u64> {
        self.connection_id()
            .ok_or_else(|| HangoutError::channel_error("mock transport has no live connection"))
    }

    async fn emit(&self, event: Event) -> Result<()> {
        let sender = self
            .read(|shared| shared.event_sender.clone())
            .flatten()
            .ok_or_else(|| HangoutError::channel_error("mock transport is not attached"))?;
        sender
            .send(event)
            .await
            .map_err(|_| HangoutError::channel_error("engine event channel closed"))
    }

    async fn poll<T>(&self, timeout: Duration, mut check: impl FnMut() -> Option<T>) -> Option<T> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(value) = check() {
                return Some(value);
            }
            if tokio::time::Instant::now() >= deadline {
                return None;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}
