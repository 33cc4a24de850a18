//! WebSocket transport
//!
//! One task per connection. A `Connect` effect aborts any live connection
//! and dials the new one; frames for a connection that is no longer current
//! are dropped.
//!
//! The connection task never stops writing while it waits for the engine:
//! inbound frames queue in the task (up to `INBOUND_BACKLOG`, after which it
//! stops reading the socket) and are forwarded as event slots free up. The
//! engine may block on a full effect channel while it replays the offline
//! buffer, so a task that blocked on the event channel instead would close
//! a cycle of full channels.

use std::collections::VecDeque;
use std::fmt::Display;

use async_trait::async_trait;
use futures::{Sink, SinkExt, Stream, StreamExt};
use hangouts_core::{
    Effect, EffectReceiver, Event, EventSender, HangoutError, Result,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tracing::{debug, info, warn};

use super::TransportTask;

const OUTGOING_BUFFER: usize = 64;
/// Inbound frames held while the engine is busy
const INBOUND_BACKLOG: usize = 256;

/// Live connection owned by the transport
struct Connection {
    id: u64,
    outgoing: mpsc::Sender<String>,
    task: JoinHandle<()>,
}

#[derive(Default)]
pub struct WebSocketTransport {
    event_sender: Option<EventSender>,
    effect_receiver: Option<EffectReceiver>,
    connection: Option<Connection>,
}

impl WebSocketTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn connect(&mut self, events: &EventSender, connection_id: u64, url: String) {
        if let Some(old) = self.connection.take() {
            debug!(connection_id = old.id, "replacing live connection");
            old.task.abort();
        }
        let (outgoing, receiver) = mpsc::channel(OUTGOING_BUFFER);
        let task = tokio::spawn(run_connection(
            connection_id,
            url,
            events.clone(),
            receiver,
        ));
        self.connection = Some(Connection {
            id: connection_id,
            outgoing,
            task,
        });
    }

    async fn send(&self, connection_id: u64, frame: String) {
        match &self.connection {
            Some(connection) if connection.id == connection_id => {
                if connection.outgoing.send(frame).await.is_err() {
                    warn!(connection_id, "connection task gone, frame dropped");
                }
            }
            _ => warn!(connection_id, "no such connection, frame dropped"),
        }
    }

    fn close(&mut self, connection_id: u64) {
        match self.connection.take() {
            // dropping the sender makes the connection task close the socket
            Some(connection) if connection.id == connection_id => drop(connection.outgoing),
            other => self.connection = other,
        }
    }
}

#[async_trait]
impl TransportTask for WebSocketTransport {
    fn attach_channels(
        &mut self,
        event_sender: EventSender,
        effect_receiver: EffectReceiver,
    ) -> Result<()> {
        self.event_sender = Some(event_sender);
        self.effect_receiver = Some(effect_receiver);
        Ok(())
    }

    async fn run(&mut self) -> Result<()> {
        let events = self
            .event_sender
            .clone()
            .ok_or_else(|| HangoutError::channel_error("WebSocket transport has no event channel"))?;
        let mut effects = self
            .effect_receiver
            .take()
            .ok_or_else(|| HangoutError::channel_error("WebSocket transport has no effect channel"))?;

        info!("WebSocket transport starting");
        while let Some(effect) = effects.recv().await {
            match effect {
                Effect::Connect { connection_id, url } => {
                    info!(connection_id, %url, "dialing");
                    self.connect(&events, connection_id, url);
                }
                Effect::Send {
                    connection_id,
                    frame,
                } => self.send(connection_id, frame).await,
                Effect::Close { connection_id } => self.close(connection_id),
            }
        }

        if let Some(connection) = self.connection.take() {
            connection.task.abort();
        }
        info!("WebSocket transport stopped");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "websocket"
    }
}

/// Dial `url` and drive the socket until either side closes it
async fn run_connection(
    connection_id: u64,
    url: String,
    events: EventSender,
    outgoing: mpsc::Receiver<String>,
) {
    let stream = match tokio_tungstenite::connect_async(url.as_str()).await {
        Ok((stream, _response)) => stream,
        Err(e) => {
            let error = format!("failed to connect to {url}: {e}");
            let _ = events
                .send(Event::ChannelError {
                    connection_id,
                    error: error.clone(),
                })
                .await;
            let _ = events
                .send(Event::ChannelClosed {
                    connection_id,
                    reason: Some(error),
                })
                .await;
            return;
        }
    };

    if events
        .send(Event::ChannelOpened { connection_id })
        .await
        .is_err()
    {
        return;
    }
    let (write, read) = stream.split();
    drive(connection_id, write, read, events, outgoing).await;
}

/// Pump frames between an open socket and the engine channels
async fn drive<W, R, E>(
    connection_id: u64,
    mut write: W,
    mut read: R,
    events: EventSender,
    mut outgoing: mpsc::Receiver<String>,
) where
    W: Sink<WsMessage> + Unpin,
    W::Error: Display,
    R: Stream<Item = std::result::Result<WsMessage, E>> + Unpin,
    E: Display,
{
    let mut inbound: VecDeque<String> = VecDeque::new();
    let mut trailing: Vec<Event> = Vec::new();

    let reason = loop {
        tokio::select! {
            frame = outgoing.recv() => match frame {
                Some(text) => {
                    if let Err(e) = write.send(WsMessage::Text(text)).await {
                        trailing.push(Event::ChannelError { connection_id, error: e.to_string() });
                        break Some(e.to_string());
                    }
                }
                None => {
                    let _ = write.send(WsMessage::Close(None)).await;
                    break None;
                }
            },
            permit = events.reserve(), if !inbound.is_empty() => match permit {
                Ok(permit) => {
                    if let Some(frame) = inbound.pop_front() {
                        permit.send(Event::FrameReceived { connection_id, frame });
                    }
                }
                Err(_) => return,
            },
            incoming = read.next(), if inbound.len() < INBOUND_BACKLOG => match incoming {
                Some(Ok(WsMessage::Text(frame))) => inbound.push_back(frame),
                Some(Ok(WsMessage::Close(_))) => {
                    trailing.push(Event::ChannelClosing { connection_id });
                    break Some("closed by server".to_string());
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    trailing.push(Event::ChannelError { connection_id, error: e.to_string() });
                    break Some(e.to_string());
                }
                None => break Some("stream ended".to_string()),
            },
        }
    };

    // senders fail fast from here on instead of waiting for a dead socket
    drop(outgoing);
    if !inbound.is_empty() {
        debug!(connection_id, pending = inbound.len(), "forwarding frames after close");
    }
    let frames = inbound
        .into_iter()
        .map(|frame| Event::FrameReceived {
            connection_id,
            frame,
        });
    for event in frames
        .chain(trailing)
        .chain(std::iter::once(Event::ChannelClosed {
            connection_id,
            reason,
        }))
    {
        if events.send(event).await.is_err() {
            return;
        }
    }
}
