//! Engine Builder API
//!
//! Wires the engine task to a transport and hands back a handle for sending
//! commands and watching the projection.

use std::sync::Arc;
use std::time::Duration;

use hangouts_core::{
    create_command_channel, create_effect_channel, create_event_channel,
    create_projection_channel, Command, CommandSender, DurableStore, FileStore, HangoutError,
    HangoutRepository, HangoutsConfig, Identity, MemoryStore, Projection,
    ProjectionReceiver, Result, StorageBackend, SystemTimeSource, TimeSource,
};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::collaborators::{
    HttpPeerDirectory, Navigator, NoopNavigator, OfflineDirectory, PeerDirectory, Session,
};
use crate::engine::{EngineState, EngineStats, EngineTask};
use crate::transport::{TransportTask, WebSocketTransport};

// ----------------------------------------------------------------------------
// Storage
// ----------------------------------------------------------------------------

/// Open the durable store selected by the configuration
pub fn open_store(config: &HangoutsConfig) -> Result<Box<dyn DurableStore>> {
    match config.storage.backend {
        StorageBackend::Memory => Ok(Box::new(MemoryStore::new())),
        StorageBackend::File => {
            let dir = config
                .storage
                .data_dir
                .as_ref()
                .ok_or_else(|| HangoutError::config_error("file storage requires a data directory"))?;
            Ok(Box::new(FileStore::open(dir)?))
        }
    }
}

// ----------------------------------------------------------------------------
// Engine Builder
// ----------------------------------------------------------------------------

pub struct EngineBuilder {
    session: Session,
    config: HangoutsConfig,
    store: Option<Box<dyn DurableStore>>,
    transport: Option<Box<dyn TransportTask>>,
    navigator: Arc<dyn Navigator>,
    directory: Option<Arc<dyn PeerDirectory>>,
    time_source: Arc<dyn TimeSource>,
}

impl EngineBuilder {
    pub fn new(session: Session) -> Self {
        Self {
            session,
            config: HangoutsConfig::default(),
            store: None,
            transport: None,
            navigator: Arc::new(NoopNavigator),
            directory: None,
            time_source: Arc::new(SystemTimeSource),
        }
    }

    pub fn with_config(mut self, config: HangoutsConfig) -> Self {
        self.config = config;
        self
    }

    /// Use this store instead of the one the configuration selects
    pub fn with_store(mut self, store: Box<dyn DurableStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Defaults to the WebSocket transport
    pub fn with_transport(mut self, transport: Box<dyn TransportTask>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn with_navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = navigator;
        self
    }

    /// Defaults to the HTTP directory of the configured server
    pub fn with_directory(mut self, directory: Arc<dyn PeerDirectory>) -> Self {
        self.directory = Some(directory);
        self
    }

    pub fn with_time_source(mut self, time_source: Arc<dyn TimeSource>) -> Self {
        self.time_source = time_source;
        self
    }

    /// Spawn the engine and transport tasks
    pub async fn build_and_start(self) -> Result<EngineHandle> {
        if self.session.identity.is_empty() {
            return Err(HangoutError::config_error("identity must not be empty"));
        }
        let store = match self.store {
            Some(store) => store,
            None => {
                self.config.validate()?;
                open_store(&self.config)?
            }
        };
        info!(identity = %self.session.identity, "building hangouts engine");

        let channels = &self.config.channels;
        let (command_sender, command_receiver) = create_command_channel(channels);
        let (event_sender, event_receiver) = create_event_channel(channels);
        let (effect_sender, effect_receiver) = create_effect_channel(channels);
        let (projection_sender, projection_receiver) =
            create_projection_channel(Projection::default());

        let mut transport: Box<dyn TransportTask> = match self.transport {
            Some(transport) => transport,
            None => Box::new(WebSocketTransport::new()),
        };
        transport.attach_channels(event_sender.clone(), effect_receiver)?;
        let transport_name = transport.name();
        let transport_handle = tokio::spawn(async move {
            let result = transport.run().await;
            if let Err(e) = &result {
                warn!(transport = transport_name, "transport stopped: {}", e);
            }
            result
        });

        let directory: Arc<dyn PeerDirectory> = match self.directory {
            Some(directory) => directory,
            None if self.config.server.host.is_empty() => Arc::new(OfflineDirectory),
            None => Arc::new(HttpPeerDirectory::new(self.config.server.clone())),
        };

        let identity = self.session.identity.clone();
        let repository = HangoutRepository::new(identity.clone(), store);
        let state = EngineState::new(
            self.session,
            self.config.server.clone(),
            repository,
            self.time_source,
        );
        let task = EngineTask::new(
            state,
            command_receiver,
            event_receiver,
            event_sender,
            effect_sender,
            projection_sender,
            self.navigator,
            directory,
        );
        let engine_handle = tokio::spawn(task.run());

        Ok(EngineHandle {
            identity,
            command_sender,
            projection_receiver,
            engine_handle: Some(engine_handle),
            transport_handle: Some(transport_handle),
        })
    }
}

// ----------------------------------------------------------------------------
// Engine Handle
// ----------------------------------------------------------------------------

/// Handle to a running engine
pub struct EngineHandle {
    identity: Identity,
    command_sender: CommandSender,
    projection_receiver: ProjectionReceiver,
    engine_handle: Option<JoinHandle<Result<EngineStats>>>,
    transport_handle: Option<JoinHandle<Result<()>>>,
}

impl EngineHandle {
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub async fn send_command(&self, command: Command) -> Result<()> {
        self.command_sender
            .send(command)
            .await
            .map_err(|_| HangoutError::channel_error("Failed to send command to engine"))
    }

    /// Latest published projection
    pub fn projection(&self) -> Projection {
        self.projection_receiver.borrow().clone()
    }

    /// A receiver that observes every published projection
    pub fn subscribe(&self) -> ProjectionReceiver {
        self.projection_receiver.clone()
    }

    /// Wait until the projection satisfies `predicate`
    pub async fn wait_for<F>(&self, timeout: Duration, predicate: F) -> Result<Projection>
    where
        F: Fn(&Projection) -> bool,
    {
        let mut receiver = self.projection_receiver.clone();
        let wait = async {
            loop {
                {
                    let current = receiver.borrow_and_update();
                    if predicate(&current) {
                        return Ok(current.clone());
                    }
                }
                if receiver.changed().await.is_err() {
                    return Err(HangoutError::channel_error("engine stopped"));
                }
            }
        };
        tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| HangoutError::channel_error("timed out waiting for projection"))?
    }

    pub fn is_running(&self) -> bool {
        self.engine_handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stop the engine and the transport; returns the final statistics
    pub async fn shutdown(&mut self) -> Result<EngineStats> {
        info!("Shutting down hangouts engine");
        let _ = self.send_command(Command::Shutdown).await;

        let stats = match self.engine_handle.take() {
            Some(handle) => match tokio::time::timeout(Duration::from_secs(5), handle).await {
                Ok(Ok(result)) => result?,
                Ok(Err(e)) => {
                    return Err(HangoutError::channel_error(format!(
                        "engine task panicked: {e}"
                    )))
                }
                Err(_) => return Err(HangoutError::channel_error("engine did not stop in time")),
            },
            None => EngineStats::default(),
        };

        // the transport drains its remaining effects once the engine is gone
        if let Some(mut handle) = self.transport_handle.take() {
            if tokio::time::timeout(Duration::from_secs(1), &mut handle)
                .await
                .is_err()
            {
                warn!("transport did not stop in time, aborting");
                handle.abort();
            }
        }
        Ok(stats)
    }
}
