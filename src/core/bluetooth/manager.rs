//! Bluetooth manager for the Ember mug
//! This module wires the bluest transport, the connection manager and the
//! command bridge into one session scoped to a single command invocation.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use log::{error, info};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::session_config::SessionConfig;
use crate::core::bluetooth::backend::BluestTransport;
use crate::core::bluetooth::commands::CommandBridge;
use crate::core::bluetooth::connection::ConnectionManager;
use crate::core::bluetooth::error::BridgeResult;
use crate::core::bluetooth::transport::event_channel;
use crate::core::bluetooth::types::{ConnectionState, DeviceIdentity};

/// Owns everything needed to talk to one mug
pub struct BluetoothManager {
    identity: DeviceIdentity,
    transport: Arc<BluestTransport>,
    connection_manager: ConnectionManager<BluestTransport>,
    bridge: CommandBridge<BluestTransport>,
    connect_timeout: Duration,
    cancel_token: CancellationToken,
    event_loop: JoinHandle<()>,
}

impl BluetoothManager {
    /// Opens the adapter and starts the event loop. Scanning begins as soon as
    /// the adapter reports it is powered on.
    pub async fn new(identity: DeviceIdentity, config: &SessionConfig) -> Result<Self> {
        let (events_tx, events_rx) = event_channel();
        let transport = Arc::new(BluestTransport::new(events_tx).await?);

        let connection_manager = ConnectionManager::new(identity, transport.clone());
        let cancel_token = CancellationToken::new();
        let event_loop = connection_manager.spawn(events_rx, cancel_token.clone());
        let bridge = CommandBridge::new(connection_manager.clone(), config.command_timeouts());

        info!("Bluetooth manager initialised for {}", identity);
        Ok(Self {
            identity,
            transport,
            connection_manager,
            bridge,
            connect_timeout: config.connect_timeout(),
            cancel_token,
            event_loop,
        })
    }

    /// Waits, bounded by the configured connect timeout, until discovery has
    /// finished. `cancel` aborts the wait early.
    pub async fn wait_until_ready(&self, cancel: &CancellationToken) -> BridgeResult<()> {
        info!("Waiting for connection to {}", self.identity);
        self.connection_manager
            .wait_for_state(ConnectionState::Ready, self.connect_timeout, cancel)
            .await?;
        if let Some(name) = self.connection_manager.peripheral_name() {
            info!("Connected to {}", name);
        }
        Ok(())
    }

    pub fn bridge(&self) -> &CommandBridge<BluestTransport> {
        &self.bridge
    }

    /// Disconnects from the mug and stops the event loop
    pub async fn shutdown(self) -> Result<()> {
        let result = self.transport.disconnect(self.identity).await;
        self.cancel_token.cancel();
        if let Err(e) = self.event_loop.await {
            error!("Connection manager task failed: {}", e);
        }
        result
    }
}
