//! Ember mug commands implementation
//! This module contains every command that can be issued to the mug. Each
//! command sends exactly one request and waits for exactly one completion.

use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::Mutex;

use crate::core::bluetooth::codec;
use crate::core::bluetooth::connection::{ConnectionManager, Operation};
use crate::core::bluetooth::constants::{DEFAULT_COMMAND_TIMEOUT_MS, DEFAULT_PAIRING_TIMEOUT_MS};
use crate::core::bluetooth::error::{BridgeError, BridgeResult};
use crate::core::bluetooth::transport::Transport;
use crate::core::bluetooth::types::{BatteryStatus, CharacteristicKind, Rgb, Temperature};

/// Command timeouts
#[derive(Debug, Clone, Copy)]
pub struct CommandTimeouts {
    pub command: Duration,
    pub pairing: Duration,
}

impl Default for CommandTimeouts {
    fn default() -> Self {
        Self {
            command: Duration::from_millis(DEFAULT_COMMAND_TIMEOUT_MS),
            pairing: Duration::from_millis(DEFAULT_PAIRING_TIMEOUT_MS),
        }
    }
}

/// Command surface of the mug
pub struct CommandBridge<T: Transport> {
    manager: ConnectionManager<T>,
    timeouts: CommandTimeouts,
    /// one command in flight at a time
    in_flight: Mutex<()>,
}

impl<T: Transport + 'static> CommandBridge<T> {
    pub fn new(manager: ConnectionManager<T>, timeouts: CommandTimeouts) -> Self {
        Self {
            manager,
            timeouts,
            in_flight: Mutex::new(()),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.manager.is_connected()
    }

    pub async fn get_target_temperature(&self) -> BridgeResult<Temperature> {
        let kind = CharacteristicKind::TargetTemperature;
        let data = self.read(kind, self.timeouts.command).await?;
        codec::decode_temperature(&data).map_err(|e| BridgeError::malformed(kind, e))
    }

    /// Success means the transport acknowledged the write, not that the mug
    /// accepted the value.
    pub async fn set_target_temperature(&self, temperature: Temperature) -> BridgeResult<()> {
        info!("Setting target temperature to {}", temperature);
        let data = codec::encode_temperature(temperature);
        self.write(CharacteristicKind::TargetTemperature, &data, self.timeouts.command)
            .await
    }

    pub async fn get_current_temperature(&self) -> BridgeResult<Temperature> {
        let kind = CharacteristicKind::CurrentTemperature;
        let data = self.read(kind, self.timeouts.command).await?;
        codec::decode_temperature(&data).map_err(|e| BridgeError::malformed(kind, e))
    }

    pub async fn get_liquid_level(&self) -> BridgeResult<u8> {
        let kind = CharacteristicKind::LiquidLevel;
        let data = self.read(kind, self.timeouts.command).await?;
        codec::decode_liquid_level(&data).map_err(|e| BridgeError::malformed(kind, e))
    }

    pub async fn get_rgb(&self) -> BridgeResult<Rgb> {
        let kind = CharacteristicKind::Rgb;
        let data = self.read(kind, self.timeouts.command).await?;
        codec::decode_rgb(&data).map_err(|e| BridgeError::malformed(kind, e))
    }

    pub async fn set_rgb(&self, rgb: Rgb) -> BridgeResult<()> {
        info!("Setting light colour to {}", rgb);
        let data = codec::encode_rgb(rgb);
        self.write(CharacteristicKind::Rgb, &data, self.timeouts.command)
            .await
    }

    pub async fn get_battery(&self) -> BridgeResult<BatteryStatus> {
        let kind = CharacteristicKind::BatteryLevel;
        let data = self.read(kind, self.timeouts.command).await?;
        codec::decode_battery(&data).map_err(|e| BridgeError::malformed(kind, e))
    }

    pub async fn get_device_name(&self) -> BridgeResult<String> {
        let data = self
            .read(CharacteristicKind::DeviceName, self.timeouts.command)
            .await?;
        Ok(codec::decode_device_name(&data))
    }

    /// Reads the pairing challenge, then writes the fixed secret.
    ///
    /// The challenge value is discarded and the mug's reaction to the secret
    /// is not checked: `Ok` only means both transport operations completed.
    pub async fn pair(&self) -> BridgeResult<()> {
        let _guard = self.in_flight.lock().await;

        // both endpoints must be known before anything is sent
        if !self.manager.is_connected() {
            return Err(BridgeError::NotConnected);
        }
        let registry = self.manager.registry();
        for kind in [
            CharacteristicKind::PairingChallenge,
            CharacteristicKind::PairingSecretWrite,
        ] {
            if !registry.contains(kind) {
                warn!("Failed to pair, {} has not been discovered", kind);
                return Err(BridgeError::CharacteristicUnresolved(kind));
            }
        }

        let challenge = self
            .execute(
                CharacteristicKind::PairingChallenge,
                Operation::Read,
                &[],
                self.timeouts.pairing,
            )
            .await?;
        debug!("Sent pair read, challenge of {} bytes ignored", challenge.len());

        self.execute(
            CharacteristicKind::PairingSecretWrite,
            Operation::Write,
            codec::pairing_secret(),
            self.timeouts.pairing,
        )
        .await?;
        info!("Sent pair write");
        Ok(())
    }

    async fn read(&self, kind: CharacteristicKind, timeout: Duration) -> BridgeResult<Vec<u8>> {
        let _guard = self.in_flight.lock().await;
        let data = self.execute(kind, Operation::Read, &[], timeout).await?;
        debug!("Read {}: {:02X?}", kind, data);
        Ok(data)
    }

    async fn write(
        &self,
        kind: CharacteristicKind,
        data: &[u8],
        timeout: Duration,
    ) -> BridgeResult<()> {
        let _guard = self.in_flight.lock().await;
        self.execute(kind, Operation::Write, data, timeout).await?;
        debug!("Wrote {}: {:02X?}", kind, data);
        Ok(())
    }

    /// Issues one request and waits for its completion. Callers hold
    /// `in_flight`.
    async fn execute(
        &self,
        kind: CharacteristicKind,
        operation: Operation,
        data: &[u8],
        timeout: Duration,
    ) -> BridgeResult<Vec<u8>> {
        let (handle, request, completion) = self.manager.begin_command(kind, operation)?;

        let transport = self.manager.transport();
        let issued = match operation {
            Operation::Read => transport.read_value(handle, request).await,
            Operation::Write => transport.write_value(handle, request, data, true).await,
        };
        if let Err(e) = issued {
            self.manager.abandon_command(request);
            return Err(BridgeError::TransportFailure(e.to_string()));
        }

        match tokio::time::timeout(timeout, completion).await {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(e))) => Err(BridgeError::TransportFailure(e)),
            Ok(Err(_)) => Err(BridgeError::TransportFailure(
                "completion dropped by connection manager".to_string(),
            )),
            Err(_) => {
                self.manager.abandon_command(request);
                warn!("{} {:?} timed out after {:?}", kind, operation, timeout);
                Err(BridgeError::CommandTimeout { kind, timeout })
            }
        }
    }
}
