use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Result;
use bluest::{Adapter, Device};
use futures_util::StreamExt;
use log::{debug, error, info};
use regex::Regex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::core::bluetooth::transport::{EventSender, TransportEvent};

/// Devices seen while scanning, keyed by identifier
pub type DeviceMap = Arc<Mutex<HashMap<Uuid, Device>>>;

pub struct BluetoothScanner {
    adapter: Adapter,
    devices: DeviceMap,
    events: EventSender,
    cancel_token: CancellationToken,
    scan_task_handle: Option<JoinHandle<Result<()>>>,
}

impl BluetoothScanner {
    pub fn new(adapter: Adapter, devices: DeviceMap, events: EventSender) -> Self {
        Self {
            adapter,
            devices,
            events,
            cancel_token: CancellationToken::new(),
            scan_task_handle: None,
        }
    }

    pub async fn start_scan(&mut self) -> Result<()> {
        if self.scan_task_handle.is_some() {
            self.stop_scan().await?;
        }

        self.cancel_token = CancellationToken::new();
        let cancel_token_for_task = self.cancel_token.clone();
        let adapter_for_task = self.adapter.clone();
        let devices_for_task = self.devices.clone();
        let events_for_task = self.events.clone();

        let handle = tokio::spawn(async move {
            let result = Self::internal_scan_task(
                adapter_for_task,
                devices_for_task,
                events_for_task,
                cancel_token_for_task,
            )
            .await;
            if let Err(e) = &result {
                error!("Bluetooth scan failed: {}", e);
            }
            result
        });

        self.scan_task_handle = Some(handle);
        info!("Device scan task started.");
        Ok(())
    }

    /// Scans for Bluetooth devices using bluest library
    async fn internal_scan_task(
        adapter: Adapter,
        devices: DeviceMap,
        events: EventSender,
        cancel_token: CancellationToken,
    ) -> Result<()> {
        // devices already connected to the system never advertise
        info!("Checking for connected devices");
        for device in adapter.connected_devices().await? {
            let name = device.name().ok();
            Self::emit_device_found(&devices, &events, device, name, None);
        }

        info!("Starting bluetooth scan");
        let mut scan_stream = adapter.scan(&[]).await?;

        loop {
            tokio::select! {
                result = scan_stream.next() => {
                    match result {
                        Some(discovered_device) => {
                            let name = discovered_device
                                .adv_data
                                .local_name
                                .clone()
                                .or_else(|| discovered_device.device.name().ok());
                            Self::emit_device_found(
                                &devices,
                                &events,
                                discovered_device.device,
                                name,
                                discovered_device.rssi,
                            );
                        }
                        None => {
                            info!("Bluetooth scan stream has ended.");
                            break;
                        }
                    }
                }
                _ = cancel_token.cancelled() => {
                    break;
                }
            }
        }
        Ok(())
    }

    pub async fn stop_scan(&mut self) -> Result<()> {
        info!("Stopping Bluetooth scan.");
        self.cancel_token.cancel();

        if let Some(handle) = self.scan_task_handle.take() {
            match handle.await {
                Ok(Ok(())) => info!("Scan task finished successfully after cancellation."),
                Ok(Err(e)) => error!("Scan task finished with an error: {:?}", e),
                Err(e) if e.is_cancelled() => info!("Scan task was cancelled successfully."),
                Err(e) => error!("Scan task finished with an unexpected join error: {:?}", e),
            }
        } else {
            info!("No active scan task handle found to wait for.");
        }
        Ok(())
    }

    /// Records the device and reports it on the event channel
    fn emit_device_found(
        devices: &DeviceMap,
        events: &EventSender,
        device: Device,
        name: Option<String>,
        rssi: Option<i16>,
    ) {
        let id = device.id().to_string();
        let Some(identifier) = device_identifier(&id) else {
            debug!("Skipping device with unrecognised id {}", id);
            return;
        };
        debug!("Found device - ID: {}, Name: {:?}, RSSI: {:?}", id, name, rssi);

        devices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(identifier, device);

        if events
            .send(TransportEvent::PeripheralDiscovered { identifier, name, rssi })
            .is_err()
        {
            debug!("Event receiver dropped, discarding discovery of {}", id);
        }
    }
}

/// Maps a platform device id onto the identifier used to select a mug.
///
/// CoreBluetooth reports a UUID which is used as is. Platforms that expose a
/// MAC address get it placed in the low 48 bits of an otherwise zero UUID.
pub fn device_identifier(device_id: &str) -> Option<Uuid> {
    if let Ok(uuid) = Uuid::parse_str(device_id) {
        return Some(uuid);
    }
    let address = extract_mac_address(device_id)?;
    let hex: String = address.chars().filter(|c| c.is_ascii_hexdigit()).collect();
    u64::from_str_radix(&hex, 16)
        .ok()
        .map(|mac| Uuid::from_u128(u128::from(mac)))
}

fn extract_mac_address(device_id_str: &str) -> Option<String> {
    let re = Regex::new(r"([0-9A-Fa-f]{2}[:-]){5}([0-9A-Fa-f]{2})").ok()?;
    re.find_iter(device_id_str)
        .last()
        .map(|m| m.as_str().to_uppercase())
}
