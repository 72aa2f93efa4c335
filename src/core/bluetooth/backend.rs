//! `Transport` implementation on top of the bluest library
//! Every request spawns a task; its outcome is reported on the event channel.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{Result, anyhow};
use bluest::{Adapter, AdapterEvent, Characteristic, ConnectionEvent, Device, Service};
use futures_util::StreamExt;
use log::{debug, error, info, warn};
use tokio_util::sync::CancellationToken;

use crate::core::bluetooth::notification::NotificationHandler;
use crate::core::bluetooth::scanner::{BluetoothScanner, DeviceMap};
use crate::core::bluetooth::transport::{EventSender, Transport, TransportEvent};
use crate::core::bluetooth::types::{
    CharacteristicHandle, DeviceIdentity, RequestId, ServiceHandle,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle tables shared with the spawned request tasks
#[derive(Default)]
struct Handles {
    next: AtomicU32,
    services: Mutex<HashMap<ServiceHandle, Service>>,
    characteristics: Mutex<HashMap<CharacteristicHandle, Characteristic>>,
}

impl Handles {
    fn allocate(&self) -> u32 {
        self.next.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn service(&self, handle: ServiceHandle) -> Result<Service> {
        lock(&self.services)
            .get(&handle)
            .cloned()
            .ok_or_else(|| anyhow!("Unknown service handle {:?}", handle))
    }

    fn characteristic(&self, handle: CharacteristicHandle) -> Result<Characteristic> {
        lock(&self.characteristics)
            .get(&handle)
            .cloned()
            .ok_or_else(|| anyhow!("Unknown characteristic handle {:?}", handle))
    }
}

pub struct BluestTransport {
    adapter: Adapter,
    events: EventSender,
    devices: DeviceMap,
    handles: Arc<Handles>,
    scanner: tokio::sync::Mutex<BluetoothScanner>,
    notification_handler: NotificationHandler,
    cancel_token: CancellationToken,
}

impl BluestTransport {
    /// Opens the default adapter. `PoweredOn` is reported once it is available.
    pub async fn new(events: EventSender) -> Result<Self> {
        let adapter = Adapter::default()
            .await
            .ok_or_else(|| anyhow!("No Bluetooth adapter found"))?;
        let devices: DeviceMap = Arc::new(Mutex::new(HashMap::new()));
        let cancel_token = CancellationToken::new();
        let scanner = BluetoothScanner::new(adapter.clone(), devices.clone(), events.clone());
        let notification_handler = NotificationHandler::new(events.clone(), cancel_token.child_token());

        let transport = Self {
            adapter,
            events,
            devices,
            handles: Arc::new(Handles::default()),
            scanner: tokio::sync::Mutex::new(scanner),
            notification_handler,
            cancel_token,
        };
        transport.watch_adapter();
        Ok(transport)
    }

    /// Reports adapter availability as `PoweredOn`/`PoweredOff`
    fn watch_adapter(&self) {
        let adapter = self.adapter.clone();
        let events = self.events.clone();
        let cancel_token = self.cancel_token.clone();
        tokio::spawn(async move {
            let watch = async {
                adapter.wait_available().await?;
                info!("Bluetooth adapter is available.");
                let _ = events.send(TransportEvent::PoweredOn);

                let mut adapter_events = adapter.events().await?;
                while let Some(event) = adapter_events.next().await {
                    let event = match event? {
                        AdapterEvent::Unavailable => TransportEvent::PoweredOff,
                        _ => TransportEvent::PoweredOn,
                    };
                    let _ = events.send(event);
                }
                anyhow::Ok(())
            };
            tokio::select! {
                result = watch => {
                    if let Err(e) = result {
                        error!("Failed to watch Bluetooth adapter: {}", e);
                    }
                }
                _ = cancel_token.cancelled() => {}
            }
        });
    }

    fn device(&self, identity: DeviceIdentity) -> Result<Device> {
        lock(&self.devices)
            .get(&identity.uuid())
            .cloned()
            .ok_or_else(|| anyhow!("Device not found with ID: {}", identity))
    }

    /// Reports a drop of the link as `PeripheralDisconnected`
    fn watch_connection(&self, identity: DeviceIdentity, device: Device) {
        let adapter = self.adapter.clone();
        let events = self.events.clone();
        let cancel_token = self.cancel_token.clone();
        tokio::spawn(async move {
            let watch = async {
                let mut connection_events = adapter.device_connection_events(&device).await?;
                while let Some(event) = connection_events.next().await {
                    if let ConnectionEvent::Disconnected = event {
                        let _ = events.send(TransportEvent::PeripheralDisconnected {
                            identifier: identity.uuid(),
                        });
                        break;
                    }
                }
                anyhow::Ok(())
            };
            tokio::select! {
                result = watch => {
                    if let Err(e) = result {
                        warn!("Failed to watch connection of {}: {}", identity, e);
                    }
                }
                _ = cancel_token.cancelled() => {}
            }
        });
    }

    /// Disconnect from the mug and stop every background task
    pub async fn disconnect(&self, identity: DeviceIdentity) -> Result<()> {
        self.notification_handler.stop_notifications();
        self.scanner.lock().await.stop_scan().await?;
        self.cancel_token.cancel();

        if let Ok(device) = self.device(identity) {
            if device.is_connected().await {
                info!("Disconnecting from device {}", identity);
                self.adapter.disconnect_device(&device).await?;
                info!("Successfully disconnected");
            } else {
                info!("Device {} not connected", identity);
            }
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Transport for BluestTransport {
    async fn start_scan(&self) -> Result<()> {
        self.scanner.lock().await.start_scan().await
    }

    async fn stop_scan(&self) -> Result<()> {
        self.scanner.lock().await.stop_scan().await
    }

    async fn connect(&self, identity: DeviceIdentity) -> Result<()> {
        let device = self.device(identity)?;
        let adapter = self.adapter.clone();
        let events = self.events.clone();
        let device_for_task = device.clone();

        info!("Initiating connection to {}...", identity);
        tokio::spawn(async move {
            let result = if device_for_task.is_connected().await {
                Ok(())
            } else {
                adapter.connect_device(&device_for_task).await
            };
            let event = match result {
                Ok(()) => TransportEvent::PeripheralConnected { identifier: identity.uuid() },
                Err(e) => TransportEvent::ConnectionFailed {
                    identifier: identity.uuid(),
                    error: e.to_string(),
                },
            };
            let _ = events.send(event);
        });

        self.watch_connection(identity, device);
        Ok(())
    }

    async fn discover_services(&self, identity: DeviceIdentity) -> Result<()> {
        let device = self.device(identity)?;
        let handles = self.handles.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            match device.discover_services().await {
                Ok(services) => {
                    let services = services
                        .into_iter()
                        .map(|service| {
                            let handle = ServiceHandle(handles.allocate());
                            let uuid = service.uuid();
                            lock(&handles.services).insert(handle, service);
                            (uuid, handle)
                        })
                        .collect();
                    let _ = events.send(TransportEvent::ServicesDiscovered { services });
                }
                Err(e) => {
                    error!("Failed to discover services of {}: {}", identity, e);
                    let _ = events.send(TransportEvent::DiscoveryFailed { error: e.to_string() });
                }
            }
        });
        Ok(())
    }

    async fn discover_characteristics(&self, service: ServiceHandle) -> Result<()> {
        let bluest_service = self.handles.service(service)?;
        let handles = self.handles.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            match bluest_service.discover_characteristics().await {
                Ok(characteristics) => {
                    let characteristics = characteristics
                        .into_iter()
                        .map(|characteristic| {
                            let handle = CharacteristicHandle(handles.allocate());
                            let uuid = characteristic.uuid();
                            lock(&handles.characteristics).insert(handle, characteristic);
                            (uuid, handle)
                        })
                        .collect();
                    let _ = events.send(TransportEvent::CharacteristicsDiscovered {
                        service,
                        characteristics,
                    });
                }
                Err(e) => {
                    error!(
                        "Failed to discover characteristics of {}: {}",
                        bluest_service.uuid(),
                        e
                    );
                    let _ = events.send(TransportEvent::DiscoveryFailed { error: e.to_string() });
                }
            }
        });
        Ok(())
    }

    async fn read_value(
        &self,
        characteristic: CharacteristicHandle,
        request: RequestId,
    ) -> Result<()> {
        let bluest_characteristic = self.handles.characteristic(characteristic)?;
        let events = self.events.clone();
        tokio::spawn(async move {
            let value = bluest_characteristic.read().await.map_err(|e| e.to_string());
            let _ = events.send(TransportEvent::ValueUpdated {
                characteristic,
                request,
                value,
            });
        });
        Ok(())
    }

    async fn write_value(
        &self,
        characteristic: CharacteristicHandle,
        request: RequestId,
        data: &[u8],
        with_response: bool,
    ) -> Result<()> {
        let bluest_characteristic = self.handles.characteristic(characteristic)?;
        let events = self.events.clone();
        let data = data.to_vec();
        tokio::spawn(async move {
            if with_response {
                let result = bluest_characteristic.write(&data).await.map_err(|e| e.to_string());
                let _ = events.send(TransportEvent::WriteCompleted {
                    characteristic,
                    request,
                    result,
                });
            } else if let Err(e) = bluest_characteristic.write_without_response(&data).await {
                error!("Failed to write {:?}: {}", characteristic, e);
            } else {
                debug!("Wrote {} bytes to {:?} without response", data.len(), characteristic);
            }
        });
        Ok(())
    }

    async fn subscribe(&self, characteristic: CharacteristicHandle) -> Result<()> {
        let bluest_characteristic = self.handles.characteristic(characteristic)?;
        self.notification_handler
            .setup_notifications(characteristic, bluest_characteristic)
    }
}
