//! The request/event seam between the connection logic and a Bluetooth stack
//!
//! Requests are fire-and-forget: a successful return only means the stack
//! accepted the request. Every outcome comes back later as a
//! [`TransportEvent`] on the channel handed to the transport at construction.

use anyhow::Result;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::core::bluetooth::types::{
    CharacteristicHandle, DeviceIdentity, RequestId, ServiceHandle,
};

/// Sending half of the event channel, owned by the transport
pub type EventSender = mpsc::UnboundedSender<TransportEvent>;
/// Receiving half of the event channel, consumed by the connection manager
pub type EventReceiver = mpsc::UnboundedReceiver<TransportEvent>;

pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Notifications produced by the Bluetooth stack, delivered strictly in order
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// The adapter is available and scanning may start
    PoweredOn,
    /// The adapter went away
    PoweredOff,
    PeripheralDiscovered {
        identifier: Uuid,
        name: Option<String>,
        rssi: Option<i16>,
    },
    PeripheralConnected {
        identifier: Uuid,
    },
    ConnectionFailed {
        identifier: Uuid,
        error: String,
    },
    PeripheralDisconnected {
        identifier: Uuid,
    },
    ServicesDiscovered {
        services: Vec<(Uuid, ServiceHandle)>,
    },
    CharacteristicsDiscovered {
        service: ServiceHandle,
        characteristics: Vec<(Uuid, CharacteristicHandle)>,
    },
    /// Service or characteristic enumeration failed
    DiscoveryFailed {
        error: String,
    },
    /// Completion of a read request, echoing its id
    ValueUpdated {
        characteristic: CharacteristicHandle,
        request: RequestId,
        value: Result<Vec<u8>, String>,
    },
    /// Completion of a write-with-response request, echoing its id
    WriteCompleted {
        characteristic: CharacteristicHandle,
        request: RequestId,
        result: Result<(), String>,
    },
    /// Unsolicited notification from a subscribed characteristic
    ValueChanged {
        characteristic: CharacteristicHandle,
        value: Vec<u8>,
    },
}

/// Central-role operations the connection manager and command bridge need
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Start scanning without a service filter
    async fn start_scan(&self) -> Result<()>;

    async fn stop_scan(&self) -> Result<()>;

    async fn connect(&self, identity: DeviceIdentity) -> Result<()>;

    /// Enumerate every service of the connected peripheral
    async fn discover_services(&self, identity: DeviceIdentity) -> Result<()>;

    /// Failures of either discovery step come back as
    /// [`TransportEvent::DiscoveryFailed`]
    async fn discover_characteristics(&self, service: ServiceHandle) -> Result<()>;

    /// Answered by [`TransportEvent::ValueUpdated`] carrying `request`
    async fn read_value(
        &self,
        characteristic: CharacteristicHandle,
        request: RequestId,
    ) -> Result<()>;

    /// Answered by [`TransportEvent::WriteCompleted`] carrying `request` when
    /// `with_response` is set
    async fn write_value(
        &self,
        characteristic: CharacteristicHandle,
        request: RequestId,
        data: &[u8],
        with_response: bool,
    ) -> Result<()>;

    /// Forward notifications as [`TransportEvent::ValueChanged`]
    async fn subscribe(&self, characteristic: CharacteristicHandle) -> Result<()>;
}
