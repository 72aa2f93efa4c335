//! Bluetooth connection handling for the Ember mug
//! This module drives scan -> connect -> service discovery -> characteristic
//! discovery from transport events and routes read/write completions back to
//! the command waiting for them.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use anyhow::Result;
use log::{debug, error, info, warn};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::core::bluetooth::constants::UUID_EMBER_SERVICE;
use crate::core::bluetooth::error::{BridgeError, BridgeResult};
use crate::core::bluetooth::registry::CharacteristicRegistry;
use crate::core::bluetooth::transport::{EventReceiver, Transport, TransportEvent};
use crate::core::bluetooth::types::{
    CharacteristicHandle, CharacteristicKind, ConnectionState, DeviceIdentity, RequestId,
};

/// Raw outcome handed from the event loop to a waiting command
pub(crate) type Completion = std::result::Result<Vec<u8>, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Operation {
    Read,
    Write,
}

struct PendingCommand {
    request: RequestId,
    characteristic: CharacteristicHandle,
    operation: Operation,
    reply: oneshot::Sender<Completion>,
}

/// Everything the event loop mutates, guarded by one lock
struct Link {
    state: ConnectionState,
    peripheral_name: Option<String>,
    registry: CharacteristicRegistry,
    pending: Option<PendingCommand>,
    last_request: u64,
}

struct Shared {
    link: Mutex<Link>,
    state_tx: watch::Sender<ConnectionState>,
    /// first connect or discovery error, ends any connect wait
    failure_tx: watch::Sender<Option<String>>,
}

/// Connection manager for the mug
pub struct ConnectionManager<T: Transport> {
    identity: DeviceIdentity,
    transport: Arc<T>,
    shared: Arc<Shared>,
}

impl<T: Transport> Clone for ConnectionManager<T> {
    fn clone(&self) -> Self {
        Self {
            identity: self.identity,
            transport: self.transport.clone(),
            shared: self.shared.clone(),
        }
    }
}

impl<T: Transport + 'static> ConnectionManager<T> {
    pub fn new(identity: DeviceIdentity, transport: Arc<T>) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let (failure_tx, _) = watch::channel(None);
        let link = Link {
            state: ConnectionState::Disconnected,
            peripheral_name: None,
            registry: CharacteristicRegistry::new(),
            pending: None,
            last_request: 0,
        };
        Self {
            identity,
            transport,
            shared: Arc::new(Shared {
                link: Mutex::new(link),
                state_tx,
                failure_tx,
            }),
        }
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    pub fn state(&self) -> ConnectionState {
        self.link().state
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    pub fn peripheral_name(&self) -> Option<String> {
        self.link().peripheral_name.clone()
    }

    /// Copy of the registry as it stands now
    pub fn registry(&self) -> CharacteristicRegistry {
        self.link().registry.clone()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state_tx.subscribe()
    }

    /// Waits until the pipeline reaches `target` (or any later state). A
    /// connect or discovery failure ends the wait early.
    pub async fn wait_for_state(
        &self,
        target: ConnectionState,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> BridgeResult<ConnectionState> {
        let mut state_rx = self.watch_state();
        let mut failure_rx = self.shared.failure_tx.subscribe();
        let stopped = || BridgeError::TransportFailure("connection manager stopped".to_string());
        let reached = async {
            tokio::select! {
                state = state_rx.wait_for(|state| *state >= target) => match state {
                    Ok(state) => Ok(*state),
                    Err(_) => Err(stopped()),
                },
                failure = failure_rx.wait_for(Option::is_some) => match failure {
                    Ok(failure) => Err(BridgeError::TransportFailure(
                        failure.as_deref().unwrap_or("connection failed").to_string(),
                    )),
                    Err(_) => Err(stopped()),
                },
            }
        };

        tokio::select! {
            result = tokio::time::timeout(timeout, reached) => {
                result.unwrap_or_else(|_| {
                    Err(BridgeError::ConnectTimeout {
                        state: self.state(),
                        timeout,
                    })
                })
            }
            _ = cancel.cancelled() => Err(BridgeError::Cancelled),
        }
    }

    /// Spawns the event loop on the current runtime
    pub fn spawn(&self, events: EventReceiver, cancel: CancellationToken) -> JoinHandle<()> {
        let manager = self.clone();
        tokio::spawn(async move { manager.run(events, cancel).await })
    }

    /// Consumes transport events one at a time until the channel closes or
    /// `cancel` fires.
    pub async fn run(self, mut events: EventReceiver, cancel: CancellationToken) {
        info!("Connection manager started for {}", self.identity);
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => {
                        if let Err(e) = self.handle_event(event).await {
                            error!("Failed to handle transport event: {}", e);
                        }
                    }
                    None => {
                        info!("Transport event stream has ended.");
                        break;
                    }
                },
                _ = cancel.cancelled() => {
                    info!("Connection manager cancelled.");
                    break;
                }
            }
        }

        if let Some(pending) = self.link().pending.take() {
            let _ = pending.reply.send(Err("connection manager stopped".to_string()));
        }
    }

    /// Applies one transport event. State changes happen under the lock; any
    /// follow-up request is issued after it is released.
    pub async fn handle_event(&self, event: TransportEvent) -> Result<()> {
        match event {
            TransportEvent::PoweredOn => {
                if self.advance(&[ConnectionState::Disconnected], ConnectionState::Scanning) {
                    self.shared.failure_tx.send_replace(None);
                    self.transport.start_scan().await?;
                    info!("Started scan");
                }
            }
            TransportEvent::PoweredOff => {
                warn!("Bluetooth adapter powered off");
                if self.advance(&[ConnectionState::Scanning], ConnectionState::Disconnected) {
                    self.transport.stop_scan().await?;
                    info!("Stopped scan");
                }
            }
            TransportEvent::PeripheralDiscovered { identifier, name, rssi } => {
                if !self.is_target(identifier) {
                    return Ok(());
                }
                if self.advance(&[ConnectionState::Scanning], ConnectionState::Connecting) {
                    info!(
                        "Discovered peripheral {} - Name: {:?}, RSSI: {:?}",
                        self.identity, name, rssi
                    );
                    self.link().peripheral_name = name;
                    self.transport.stop_scan().await?;
                    info!("Stopped scan");
                    self.transport.connect(self.identity).await?;
                }
            }
            TransportEvent::PeripheralConnected { identifier } => {
                if !self.is_target(identifier) {
                    return Ok(());
                }
                if self.advance(&[ConnectionState::Connecting], ConnectionState::Connected) {
                    self.advance(&[ConnectionState::Connected], ConnectionState::DiscoveringServices);
                    self.transport.discover_services(self.identity).await?;
                }
            }
            TransportEvent::ConnectionFailed { identifier, error } => {
                if self.is_target(identifier)
                    && self.advance(&[ConnectionState::Connecting], ConnectionState::Disconnected)
                {
                    error!("Failed to connect to {}: {}", self.identity, error);
                    self.shared.failure_tx.send_replace(Some(error));
                }
            }
            TransportEvent::DiscoveryFailed { error } => {
                if matches!(
                    self.state(),
                    ConnectionState::DiscoveringServices
                        | ConnectionState::DiscoveringCharacteristics
                ) {
                    error!("Discovery on {} failed: {}", self.identity, error);
                    self.shared.failure_tx.send_replace(Some(error));
                } else {
                    debug!("Ignoring discovery failure outside discovery: {}", error);
                }
            }
            TransportEvent::PeripheralDisconnected { identifier } => {
                if self.is_target(identifier) {
                    self.handle_disconnect();
                }
            }
            TransportEvent::ServicesDiscovered { services } => {
                if self.state() != ConnectionState::DiscoveringServices {
                    debug!("Ignoring service list outside service discovery");
                    return Ok(());
                }
                let mut matched = Vec::new();
                for (uuid, handle) in services {
                    info!("Discovered service {}", uuid);
                    if uuid == UUID_EMBER_SERVICE {
                        matched.push(handle);
                    }
                }
                if matched.is_empty() {
                    warn!("Ember service not found: {}", UUID_EMBER_SERVICE);
                    return Ok(());
                }
                self.advance(
                    &[ConnectionState::DiscoveringServices],
                    ConnectionState::DiscoveringCharacteristics,
                );
                for handle in matched {
                    self.transport.discover_characteristics(handle).await?;
                }
            }
            TransportEvent::CharacteristicsDiscovered { service, characteristics } => {
                let push_event = {
                    let mut link = self.link();
                    if link.state != ConnectionState::DiscoveringCharacteristics {
                        debug!("Ignoring characteristics of {:?} outside discovery", service);
                        return Ok(());
                    }
                    let stored = link.registry.populate(characteristics);
                    info!("Resolved {} known characteristics", stored);
                    Self::set_state(&self.shared, &mut link, ConnectionState::Ready);
                    link.registry.get(CharacteristicKind::PushEvent)
                };
                if let Some(handle) = push_event {
                    self.transport.subscribe(handle).await?;
                }
            }
            TransportEvent::ValueUpdated { characteristic, request, value } => {
                let mut link = self.link();
                match Self::take_pending(&mut link, characteristic, request, Operation::Read) {
                    Some(pending) => {
                        let _ = pending.reply.send(value);
                    }
                    None => debug!("Discarding read result {:?} for {:?}", request, characteristic),
                }
            }
            TransportEvent::WriteCompleted { characteristic, request, result } => {
                let mut link = self.link();
                match Self::take_pending(&mut link, characteristic, request, Operation::Write) {
                    Some(pending) => {
                        let _ = pending.reply.send(result.map(|_| Vec::new()));
                    }
                    None => debug!(
                        "Discarding write completion {:?} for {:?}",
                        request, characteristic
                    ),
                }
            }
            TransportEvent::ValueChanged { characteristic, value } => {
                match self.link().registry.kind_of(characteristic) {
                    Some(CharacteristicKind::PushEvent) => {
                        info!("Push event from mug: {:?}", value.first());
                    }
                    Some(kind) => debug!("{} changed: {:?}", kind, value),
                    None => debug!("Notification from unknown {:?}", characteristic),
                }
            }
        }
        Ok(())
    }

    /// Checks the preconditions of a command and registers it as the one in
    /// flight under a fresh request id. The returned receiver resolves only
    /// when a completion carrying that id arrives.
    pub(crate) fn begin_command(
        &self,
        kind: CharacteristicKind,
        operation: Operation,
    ) -> BridgeResult<(CharacteristicHandle, RequestId, oneshot::Receiver<Completion>)> {
        let mut link = self.link();
        if !link.state.is_connected() {
            return Err(BridgeError::NotConnected);
        }
        let characteristic = link
            .registry
            .get(kind)
            .ok_or(BridgeError::CharacteristicUnresolved(kind))?;
        if link.pending.is_some() {
            return Err(BridgeError::TransportFailure(
                "another command is already in flight".to_string(),
            ));
        }
        link.last_request += 1;
        let request = RequestId(link.last_request);
        let (reply, completion) = oneshot::channel();
        link.pending = Some(PendingCommand {
            request,
            characteristic,
            operation,
            reply,
        });
        Ok((characteristic, request, completion))
    }

    /// Drops the in-flight command `request`, if it is still pending. A late
    /// completion for it is discarded when it arrives.
    pub(crate) fn abandon_command(&self, request: RequestId) {
        let mut link = self.link();
        if link
            .pending
            .as_ref()
            .is_some_and(|pending| pending.request == request)
        {
            link.pending = None;
        }
    }

    fn handle_disconnect(&self) {
        let mut link = self.link();
        warn!("Peripheral {} disconnected", self.identity);
        link.registry.clear();
        if let Some(pending) = link.pending.take() {
            let _ = pending.reply.send(Err("peripheral disconnected".to_string()));
        }
        Self::set_state(&self.shared, &mut link, ConnectionState::Disconnected);
    }

    fn take_pending(
        link: &mut Link,
        characteristic: CharacteristicHandle,
        request: RequestId,
        operation: Operation,
    ) -> Option<PendingCommand> {
        match &link.pending {
            Some(pending)
                if pending.request == request
                    && pending.characteristic == characteristic
                    && pending.operation == operation =>
            {
                link.pending.take()
            }
            _ => None,
        }
    }

    /// Moves to `to` if the current state is one of `from`
    fn advance(&self, from: &[ConnectionState], to: ConnectionState) -> bool {
        let mut link = self.link();
        if !from.contains(&link.state) {
            debug!("Ignoring transition {} -> {}", link.state, to);
            return false;
        }
        Self::set_state(&self.shared, &mut link, to);
        true
    }

    fn set_state(shared: &Shared, link: &mut Link, to: ConnectionState) {
        info!("Connection state {} -> {}", link.state, to);
        link.state = to;
        shared.state_tx.send_replace(to);
    }

    fn is_target(&self, identifier: Uuid) -> bool {
        identifier == self.identity.uuid()
    }

    fn link(&self) -> MutexGuard<'_, Link> {
        self.shared.link.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bluetooth::constants::*;
    use crate::core::bluetooth::types::ServiceHandle;

    #[derive(Debug, Clone, PartialEq)]
    enum Request {
        StartScan,
        StopScan,
        Connect(DeviceIdentity),
        DiscoverServices,
        DiscoverCharacteristics(ServiceHandle),
        Subscribe(CharacteristicHandle),
        Other,
    }

    /// Records requests, never answers them
    #[derive(Default)]
    struct RecordingTransport {
        requests: std::sync::Mutex<Vec<Request>>,
    }

    impl RecordingTransport {
        fn record(&self, request: Request) -> Result<()> {
            self.requests.lock().unwrap().push(request);
            Ok(())
        }

        fn requests(&self) -> Vec<Request> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl Transport for RecordingTransport {
        async fn start_scan(&self) -> Result<()> {
            self.record(Request::StartScan)
        }
        async fn stop_scan(&self) -> Result<()> {
            self.record(Request::StopScan)
        }
        async fn connect(&self, identity: DeviceIdentity) -> Result<()> {
            self.record(Request::Connect(identity))
        }
        async fn discover_services(&self, _identity: DeviceIdentity) -> Result<()> {
            self.record(Request::DiscoverServices)
        }
        async fn discover_characteristics(&self, service: ServiceHandle) -> Result<()> {
            self.record(Request::DiscoverCharacteristics(service))
        }
        async fn read_value(
            &self,
            _characteristic: CharacteristicHandle,
            _request: RequestId,
        ) -> Result<()> {
            self.record(Request::Other)
        }
        async fn write_value(
            &self,
            _characteristic: CharacteristicHandle,
            _request: RequestId,
            _data: &[u8],
            _with_response: bool,
        ) -> Result<()> {
            self.record(Request::Other)
        }
        async fn subscribe(&self, characteristic: CharacteristicHandle) -> Result<()> {
            self.record(Request::Subscribe(characteristic))
        }
    }

    fn target() -> DeviceIdentity {
        DeviceIdentity::new(Uuid::from_u128(0x0123_4567_89ab_cdef_0123_4567_89ab_cdef))
    }

    fn manager() -> (ConnectionManager<RecordingTransport>, Arc<RecordingTransport>) {
        let transport = Arc::new(RecordingTransport::default());
        (ConnectionManager::new(target(), transport.clone()), transport)
    }

    async fn connect(manager: &ConnectionManager<RecordingTransport>) {
        manager.handle_event(TransportEvent::PoweredOn).await.unwrap();
        manager
            .handle_event(TransportEvent::PeripheralDiscovered {
                identifier: target().uuid(),
                name: Some("Ember Ceramic Mug".to_string()),
                rssi: Some(-60),
            })
            .await
            .unwrap();
        manager
            .handle_event(TransportEvent::PeripheralConnected { identifier: target().uuid() })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_pipeline_reaches_ready() {
        let (manager, transport) = manager();
        assert_eq!(manager.state(), ConnectionState::Disconnected);

        manager.handle_event(TransportEvent::PoweredOn).await.unwrap();
        assert_eq!(manager.state(), ConnectionState::Scanning);

        manager
            .handle_event(TransportEvent::PeripheralDiscovered {
                identifier: Uuid::from_u128(1),
                name: None,
                rssi: None,
            })
            .await
            .unwrap();
        assert_eq!(manager.state(), ConnectionState::Scanning);
        assert!(!manager.is_connected());

        connect(&manager).await;
        assert_eq!(manager.state(), ConnectionState::DiscoveringServices);
        assert!(manager.is_connected());
        assert_eq!(manager.peripheral_name().as_deref(), Some("Ember Ceramic Mug"));

        manager
            .handle_event(TransportEvent::ServicesDiscovered {
                services: vec![
                    (Uuid::from_u128(0x0000180f_0000_1000_8000_00805f9b34fb), ServiceHandle(1)),
                    (UUID_EMBER_SERVICE, ServiceHandle(2)),
                ],
            })
            .await
            .unwrap();
        assert_eq!(manager.state(), ConnectionState::DiscoveringCharacteristics);

        manager
            .handle_event(TransportEvent::CharacteristicsDiscovered {
                service: ServiceHandle(2),
                characteristics: vec![
                    (UUID_TARGET_TEMPERATURE, CharacteristicHandle(10)),
                    (UUID_PUSH_EVENT, CharacteristicHandle(11)),
                ],
            })
            .await
            .unwrap();
        assert_eq!(manager.state(), ConnectionState::Ready);

        assert_eq!(
            transport.requests(),
            vec![
                Request::StartScan,
                Request::StopScan,
                Request::Connect(target()),
                Request::DiscoverServices,
                Request::DiscoverCharacteristics(ServiceHandle(2)),
                Request::Subscribe(CharacteristicHandle(11)),
            ]
        );
    }

    #[tokio::test]
    async fn test_services_without_ember_service() {
        let (manager, transport) = manager();
        connect(&manager).await;
        manager
            .handle_event(TransportEvent::ServicesDiscovered {
                services: vec![(Uuid::from_u128(42), ServiceHandle(1))],
            })
            .await
            .unwrap();
        assert_eq!(manager.state(), ConnectionState::DiscoveringServices);
        assert!(!transport
            .requests()
            .iter()
            .any(|r| matches!(r, Request::DiscoverCharacteristics(_))));
    }

    #[tokio::test]
    async fn test_preconditions() {
        let (manager, _) = manager();
        assert_eq!(
            manager
                .begin_command(CharacteristicKind::TargetTemperature, Operation::Read)
                .unwrap_err(),
            BridgeError::NotConnected
        );

        connect(&manager).await;
        assert_eq!(
            manager
                .begin_command(CharacteristicKind::TargetTemperature, Operation::Read)
                .unwrap_err(),
            BridgeError::CharacteristicUnresolved(CharacteristicKind::TargetTemperature)
        );
    }

    #[tokio::test]
    async fn test_disconnect_fails_pending_command() {
        let (manager, _) = manager();
        connect(&manager).await;
        manager
            .handle_event(TransportEvent::ServicesDiscovered {
                services: vec![(UUID_EMBER_SERVICE, ServiceHandle(1))],
            })
            .await
            .unwrap();
        manager
            .handle_event(TransportEvent::CharacteristicsDiscovered {
                service: ServiceHandle(1),
                characteristics: vec![(UUID_LIQUID_LEVEL, CharacteristicHandle(5))],
            })
            .await
            .unwrap();

        let (handle, _, completion) = manager
            .begin_command(CharacteristicKind::LiquidLevel, Operation::Read)
            .unwrap();
        assert_eq!(handle, CharacteristicHandle(5));

        manager
            .handle_event(TransportEvent::PeripheralDisconnected { identifier: target().uuid() })
            .await
            .unwrap();
        assert!(completion.await.unwrap().is_err());
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert!(manager.registry().is_empty());
    }

    async fn ready(manager: &ConnectionManager<RecordingTransport>) {
        connect(manager).await;
        manager
            .handle_event(TransportEvent::ServicesDiscovered {
                services: vec![(UUID_EMBER_SERVICE, ServiceHandle(1))],
            })
            .await
            .unwrap();
        manager
            .handle_event(TransportEvent::CharacteristicsDiscovered {
                service: ServiceHandle(1),
                characteristics: vec![
                    (UUID_CURRENT_TEMPERATURE, CharacteristicHandle(2)),
                    (UUID_TARGET_TEMPERATURE, CharacteristicHandle(3)),
                ],
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_read_completion_routing() {
        let (manager, _) = manager();
        ready(&manager).await;

        let (_, request, completion) = manager
            .begin_command(CharacteristicKind::CurrentTemperature, Operation::Read)
            .unwrap();
        // a write ack or a value for another handle must not resolve the read
        manager
            .handle_event(TransportEvent::WriteCompleted {
                characteristic: CharacteristicHandle(2),
                request,
                result: Ok(()),
            })
            .await
            .unwrap();
        manager
            .handle_event(TransportEvent::ValueUpdated {
                characteristic: CharacteristicHandle(3),
                request,
                value: Ok(vec![0x00, 0x01]),
            })
            .await
            .unwrap();
        manager
            .handle_event(TransportEvent::ValueUpdated {
                characteristic: CharacteristicHandle(2),
                request,
                value: Ok(vec![0x5B, 0x16]),
            })
            .await
            .unwrap();

        assert_eq!(completion.await.unwrap(), Ok(vec![0x5B, 0x16]));
    }

    #[tokio::test]
    async fn test_late_completion_of_abandoned_request_is_discarded() {
        let (manager, _) = manager();
        ready(&manager).await;

        let (handle, first, _) = manager
            .begin_command(CharacteristicKind::TargetTemperature, Operation::Write)
            .unwrap();
        manager.abandon_command(first);

        let (_, second, mut completion) = manager
            .begin_command(CharacteristicKind::TargetTemperature, Operation::Write)
            .unwrap();
        assert_ne!(first, second);

        manager
            .handle_event(TransportEvent::WriteCompleted {
                characteristic: handle,
                request: first,
                result: Ok(()),
            })
            .await
            .unwrap();
        assert!(completion.try_recv().is_err());

        manager
            .handle_event(TransportEvent::WriteCompleted {
                characteristic: handle,
                request: second,
                result: Err("rejected".to_string()),
            })
            .await
            .unwrap();
        assert_eq!(completion.await.unwrap(), Err("rejected".to_string()));
    }

    #[tokio::test]
    async fn test_connection_failure_ends_wait() {
        let (manager, _) = manager();
        manager.handle_event(TransportEvent::PoweredOn).await.unwrap();
        manager
            .handle_event(TransportEvent::PeripheralDiscovered {
                identifier: target().uuid(),
                name: None,
                rssi: None,
            })
            .await
            .unwrap();
        manager
            .handle_event(TransportEvent::ConnectionFailed {
                identifier: target().uuid(),
                error: "peer refused".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(manager.state(), ConnectionState::Disconnected);

        let result = manager
            .wait_for_state(
                ConnectionState::Ready,
                Duration::from_secs(5),
                &CancellationToken::new(),
            )
            .await;
        assert_eq!(result, Err(BridgeError::TransportFailure("peer refused".to_string())));
    }

    #[tokio::test]
    async fn test_discovery_failure_ends_wait() {
        let (manager, _) = manager();
        connect(&manager).await;

        let cancel = CancellationToken::new();
        let wait = manager.wait_for_state(ConnectionState::Ready, Duration::from_secs(5), &cancel);
        let fail = async {
            manager
                .handle_event(TransportEvent::DiscoveryFailed {
                    error: "gatt error".to_string(),
                })
                .await
                .unwrap();
        };
        let (result, _) = tokio::join!(wait, fail);
        assert_eq!(result, Err(BridgeError::TransportFailure("gatt error".to_string())));
        assert_eq!(manager.state(), ConnectionState::DiscoveringServices);
    }

    #[tokio::test]
    async fn test_wait_for_state_times_out_and_cancels() {
        let (manager, _) = manager();
        let cancel = CancellationToken::new();
        let result = manager
            .wait_for_state(ConnectionState::Ready, Duration::from_millis(20), &cancel)
            .await;
        assert_eq!(
            result,
            Err(BridgeError::ConnectTimeout {
                state: ConnectionState::Disconnected,
                timeout: Duration::from_millis(20),
            })
        );

        cancel.cancel();
        let result = manager
            .wait_for_state(ConnectionState::Ready, Duration::from_secs(5), &cancel)
            .await;
        assert_eq!(result, Err(BridgeError::Cancelled));
    }
}
