//! In-process transport that plays the mug's part of the conversation

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use ember_poker_lib::bluetooth::{
    CharacteristicHandle, CommandBridge, CommandTimeouts, ConnectionManager, ConnectionState,
    DeviceIdentity, EventSender, RequestId, ServiceHandle, Transport, TransportEvent, UUID_BATTERY_LEVEL,
    UUID_CURRENT_TEMPERATURE, UUID_DEVICE_NAME, UUID_EMBER_SERVICE, UUID_LIQUID_LEVEL,
    UUID_PAIRING_CHALLENGE, UUID_PAIRING_SECRET_WRITE, UUID_PUSH_EVENT, UUID_RGB,
    UUID_TARGET_TEMPERATURE, event_channel,
};

pub const DEVICE_NAME: CharacteristicHandle = CharacteristicHandle(1);
pub const CURRENT_TEMPERATURE: CharacteristicHandle = CharacteristicHandle(2);
pub const TARGET_TEMPERATURE: CharacteristicHandle = CharacteristicHandle(3);
pub const LIQUID_LEVEL: CharacteristicHandle = CharacteristicHandle(5);
pub const BATTERY_LEVEL: CharacteristicHandle = CharacteristicHandle(7);
pub const PAIRING_CHALLENGE: CharacteristicHandle = CharacteristicHandle(14);
pub const PAIRING_SECRET_WRITE: CharacteristicHandle = CharacteristicHandle(15);
pub const PUSH_EVENT: CharacteristicHandle = CharacteristicHandle(18);
pub const RGB: CharacteristicHandle = CharacteristicHandle(20);

pub const EMBER_SERVICE: ServiceHandle = ServiceHandle(100);
pub const BATTERY_SERVICE: ServiceHandle = ServiceHandle(101);

pub const COMMAND_TIMEOUT: Duration = Duration::from_millis(200);

pub fn identity() -> DeviceIdentity {
    "6F1B7F2C-3B0E-4C38-9D43-2E4C1E0A9B11".parse().unwrap()
}

/// Every characteristic a real mug exposes that the bridge uses
pub fn mug_characteristics() -> Vec<(Uuid, CharacteristicHandle)> {
    vec![
        (UUID_DEVICE_NAME, DEVICE_NAME),
        (UUID_CURRENT_TEMPERATURE, CURRENT_TEMPERATURE),
        (UUID_TARGET_TEMPERATURE, TARGET_TEMPERATURE),
        (UUID_LIQUID_LEVEL, LIQUID_LEVEL),
        (UUID_BATTERY_LEVEL, BATTERY_LEVEL),
        (UUID_PAIRING_CHALLENGE, PAIRING_CHALLENGE),
        (UUID_PAIRING_SECRET_WRITE, PAIRING_SECRET_WRITE),
        (UUID_PUSH_EVENT, PUSH_EVENT),
        (UUID_RGB, RGB),
    ]
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    StartScan,
    StopScan,
    Connect(DeviceIdentity),
    DiscoverServices(DeviceIdentity),
    DiscoverCharacteristics(ServiceHandle),
    Read(CharacteristicHandle),
    Write(CharacteristicHandle, Vec<u8>, bool),
    Subscribe(CharacteristicHandle),
}

impl Request {
    pub fn is_command(&self) -> bool {
        matches!(self, Request::Read(_) | Request::Write(..))
    }
}

/// How read and write completions are delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
    Immediate,
    /// dropped, as if the mug never answered
    Silent,
    /// queued until released by the test
    Held,
}

/// Records every request and answers it the way a mug would. Reads echo the
/// last value written to the same characteristic.
pub struct MockTransport {
    events: EventSender,
    identity: DeviceIdentity,
    characteristics: Vec<(Uuid, CharacteristicHandle)>,
    requests: Mutex<Vec<Request>>,
    recorded: watch::Sender<usize>,
    values: Mutex<HashMap<CharacteristicHandle, Vec<u8>>>,
    delivery: Mutex<Delivery>,
    held: Mutex<VecDeque<TransportEvent>>,
    fail_writes: AtomicBool,
    fail_connect: AtomicBool,
    fail_discovery: AtomicBool,
}

impl MockTransport {
    pub fn new(
        events: EventSender,
        identity: DeviceIdentity,
        characteristics: Vec<(Uuid, CharacteristicHandle)>,
    ) -> Self {
        Self {
            events,
            identity,
            characteristics,
            requests: Mutex::new(Vec::new()),
            recorded: watch::channel(0).0,
            values: Mutex::new(HashMap::new()),
            delivery: Mutex::new(Delivery::Immediate),
            held: Mutex::new(VecDeque::new()),
            fail_writes: AtomicBool::new(false),
            fail_connect: AtomicBool::new(false),
            fail_discovery: AtomicBool::new(false),
        }
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }

    pub fn commands(&self) -> Vec<Request> {
        self.requests().into_iter().filter(Request::is_command).collect()
    }

    pub fn set_value(&self, characteristic: CharacteristicHandle, value: &[u8]) {
        self.values.lock().unwrap().insert(characteristic, value.to_vec());
    }

    /// Waits until `request` has been recorded
    pub async fn wait_for_request(&self, request: Request, timeout: Duration) -> bool {
        let mut recorded = self.recorded.subscribe();
        tokio::time::timeout(
            timeout,
            recorded.wait_for(|_| self.requests.lock().unwrap().contains(&request)),
        )
        .await
        .is_ok_and(|seen| seen.is_ok())
    }

    /// Stop answering reads and writes
    pub fn go_silent(&self) {
        *self.delivery.lock().unwrap() = Delivery::Silent;
    }

    /// Queue completions instead of delivering them
    pub fn hold_completions(&self) {
        *self.delivery.lock().unwrap() = Delivery::Held;
    }

    /// Delivers the oldest queued completion, if any
    pub fn release_oldest(&self) -> bool {
        let event = self.held.lock().unwrap().pop_front();
        match event {
            Some(event) => {
                self.emit(event);
                true
            }
            None => false,
        }
    }

    pub fn resume(&self) {
        *self.delivery.lock().unwrap() = Delivery::Immediate;
    }

    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    pub fn fail_connect(&self) {
        self.fail_connect.store(true, Ordering::SeqCst);
    }

    pub fn fail_discovery(&self) {
        self.fail_discovery.store(true, Ordering::SeqCst);
    }

    fn record(&self, request: Request) {
        let count = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request);
            requests.len()
        };
        self.recorded.send_replace(count);
    }

    fn complete(&self, event: TransportEvent) {
        let delivery = *self.delivery.lock().unwrap();
        match delivery {
            Delivery::Immediate => self.emit(event),
            Delivery::Silent => {}
            Delivery::Held => self.held.lock().unwrap().push_back(event),
        }
    }

    fn emit(&self, event: TransportEvent) {
        self.events.send(event).unwrap();
    }
}

#[async_trait::async_trait]
impl Transport for MockTransport {
    async fn start_scan(&self) -> Result<()> {
        self.record(Request::StartScan);
        self.emit(TransportEvent::PeripheralDiscovered {
            identifier: Uuid::from_u128(0xabcdef),
            name: Some("Someone's headphones".to_string()),
            rssi: Some(-80),
        });
        self.emit(TransportEvent::PeripheralDiscovered {
            identifier: self.identity.uuid(),
            name: Some("Ember Ceramic Mug".to_string()),
            rssi: Some(-55),
        });
        Ok(())
    }

    async fn stop_scan(&self) -> Result<()> {
        self.record(Request::StopScan);
        Ok(())
    }

    async fn connect(&self, identity: DeviceIdentity) -> Result<()> {
        self.record(Request::Connect(identity));
        if self.fail_connect.load(Ordering::SeqCst) {
            self.emit(TransportEvent::ConnectionFailed {
                identifier: identity.uuid(),
                error: "connection refused by peer".to_string(),
            });
        } else {
            self.emit(TransportEvent::PeripheralConnected { identifier: identity.uuid() });
        }
        Ok(())
    }

    async fn discover_services(&self, identity: DeviceIdentity) -> Result<()> {
        self.record(Request::DiscoverServices(identity));
        if self.fail_discovery.load(Ordering::SeqCst) {
            self.emit(TransportEvent::DiscoveryFailed {
                error: "service discovery timed out".to_string(),
            });
            return Ok(());
        }
        self.emit(TransportEvent::ServicesDiscovered {
            services: vec![
                (Uuid::from_u128(0x0000180f_0000_1000_8000_00805f9b34fb), BATTERY_SERVICE),
                (UUID_EMBER_SERVICE, EMBER_SERVICE),
            ],
        });
        Ok(())
    }

    async fn discover_characteristics(&self, service: ServiceHandle) -> Result<()> {
        self.record(Request::DiscoverCharacteristics(service));
        self.emit(TransportEvent::CharacteristicsDiscovered {
            service,
            characteristics: self.characteristics.clone(),
        });
        Ok(())
    }

    async fn read_value(
        &self,
        characteristic: CharacteristicHandle,
        request: RequestId,
    ) -> Result<()> {
        self.record(Request::Read(characteristic));
        let value = self
            .values
            .lock()
            .unwrap()
            .get(&characteristic)
            .cloned()
            .unwrap_or_default();
        self.complete(TransportEvent::ValueUpdated {
            characteristic,
            request,
            value: Ok(value),
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
        self.record(Request::Write(characteristic, data.to_vec(), with_response));
        let result = if self.fail_writes.load(Ordering::SeqCst) {
            Err("write rejected by peer".to_string())
        } else {
            self.set_value(characteristic, data);
            Ok(())
        };
        self.complete(TransportEvent::WriteCompleted {
            characteristic,
            request,
            result,
        });
        Ok(())
    }

    async fn subscribe(&self, characteristic: CharacteristicHandle) -> Result<()> {
        self.record(Request::Subscribe(characteristic));
        Ok(())
    }
}

pub struct Harness {
    pub events: EventSender,
    pub transport: Arc<MockTransport>,
    pub manager: ConnectionManager<MockTransport>,
    pub bridge: CommandBridge<MockTransport>,
    pub cancel: CancellationToken,
}

impl Harness {
    /// Event loop running, adapter not yet powered on
    pub fn new(characteristics: Vec<(Uuid, CharacteristicHandle)>) -> Self {
        let (events, receiver) = event_channel();
        let transport = Arc::new(MockTransport::new(events.clone(), identity(), characteristics));
        let manager = ConnectionManager::new(identity(), transport.clone());
        let cancel = CancellationToken::new();
        manager.spawn(receiver, cancel.clone());
        let bridge = CommandBridge::new(
            manager.clone(),
            CommandTimeouts {
                command: COMMAND_TIMEOUT,
                pairing: COMMAND_TIMEOUT,
            },
        );
        Self {
            events,
            transport,
            manager,
            bridge,
            cancel,
        }
    }

    /// Powers the adapter on and waits for discovery to finish
    pub async fn ready(characteristics: Vec<(Uuid, CharacteristicHandle)>) -> Self {
        let harness = Self::new(characteristics);
        harness.events.send(TransportEvent::PoweredOn).unwrap();
        harness
            .manager
            .wait_for_state(ConnectionState::Ready, Duration::from_secs(2), &harness.cancel)
            .await
            .unwrap();
        harness
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
