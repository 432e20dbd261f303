// Integration tests for the Bridge lifecycle against a scripted mock
// driver: session invariants, reconnection, listening rollback, and
// message flow into the ring buffer.

#![allow(clippy::unwrap_used)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use serde_json::json;

use meshlink_core::{
    BatteryStatus, Bridge, BridgeConfig, ConnectionDescriptor, Contact, CoreError, DeviceDriver,
    DeviceSession, DriverError, Event, EventCallback, EventKind, MessageKind, SendReceipt,
    StartOutcome, StopOutcome, SubscriptionHandle, Transport,
};

// ── Mock driver ─────────────────────────────────────────────────────

type CallbackMap = Arc<Mutex<HashMap<u64, (EventKind, EventCallback)>>>;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Sent {
    Contact { destination: String, text: String },
    Channel { channel: u8, text: String },
}

#[derive(Default)]
struct MockSession {
    live: AtomicBool,
    next_id: AtomicU64,
    callbacks: CallbackMap,
    released: Arc<AtomicUsize>,
    push_running: AtomicBool,
    fail_subscribe: Mutex<Option<EventKind>>,
    fail_push_start: AtomicBool,
    sent: Mutex<Vec<Sent>>,
    disconnect_calls: AtomicUsize,
}

impl MockSession {
    fn subscription_count(&self) -> usize {
        self.callbacks.lock().unwrap().len()
    }

    /// Deliver an event to every callback registered for its kind, the
    /// way a driver's delivery loop would.
    fn emit(&self, kind: EventKind, payload: serde_json::Value) {
        let callbacks: Vec<EventCallback> = self
            .callbacks
            .lock()
            .unwrap()
            .values()
            .filter(|(k, _)| *k == kind)
            .map(|(_, cb)| Arc::clone(cb))
            .collect();
        for cb in callbacks {
            cb(Event::new(kind, payload.clone()));
        }
    }
}

struct MockHandle {
    id: u64,
    callbacks: CallbackMap,
    released: Arc<AtomicUsize>,
}

impl SubscriptionHandle for MockHandle {
    fn release(self: Box<Self>) {
        self.callbacks.lock().unwrap().remove(&self.id);
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl DeviceSession for MockSession {
    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    fn subscribe(
        &self,
        kind: EventKind,
        callback: EventCallback,
    ) -> Result<Box<dyn SubscriptionHandle>, DriverError> {
        if *self.fail_subscribe.lock().unwrap() == Some(kind) {
            return Err(DriverError::Rejected {
                message: format!("subscribe refused for {kind:?}"),
            });
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.callbacks.lock().unwrap().insert(id, (kind, callback));
        Ok(Box::new(MockHandle {
            id,
            callbacks: Arc::clone(&self.callbacks),
            released: Arc::clone(&self.released),
        }))
    }

    async fn start_push_delivery(&self) -> Result<(), DriverError> {
        if self.fail_push_start.load(Ordering::SeqCst) {
            return Err(DriverError::Io("fetch loop refused".into()));
        }
        self.push_running.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop_push_delivery(&self) -> Result<(), DriverError> {
        self.push_running.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), DriverError> {
        self.live.store(false, Ordering::SeqCst);
        self.disconnect_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn send_contact_message(
        &self,
        destination: &str,
        text: &str,
    ) -> Result<SendReceipt, DriverError> {
        self.sent.lock().unwrap().push(Sent::Contact {
            destination: destination.into(),
            text: text.into(),
        });
        Ok(SendReceipt::new("MSG_SENT"))
    }

    async fn send_channel_message(
        &self,
        channel: u8,
        text: &str,
    ) -> Result<SendReceipt, DriverError> {
        self.sent.lock().unwrap().push(Sent::Channel {
            channel,
            text: text.into(),
        });
        Ok(SendReceipt::new("MSG_SENT"))
    }

    async fn contacts(&self) -> Result<Vec<Contact>, DriverError> {
        Ok(vec![Contact {
            name: "Alice".into(),
            public_key: "a1b2c3".into(),
        }])
    }

    async fn device_info(&self) -> Result<serde_json::Value, DriverError> {
        Ok(json!({"name": "mock-node", "firmware": "1.0"}))
    }

    async fn battery(&self) -> Result<BatteryStatus, DriverError> {
        Ok(BatteryStatus {
            voltage_mv: Some(4100),
            percent: Some(87),
        })
    }

    async fn device_time(&self) -> Result<i64, DriverError> {
        Ok(1_732_276_800)
    }

    async fn set_device_time(&self, _unix_secs: i64) -> Result<(), DriverError> {
        Ok(())
    }

    async fn send_advert(&self, _flood: bool) -> Result<SendReceipt, DriverError> {
        Ok(SendReceipt::new("ADVERT_SENT"))
    }
}

#[derive(Default)]
struct MockDriver {
    create_calls: AtomicUsize,
    fail_next_creates: AtomicUsize,
    hang: AtomicBool,
    fail_subscribe: Mutex<Option<EventKind>>,
    fail_push_start: AtomicBool,
    last: Mutex<Option<Arc<MockSession>>>,
    descriptors: Mutex<Vec<ConnectionDescriptor>>,
}

impl MockDriver {
    fn last_session(&self) -> Arc<MockSession> {
        self.last.lock().unwrap().clone().expect("no session created")
    }

    fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DeviceDriver for MockDriver {
    async fn create_session(
        &self,
        descriptor: &ConnectionDescriptor,
    ) -> Result<Arc<dyn DeviceSession>, DriverError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.descriptors.lock().unwrap().push(descriptor.clone());

        if self.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.fail_next_creates.load(Ordering::SeqCst) > 0 {
            self.fail_next_creates.fetch_sub(1, Ordering::SeqCst);
            return Err(DriverError::Io("link down".into()));
        }

        let session = Arc::new(MockSession {
            live: AtomicBool::new(true),
            fail_subscribe: Mutex::new(*self.fail_subscribe.lock().unwrap()),
            fail_push_start: AtomicBool::new(self.fail_push_start.load(Ordering::SeqCst)),
            ..MockSession::default()
        });
        *self.last.lock().unwrap() = Some(Arc::clone(&session));
        Ok(session)
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn descriptor() -> ConnectionDescriptor {
    ConnectionDescriptor::new(Transport::Socket {
        host: "10.0.0.5".into(),
        port: 4403,
        auto_reconnect: true,
    })
}

fn bridge_with(driver: &Arc<MockDriver>) -> Bridge {
    Bridge::new(
        BridgeConfig::default(),
        Arc::clone(driver) as Arc<dyn DeviceDriver>,
    )
}

async fn connected_bridge() -> (Arc<MockDriver>, Bridge) {
    let driver = Arc::new(MockDriver::default());
    let bridge = bridge_with(&driver);
    bridge.connect(descriptor()).await.unwrap();
    (driver, bridge)
}

// ── Connection lifecycle ────────────────────────────────────────────

#[tokio::test]
async fn connect_while_live_fails_with_already_connected() {
    let (driver, bridge) = connected_bridge().await;

    let err = bridge.connect(descriptor()).await.unwrap_err();
    assert!(matches!(err, CoreError::AlreadyConnected { .. }));
    assert_eq!(driver.create_calls(), 1);
}

#[tokio::test]
async fn ensure_connected_is_idempotent_with_live_session() {
    let (driver, bridge) = connected_bridge().await;

    bridge.contacts().await.unwrap();
    bridge.device_info().await.unwrap();

    // Two device operations after connect, zero extra creation attempts.
    assert_eq!(driver.create_calls(), 1);
}

#[tokio::test]
async fn reconnects_from_stored_descriptor_when_liveness_lost() {
    let (driver, bridge) = connected_bridge().await;

    // Kill the link out from under the bridge.
    driver.last_session().live.store(false, Ordering::SeqCst);

    let contacts = bridge.contacts().await.unwrap();
    assert_eq!(contacts[0].name, "Alice");
    assert_eq!(driver.create_calls(), 2);

    // The recreation reused the exact original parameters.
    let descriptors = driver.descriptors.lock().unwrap();
    assert_eq!(descriptors[0], descriptors[1]);
    assert_eq!(descriptors[1].reconnect_budget(), Some(5));
}

#[tokio::test]
async fn connect_failure_retains_no_descriptor() {
    let driver = Arc::new(MockDriver::default());
    driver.fail_next_creates.store(1, Ordering::SeqCst);
    let bridge = bridge_with(&driver);

    let err = bridge.connect(descriptor()).await.unwrap_err();
    assert!(matches!(err, CoreError::ConnectFailed { .. }));

    // No descriptor on file, so nothing to reconnect from.
    let err = bridge.contacts().await.unwrap_err();
    assert!(matches!(err, CoreError::NotConnected));
    assert_eq!(driver.create_calls(), 1);
}

#[tokio::test]
async fn reconnect_failure_keeps_descriptor_for_later_retry() {
    let (driver, bridge) = connected_bridge().await;

    driver.last_session().live.store(false, Ordering::SeqCst);
    driver.fail_next_creates.store(1, Ordering::SeqCst);

    let err = bridge.contacts().await.unwrap_err();
    assert!(matches!(err, CoreError::ReconnectFailed { .. }));

    // Next call retries from the retained descriptor and succeeds.
    bridge.contacts().await.unwrap();
    assert_eq!(driver.create_calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn connection_attempt_times_out_cleanly() {
    let driver = Arc::new(MockDriver::default());
    driver.hang.store(true, Ordering::SeqCst);
    let bridge = Bridge::new(
        BridgeConfig {
            connect_timeout: Duration::from_millis(100),
            ..BridgeConfig::default()
        },
        Arc::clone(&driver) as Arc<dyn DeviceDriver>,
    );

    let err = bridge.connect(descriptor()).await.unwrap_err();
    match err {
        CoreError::ConnectFailed { cause, .. } => {
            assert!(matches!(cause, DriverError::Timeout { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!bridge.is_connected().await);
}

#[tokio::test]
async fn disconnect_when_not_connected_is_a_noop() {
    let driver = Arc::new(MockDriver::default());
    let bridge = bridge_with(&driver);

    assert_eq!(bridge.disconnect().await.unwrap(), None);
}

#[tokio::test]
async fn disconnect_stops_listening_and_clears_everything() {
    let (driver, bridge) = connected_bridge().await;
    bridge.start_listening().await.unwrap();

    let session = driver.last_session();
    let mut records = bridge.message_events();
    session.emit(
        EventKind::ContactMessage,
        json!({"sender": "Alice", "text": "hi"}),
    );
    records.recv().await.unwrap();
    assert_eq!(bridge.buffered_message_count(), 1);

    let transport = bridge.disconnect().await.unwrap();
    assert!(transport.is_some());

    assert!(!bridge.is_listening().await);
    assert_eq!(bridge.buffered_message_count(), 0);
    assert_eq!(session.subscription_count(), 0);
    assert_eq!(session.disconnect_calls.load(Ordering::SeqCst), 1);

    // Descriptor is gone too: nothing to reconnect from.
    let err = bridge.contacts().await.unwrap_err();
    assert!(matches!(err, CoreError::NotConnected));
}

// ── Listening lifecycle ─────────────────────────────────────────────

#[tokio::test]
async fn start_listening_twice_reports_already_listening() {
    let (driver, bridge) = connected_bridge().await;

    assert_eq!(bridge.start_listening().await.unwrap(), StartOutcome::Started);
    let session = driver.last_session();
    assert_eq!(session.subscription_count(), 2);

    assert_eq!(
        bridge.start_listening().await.unwrap(),
        StartOutcome::AlreadyListening
    );
    assert_eq!(session.subscription_count(), 2);
}

#[tokio::test]
async fn stop_then_start_repopulates_subscriptions() {
    let (driver, bridge) = connected_bridge().await;
    bridge.start_listening().await.unwrap();

    let session = driver.last_session();
    let mut records = bridge.message_events();
    session.emit(
        EventKind::ChannelMessage,
        json!({"sender": "Bob", "channel": 0, "text": "hello"}),
    );
    records.recv().await.unwrap();

    assert_eq!(bridge.stop_listening().await.unwrap(), StopOutcome::Stopped);
    assert_eq!(session.subscription_count(), 0);
    // Stop retains the buffer.
    assert_eq!(bridge.buffered_message_count(), 1);

    assert_eq!(bridge.start_listening().await.unwrap(), StartOutcome::Started);
    assert_eq!(session.subscription_count(), 2);
    assert_eq!(bridge.buffered_message_count(), 1);
}

#[tokio::test]
async fn stop_when_not_listening_reports_not_listening() {
    let (_driver, bridge) = connected_bridge().await;
    assert_eq!(
        bridge.stop_listening().await.unwrap(),
        StopOutcome::NotListening
    );
}

#[tokio::test]
async fn subscribe_failure_rolls_back_acquired_handles() {
    let driver = Arc::new(MockDriver::default());
    *driver.fail_subscribe.lock().unwrap() = Some(EventKind::ChannelMessage);
    let bridge = bridge_with(&driver);
    bridge.connect(descriptor()).await.unwrap();

    let err = bridge.start_listening().await.unwrap_err();
    assert!(matches!(err, CoreError::SubscriptionFailed { .. }));

    let session = driver.last_session();
    assert!(!bridge.is_listening().await);
    assert_eq!(session.subscription_count(), 0);
    // The contact-message handle that succeeded was released again.
    assert_eq!(session.released.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn push_delivery_failure_rolls_back_all_handles() {
    let driver = Arc::new(MockDriver::default());
    driver.fail_push_start.store(true, Ordering::SeqCst);
    let bridge = bridge_with(&driver);
    bridge.connect(descriptor()).await.unwrap();

    let err = bridge.start_listening().await.unwrap_err();
    assert!(matches!(err, CoreError::SubscriptionFailed { .. }));

    let session = driver.last_session();
    assert!(!bridge.is_listening().await);
    assert_eq!(session.subscription_count(), 0);
    assert_eq!(session.released.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn advertisements_are_captured_only_when_configured() {
    let driver = Arc::new(MockDriver::default());
    let bridge = Bridge::new(
        BridgeConfig {
            capture_advertisements: true,
            ..BridgeConfig::default()
        },
        Arc::clone(&driver) as Arc<dyn DeviceDriver>,
    );
    bridge.connect(descriptor()).await.unwrap();
    bridge.start_listening().await.unwrap();

    let session = driver.last_session();
    assert_eq!(session.subscription_count(), 3);

    let mut records = bridge.message_events();
    session.emit(EventKind::Advertisement, json!({"sender": "repeater-1"}));
    let record = records.recv().await.unwrap();
    assert_eq!(record.kind, MessageKind::Advertisement);
}

// ── Message flow ────────────────────────────────────────────────────

#[tokio::test]
async fn events_are_normalized_into_the_buffer() {
    let (driver, bridge) = connected_bridge().await;
    bridge.start_listening().await.unwrap();

    let session = driver.last_session();
    let mut records = bridge.message_events();

    session.emit(
        EventKind::ContactMessage,
        json!({"sender": "Alice", "pubkey_prefix": "a1b2", "text": "direct"}),
    );
    session.emit(
        EventKind::ChannelMessage,
        json!({"sender": "Bob", "channel": 5, "text": "broadcast"}),
    );
    records.recv().await.unwrap();
    records.recv().await.unwrap();

    let all = bridge.messages(None, None);
    assert_eq!(all.len(), 2);
    // Most recent first.
    assert_eq!(all[0].text, "broadcast");
    assert_eq!(all[0].channel.map(|c| c.get()), Some(5));
    assert_eq!(all[1].sender, "Alice");
    assert_eq!(all[1].public_key.as_deref(), Some("a1b2"));

    let channels_only = bridge.messages(Some(MessageKind::Channel), None);
    assert_eq!(channels_only.len(), 1);

    assert_eq!(bridge.evict_messages(Some(MessageKind::Contact), None), 1);
    assert_eq!(bridge.buffered_message_count(), 1);
    assert_eq!(bridge.clear_messages(), 1);
}

// ── Send routing and validation ─────────────────────────────────────

#[tokio::test]
async fn send_message_requires_exactly_one_destination() {
    let (_driver, bridge) = connected_bridge().await;

    let err = bridge
        .send_message(Some("Alice"), Some(&"general".into()), "hi")
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::ConflictingDestination));

    let err = bridge.send_message(None, None, "hi").await.unwrap_err();
    assert!(matches!(err, CoreError::ConflictingDestination));
}

#[tokio::test]
async fn send_message_routes_by_destination_kind() {
    let (driver, bridge) = connected_bridge().await;
    let session = driver.last_session();

    bridge
        .send_message(Some("Alice"), None, "direct")
        .await
        .unwrap();
    bridge
        .send_message(None, Some(&"general".into()), "to everyone")
        .await
        .unwrap();
    bridge
        .send_message(None, Some(&5_i64.into()), "to five")
        .await
        .unwrap();

    let sent = session.sent.lock().unwrap();
    assert_eq!(
        *sent,
        vec![
            Sent::Contact {
                destination: "Alice".into(),
                text: "direct".into()
            },
            Sent::Channel {
                channel: 0,
                text: "to everyone".into()
            },
            Sent::Channel {
                channel: 5,
                text: "to five".into()
            },
        ]
    );
}

#[tokio::test]
async fn send_message_rejects_invalid_channel() {
    let (_driver, bridge) = connected_bridge().await;

    let err = bridge
        .send_message(None, Some(&8_i64.into()), "nope")
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidChannel { .. }));
}

// ── Device commands ─────────────────────────────────────────────────

#[tokio::test]
async fn device_commands_pass_through_the_session() {
    let (_driver, bridge) = connected_bridge().await;

    let info = bridge.device_info().await.unwrap();
    assert_eq!(info["name"], "mock-node");

    let battery = bridge.battery().await.unwrap();
    assert_eq!(battery.percent, Some(87));

    let time = bridge.device_time().await.unwrap();
    assert_eq!(time.timestamp(), 1_732_276_800);

    let receipt = bridge.send_advert(true).await.unwrap();
    assert_eq!(receipt.outcome, "ADVERT_SENT");
}

#[tokio::test]
async fn set_device_time_rejects_negative_timestamps() {
    let (_driver, bridge) = connected_bridge().await;

    let err = bridge.set_device_time(-1).await.unwrap_err();
    assert!(matches!(err, CoreError::InvalidTimestamp { value: -1 }));
}
