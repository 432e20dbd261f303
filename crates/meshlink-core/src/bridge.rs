// ── Bridge facade ──
//
// The main entry point for consumers. Composes the supervisor, the
// subscription registry, and the ring buffer behind one cheaply
// cloneable handle. Constructed once at startup with an injected driver;
// there is no ambient global state anywhere in the crate.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use meshlink_driver::{
    BatteryStatus, ConnectionDescriptor, Contact, DeviceDriver, SendReceipt, TransportKind,
};
use tokio::sync::{Mutex, broadcast, watch};
use tracing::debug;

use crate::buffer::MessageRingBuffer;
use crate::channels::{self, ChannelRef};
use crate::config::BridgeConfig;
use crate::error::CoreError;
use crate::model::{MessageKind, MessageRecord};
use crate::registry::{EventSubscriptionRegistry, StartOutcome, StopOutcome};
use crate::supervisor::{ConnectionState, ConnectionSupervisor};

/// Bridges many stateless callers to one persistent device connection.
///
/// Cheaply cloneable via `Arc<BridgeInner>`. Every device operation
/// first ensures a live session (reconnecting from the stored descriptor
/// when needed), so all callers share a single reconnection policy.
#[derive(Clone)]
pub struct Bridge {
    inner: Arc<BridgeInner>,
}

struct BridgeInner {
    supervisor: ConnectionSupervisor,
    registry: EventSubscriptionRegistry,
    buffer: Arc<MessageRingBuffer>,
    /// Serializes connect / disconnect / start / stop so that listening
    /// transitions can never interleave with a teardown.
    lifecycle: Mutex<()>,
}

impl Bridge {
    /// Create a new Bridge. Does NOT connect -- call
    /// [`connect()`](Self::connect) with a descriptor first.
    pub fn new(config: BridgeConfig, driver: Arc<dyn DeviceDriver>) -> Self {
        let buffer = Arc::new(MessageRingBuffer::new(config.buffer_capacity));
        Self {
            inner: Arc::new(BridgeInner {
                supervisor: ConnectionSupervisor::new(driver, config.connect_timeout),
                registry: EventSubscriptionRegistry::new(
                    Arc::clone(&buffer),
                    config.capture_advertisements,
                ),
                buffer,
                lifecycle: Mutex::new(()),
            }),
        }
    }

    // ── Connection lifecycle ─────────────────────────────────────

    /// Connect to the device. Fails with
    /// [`AlreadyConnected`](CoreError::AlreadyConnected) while a live
    /// session exists.
    pub async fn connect(&self, descriptor: ConnectionDescriptor) -> Result<(), CoreError> {
        let _guard = self.inner.lifecycle.lock().await;
        self.inner.supervisor.connect(descriptor).await
    }

    /// Disconnect from the device.
    ///
    /// Stops listening (releasing all subscriptions), clears the message
    /// buffer, tears the session down, and forgets the descriptor.
    /// No-op success when not connected. Cleanup is best-effort: local
    /// state is cleared even when the driver teardown errors.
    pub async fn disconnect(&self) -> Result<Option<TransportKind>, CoreError> {
        let _guard = self.inner.lifecycle.lock().await;

        let session = self.inner.supervisor.current_session().await;
        self.inner.registry.stop(session.as_ref()).await?;
        let cleared = self.inner.buffer.clear();
        if cleared > 0 {
            debug!(cleared, "dropped buffered messages on disconnect");
        }
        self.inner.supervisor.teardown().await
    }

    /// Subscribe to connection state changes.
    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.supervisor.state()
    }

    pub async fn is_connected(&self) -> bool {
        self.inner.supervisor.is_connected().await
    }

    // ── Event listening ──────────────────────────────────────────

    /// Start listening for contact and channel messages (and
    /// advertisements, when configured). Idempotent.
    pub async fn start_listening(&self) -> Result<StartOutcome, CoreError> {
        let _guard = self.inner.lifecycle.lock().await;

        // Idempotence check before any reconnection I/O.
        if self.inner.registry.is_listening().await {
            return Ok(StartOutcome::AlreadyListening);
        }

        let session = self.inner.supervisor.ensure_connected().await?;
        self.inner.registry.start(&session).await
    }

    /// Stop listening. Idempotent. Buffered messages are retained.
    pub async fn stop_listening(&self) -> Result<StopOutcome, CoreError> {
        let _guard = self.inner.lifecycle.lock().await;

        let session = self.inner.supervisor.current_session().await;
        self.inner.registry.stop(session.as_ref()).await
    }

    pub async fn is_listening(&self) -> bool {
        self.inner.registry.is_listening().await
    }

    // ── Message buffer (read side, independent of session state) ──

    /// Buffered messages, most recent first.
    pub fn messages(
        &self,
        filter: Option<MessageKind>,
        limit: Option<usize>,
    ) -> Vec<Arc<MessageRecord>> {
        self.inner.buffer.query(filter, limit)
    }

    /// Remove buffered messages; see
    /// [`MessageRingBuffer::evict`] for the three modes.
    pub fn evict_messages(&self, filter: Option<MessageKind>, limit: Option<usize>) -> usize {
        self.inner.buffer.evict(filter, limit)
    }

    /// Clear the buffer, returning how many messages were dropped.
    pub fn clear_messages(&self) -> usize {
        self.inner.buffer.clear()
    }

    pub fn buffered_message_count(&self) -> usize {
        self.inner.buffer.len()
    }

    /// Subscribe to normalized records as they arrive.
    pub fn message_events(&self) -> broadcast::Receiver<Arc<MessageRecord>> {
        self.inner.registry.records()
    }

    // ── Device operations ────────────────────────────────────────

    /// Send a text message to a contact or a broadcast channel.
    ///
    /// Exactly one of `destination` / `channel` must be given.
    pub async fn send_message(
        &self,
        destination: Option<&str>,
        channel: Option<&ChannelRef>,
        text: &str,
    ) -> Result<SendReceipt, CoreError> {
        let session = self.inner.supervisor.ensure_connected().await?;

        match (destination, channel) {
            (Some(_), Some(_)) | (None, None) => Err(CoreError::ConflictingDestination),
            (None, Some(channel)) => {
                let index = channels::resolve(Some(channel))?
                    .ok_or(CoreError::ConflictingDestination)?;
                debug!(channel = %index.label(), "sending channel message");
                let receipt = session.send_channel_message(index.get(), text).await?;
                Ok(receipt)
            }
            (Some(destination), None) => {
                debug!(destination, "sending contact message");
                let receipt = session.send_contact_message(destination, text).await?;
                Ok(receipt)
            }
        }
    }

    /// The device's contact list.
    pub async fn contacts(&self) -> Result<Vec<Contact>, CoreError> {
        let session = self.inner.supervisor.ensure_connected().await?;
        Ok(session.contacts().await?)
    }

    /// Device identity and configuration; shape varies by firmware.
    pub async fn device_info(&self) -> Result<serde_json::Value, CoreError> {
        let session = self.inner.supervisor.ensure_connected().await?;
        Ok(session.device_info().await?)
    }

    pub async fn battery(&self) -> Result<BatteryStatus, CoreError> {
        let session = self.inner.supervisor.ensure_connected().await?;
        Ok(session.battery().await?)
    }

    /// The device clock.
    pub async fn device_time(&self) -> Result<DateTime<Utc>, CoreError> {
        let session = self.inner.supervisor.ensure_connected().await?;
        let unix_secs = session.device_time().await?;
        DateTime::from_timestamp(unix_secs, 0)
            .ok_or(CoreError::InvalidTimestamp { value: unix_secs })
    }

    /// Set the device clock to the given Unix seconds.
    pub async fn set_device_time(&self, unix_secs: i64) -> Result<(), CoreError> {
        if unix_secs < 0 {
            return Err(CoreError::InvalidTimestamp { value: unix_secs });
        }
        let session = self.inner.supervisor.ensure_connected().await?;
        Ok(session.set_device_time(unix_secs).await?)
    }

    /// Synchronize the device clock to the local system time, returning
    /// the time that was set.
    pub async fn sync_clock(&self) -> Result<DateTime<Utc>, CoreError> {
        let now = Utc::now();
        self.set_device_time(now.timestamp()).await?;
        Ok(now)
    }

    /// Announce this node to the mesh; `flood` repeats the advert
    /// through repeaters instead of a zero-hop broadcast.
    pub async fn send_advert(&self, flood: bool) -> Result<SendReceipt, CoreError> {
        let session = self.inner.supervisor.ensure_connected().await?;
        Ok(session.send_advert(flood).await?)
    }
}
