// ── Driver capability traits ──
//
// The seam between meshlink-core and a concrete radio driver. The core
// only ever holds `Arc<dyn DeviceSession>` / `Box<dyn SubscriptionHandle>`;
// it never sees transport details beyond the descriptor it handed in.

use std::sync::Arc;

use async_trait::async_trait;

use crate::descriptor::ConnectionDescriptor;
use crate::error::DriverError;
use crate::event::{EventCallback, EventKind};
use crate::types::{BatteryStatus, Contact, SendReceipt};

/// Factory capability: turns a descriptor into a live session.
#[async_trait]
pub trait DeviceDriver: Send + Sync {
    /// Establish a session from the descriptor's exact parameters.
    ///
    /// May block on I/O; callers bound it with a timeout. A failed
    /// attempt must not leave a half-constructed session behind.
    async fn create_session(
        &self,
        descriptor: &ConnectionDescriptor,
    ) -> Result<Arc<dyn DeviceSession>, DriverError>;
}

/// A live connection to the device.
#[async_trait]
pub trait DeviceSession: Send + Sync {
    /// Whether the underlying link is still up. Cheap, never blocks.
    fn is_live(&self) -> bool;

    /// Register a callback for one event kind.
    ///
    /// The callback runs on the driver's delivery context and must not
    /// block. The returned handle keeps the registration alive until
    /// released.
    fn subscribe(
        &self,
        kind: EventKind,
        callback: EventCallback,
    ) -> Result<Box<dyn SubscriptionHandle>, DriverError>;

    /// Begin pushing events to registered callbacks (the driver's
    /// message-fetch loop).
    async fn start_push_delivery(&self) -> Result<(), DriverError>;

    /// Stop pushing events. Registered callbacks stay registered.
    async fn stop_push_delivery(&self) -> Result<(), DriverError>;

    /// Tear down the connection. The session is invalid afterwards.
    async fn disconnect(&self) -> Result<(), DriverError>;

    // ── Command surface ──────────────────────────────────────────

    async fn send_contact_message(
        &self,
        destination: &str,
        text: &str,
    ) -> Result<SendReceipt, DriverError>;

    async fn send_channel_message(
        &self,
        channel: u8,
        text: &str,
    ) -> Result<SendReceipt, DriverError>;

    async fn contacts(&self) -> Result<Vec<Contact>, DriverError>;

    /// Device identity and configuration, shape varies by firmware.
    async fn device_info(&self) -> Result<serde_json::Value, DriverError>;

    async fn battery(&self) -> Result<BatteryStatus, DriverError>;

    /// Device clock as Unix seconds.
    async fn device_time(&self) -> Result<i64, DriverError>;

    async fn set_device_time(&self, unix_secs: i64) -> Result<(), DriverError>;

    /// Announce this node to the mesh. `flood` repeats the advert
    /// through repeaters instead of a zero-hop broadcast.
    async fn send_advert(&self, flood: bool) -> Result<SendReceipt, DriverError>;
}

/// Opaque token for one active push-event registration.
///
/// Releasable exactly once; consuming `self` makes double-release
/// unrepresentable. Dropping without release is allowed and equivalent.
pub trait SubscriptionHandle: Send {
    fn release(self: Box<Self>);
}
