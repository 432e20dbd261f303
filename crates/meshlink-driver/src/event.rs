// ── Push events ──
//
// Events the device delivers on its own schedule once push delivery is
// started. Payloads stay as raw JSON here; normalization into typed
// records is the core's job.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// The fixed set of push-event kinds a session can deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Direct message from a known contact.
    ContactMessage,
    /// Broadcast message on one of the shared channels.
    ChannelMessage,
    /// Presence announcement from a nearby node.
    Advertisement,
}

/// One event as delivered by the driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventKind,
    /// Raw payload exactly as the driver decoded it. Nothing from the
    /// device is dropped before normalization.
    pub payload: serde_json::Value,
}

impl Event {
    pub fn new(kind: EventKind, payload: serde_json::Value) -> Self {
        Self { kind, payload }
    }
}

/// Callback invoked by the driver for each matching event.
///
/// Runs on the driver's own delivery context and must never block --
/// hand the event off to a queue and return.
pub type EventCallback = Arc<dyn Fn(Event) + Send + Sync>;
