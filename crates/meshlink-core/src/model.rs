// ── Normalized message records ──
//
// The shape everything device-pushed is reduced to before it enters the
// ring buffer. Records are immutable after construction and shared as
// `Arc<MessageRecord>` between the buffer and live subscribers.

use chrono::{DateTime, Utc};
use meshlink_driver::{Event, EventKind};
use serde::{Deserialize, Serialize};

use crate::channels::ChannelIndex;

/// Kind of a buffered record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Direct message from a contact.
    Contact,
    /// Broadcast message on a shared channel.
    Channel,
    /// Presence announcement (buffered only when the capture policy is on).
    Advertisement,
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MessageKind::Contact => "contact",
            MessageKind::Channel => "channel",
            MessageKind::Advertisement => "advertisement",
        };
        f.write_str(s)
    }
}

/// One normalized, immutable message as seen by read-side callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    pub kind: MessageKind,
    /// Local receive time; the mesh does not carry a trustworthy clock.
    pub timestamp: DateTime<Utc>,
    pub sender: String,
    /// Public key prefix identifying the sender, when the device sent one.
    pub public_key: Option<String>,
    /// Set for channel messages whose payload carried a valid index.
    pub channel: Option<ChannelIndex>,
    pub text: String,
    /// Payload exactly as delivered, for callers that need fields the
    /// normalization does not surface.
    pub raw_payload: serde_json::Value,
}

impl MessageRecord {
    /// Normalize a raw push event. Missing payload fields fall back to
    /// placeholders rather than failing -- a malformed event still
    /// produces a record.
    pub fn from_event(event: &Event) -> Self {
        let payload = &event.payload;

        let kind = match event.kind {
            EventKind::ContactMessage => MessageKind::Contact,
            EventKind::ChannelMessage => MessageKind::Channel,
            EventKind::Advertisement => MessageKind::Advertisement,
        };

        let channel = match kind {
            MessageKind::Channel => payload
                .get("channel")
                .and_then(serde_json::Value::as_u64)
                .and_then(|n| u8::try_from(n).ok())
                .and_then(ChannelIndex::new),
            _ => None,
        };

        Self {
            kind,
            timestamp: Utc::now(),
            sender: string_field(payload, "sender").unwrap_or_else(|| "Unknown".into()),
            public_key: string_field(payload, "pubkey_prefix")
                .or_else(|| string_field(payload, "sender_key")),
            channel,
            text: string_field(payload, "text").unwrap_or_default(),
            raw_payload: payload.clone(),
        }
    }
}

fn string_field(payload: &serde_json::Value, key: &str) -> Option<String> {
    payload.get(key).and_then(|v| v.as_str()).map(String::from)
}
