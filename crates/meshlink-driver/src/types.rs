// Normalized command-surface payloads shared between drivers and the core.

use serde::{Deserialize, Serialize};

/// One entry from the device's contact list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub name: String,
    /// Public key prefix the device uses to identify the contact.
    pub public_key: String,
}

/// Battery state as reported by the device.
///
/// Firmware variants report either a raw voltage, a percentage, or both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BatteryStatus {
    pub voltage_mv: Option<u32>,
    pub percent: Option<u8>,
}

/// Acknowledgement returned by the device for a send-style command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendReceipt {
    /// Device-reported outcome name (e.g. `"MSG_SENT"`).
    pub outcome: String,
    /// Raw acknowledgement payload, if any.
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl SendReceipt {
    pub fn new(outcome: impl Into<String>) -> Self {
        Self {
            outcome: outcome.into(),
            payload: serde_json::Value::Null,
        }
    }
}
