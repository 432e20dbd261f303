// ── Connection descriptors ──
//
// These types describe *how* to reach a device. A descriptor is captured
// once at connect time and reused verbatim for every later recreation of
// the session, so it must carry everything the driver needs.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Reconnection budget handed to the driver for socket transports that
/// requested `auto_reconnect` at connect time.
pub const SOCKET_RECONNECT_ATTEMPTS: u32 = 5;

/// The physical transport family a descriptor targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Serial,
    Wireless,
    Socket,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Wire names match the strings the original device tooling accepts.
        let s = match self {
            TransportKind::Serial => "serial",
            TransportKind::Wireless => "ble",
            TransportKind::Socket => "tcp",
        };
        f.write_str(s)
    }
}

/// Transport-specific connection parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Transport {
    /// Direct serial link (USB or UART).
    Serial { port: String, baud_rate: u32 },
    /// Short-range wireless (BLE) link, addressed by MAC.
    #[serde(rename = "ble")]
    Wireless { address: String, pin: Option<String> },
    /// Network socket to a device exposed over TCP.
    #[serde(rename = "tcp")]
    Socket {
        host: String,
        port: u16,
        auto_reconnect: bool,
    },
}

impl Transport {
    /// Conventional serial defaults for the reference hardware.
    pub fn serial_default() -> Self {
        Transport::Serial {
            port: "/dev/ttyUSB0".into(),
            baud_rate: 115_200,
        }
    }

    pub fn kind(&self) -> TransportKind {
        match self {
            Transport::Serial { .. } => TransportKind::Serial,
            Transport::Wireless { .. } => TransportKind::Wireless,
            Transport::Socket { .. } => TransportKind::Socket,
        }
    }
}

/// Immutable snapshot of everything needed to (re-)establish a session.
///
/// Created on a successful connect and retained until an explicit
/// disconnect; reconnection attempts reuse it without modification,
/// including the socket reconnection budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionDescriptor {
    pub transport: Transport,
    /// Driver-level debug logging requested at connect time.
    #[serde(default)]
    pub debug: bool,
}

impl ConnectionDescriptor {
    pub fn new(transport: Transport) -> Self {
        Self {
            transport,
            debug: false,
        }
    }

    pub fn kind(&self) -> TransportKind {
        self.transport.kind()
    }

    /// Reconnection budget the driver should apply, if the transport
    /// asked for one at connect time.
    pub fn reconnect_budget(&self) -> Option<u32> {
        match &self.transport {
            Transport::Socket {
                auto_reconnect: true,
                ..
            } => Some(SOCKET_RECONNECT_ATTEMPTS),
            _ => None,
        }
    }
}
