// ── Runtime bridge configuration ──
//
// Tuning for a single Bridge instance. The embedding layer (RPC server,
// CLI, ...) constructs one of these and hands it in -- the core never
// reads config files or environment variables itself.

use std::time::Duration;

use crate::buffer::DEFAULT_CAPACITY;

/// Configuration for constructing a [`Bridge`](crate::Bridge).
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Upper bound on any single session creation or recreation attempt.
    /// On timeout the supervisor is left with no live session.
    pub connect_timeout: Duration,

    /// Message buffer capacity, fixed for the bridge's lifetime.
    pub buffer_capacity: usize,

    /// Whether advertisement events are captured into the message buffer
    /// alongside contact and channel messages.
    pub capture_advertisements: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            buffer_capacity: DEFAULT_CAPACITY,
            capture_advertisements: false,
        }
    }
}
