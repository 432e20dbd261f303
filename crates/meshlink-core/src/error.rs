// ── Core error types ──
//
// Caller-facing errors from meshlink-core. Every failure is returned as
// a value at the boundary of the component that detects it; nothing in
// this crate is allowed to take down the process. Driver-level failures
// are wrapped, never exposed raw, except on the plain command surface
// where `Driver` passes them through with context intact.

use meshlink_driver::{DriverError, TransportKind};
use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Session lifecycle ────────────────────────────────────────────
    /// An operation needs a session and none can be established because
    /// no descriptor is on file.
    #[error("not connected -- connect first")]
    NotConnected,

    /// `connect` was called while a session is already live.
    #[error("already connected via {transport} -- disconnect first")]
    AlreadyConnected { transport: TransportKind },

    /// The initial connection attempt failed. No descriptor is retained.
    #[error("connection via {transport} failed: {cause}")]
    ConnectFailed {
        transport: TransportKind,
        #[source]
        cause: DriverError,
    },

    /// A later session recreation failed. The descriptor is retained so
    /// a future `ensure_connected` can retry.
    #[error("auto-reconnect failed: {cause}")]
    ReconnectFailed {
        #[source]
        cause: DriverError,
    },

    // ── Validation ───────────────────────────────────────────────────
    /// Out-of-range channel number or unrecognized channel alias.
    #[error("invalid channel '{value}': {reason}")]
    InvalidChannel { value: String, reason: String },

    /// Both a direct destination and a channel were supplied, or neither.
    #[error("specify either a destination or a channel, not both")]
    ConflictingDestination,

    /// Device clocks only understand non-negative Unix seconds.
    #[error("timestamp must be non-negative, got {value}")]
    InvalidTimestamp { value: i64 },

    // ── Event delivery ───────────────────────────────────────────────
    /// Partial failure while activating listening; all already-acquired
    /// subscriptions were rolled back.
    #[error("failed to start listening: {cause}")]
    SubscriptionFailed {
        #[source]
        cause: DriverError,
    },

    // ── Command surface ──────────────────────────────────────────────
    /// A device command failed at the driver level.
    #[error(transparent)]
    Driver(#[from] DriverError),
}
