// meshlink-core: session lifecycle and event-delivery core between a
// device driver and stateless callers (RPC layer, CLI, ...).

pub mod bridge;
pub mod buffer;
pub mod channels;
pub mod config;
pub mod error;
pub mod model;
pub mod registry;
pub mod supervisor;

// ── Primary re-exports ──────────────────────────────────────────────
pub use bridge::Bridge;
pub use buffer::{DEFAULT_CAPACITY, MessageRingBuffer};
pub use channels::{ChannelIndex, ChannelRef, resolve};
pub use config::BridgeConfig;
pub use error::CoreError;
pub use model::{MessageKind, MessageRecord};
pub use registry::{EventSubscriptionRegistry, StartOutcome, StopOutcome};
pub use supervisor::{ConnectionState, ConnectionSupervisor};

// Driver-surface types callers need to construct descriptors, inject a
// driver, and read command results.
pub use meshlink_driver::{
    BatteryStatus, ConnectionDescriptor, Contact, DeviceDriver, DeviceSession, DriverError,
    Event, EventCallback, EventKind, SendReceipt, SubscriptionHandle, Transport, TransportKind,
};
