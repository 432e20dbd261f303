// meshlink-driver: capability surface between meshlink-core and a concrete
// radio driver. Defines *what* a driver must provide (session creation,
// push-event subscription, the command set) without implementing any wire
// protocol -- real drivers live out-of-tree, tests use mocks.

pub mod descriptor;
pub mod error;
pub mod event;
pub mod session;
pub mod types;

// ── Primary re-exports ──────────────────────────────────────────────
pub use descriptor::{ConnectionDescriptor, Transport, TransportKind};
pub use error::DriverError;
pub use event::{Event, EventCallback, EventKind};
pub use session::{DeviceDriver, DeviceSession, SubscriptionHandle};
pub use types::{BatteryStatus, Contact, SendReceipt};
