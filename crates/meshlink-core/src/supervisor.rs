// ── Connection supervision ──
//
// Owns the canonical connection parameters and the at-most-one live
// session. Everything that talks to the device goes through
// `ensure_connected`, so the whole crate shares one reconnection policy.

use std::sync::Arc;
use std::time::Duration;

use meshlink_driver::{ConnectionDescriptor, DeviceDriver, DeviceSession, DriverError, TransportKind};
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

use crate::error::CoreError;

/// Connection state observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

/// The session and descriptor are updated together, always under the
/// slot mutex. Holding the lock across driver I/O is deliberate: two
/// concurrent callers must never both attempt to create or tear down
/// a session.
struct SessionSlot {
    session: Option<Arc<dyn DeviceSession>>,
    descriptor: Option<ConnectionDescriptor>,
}

pub struct ConnectionSupervisor {
    driver: Arc<dyn DeviceDriver>,
    connect_timeout: Duration,
    slot: Mutex<SessionSlot>,
    state_tx: watch::Sender<ConnectionState>,
}

impl ConnectionSupervisor {
    pub fn new(driver: Arc<dyn DeviceDriver>, connect_timeout: Duration) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            driver,
            connect_timeout,
            slot: Mutex::new(SessionSlot {
                session: None,
                descriptor: None,
            }),
            state_tx,
        }
    }

    /// Subscribe to connection state changes.
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// First-use connection. Fails loudly if a live session already
    /// exists; a stale (dead) session is silently replaced along with
    /// its descriptor.
    pub async fn connect(&self, descriptor: ConnectionDescriptor) -> Result<(), CoreError> {
        let mut slot = self.slot.lock().await;

        if let Some(session) = &slot.session {
            if session.is_live() {
                let transport = slot
                    .descriptor
                    .as_ref()
                    .map_or_else(|| descriptor.kind(), ConnectionDescriptor::kind);
                return Err(CoreError::AlreadyConnected { transport });
            }
        }

        let _ = self.state_tx.send(ConnectionState::Connecting);

        match self.create_session(&descriptor).await {
            Ok(session) => {
                info!(transport = %descriptor.kind(), "connected to device");
                slot.session = Some(session);
                slot.descriptor = Some(descriptor);
                let _ = self.state_tx.send(ConnectionState::Connected);
                Ok(())
            }
            Err(cause) => {
                slot.session = None;
                slot.descriptor = None;
                let _ = self.state_tx.send(ConnectionState::Disconnected);
                Err(CoreError::ConnectFailed {
                    transport: descriptor.kind(),
                    cause,
                })
            }
        }
    }

    /// Idempotent precondition for every device operation.
    ///
    /// Returns the live session without I/O when one exists. Otherwise
    /// performs exactly one recreation attempt from the stored
    /// descriptor; on failure the session stays cleared but the
    /// descriptor is kept so a later call can retry.
    pub async fn ensure_connected(&self) -> Result<Arc<dyn DeviceSession>, CoreError> {
        let mut slot = self.slot.lock().await;

        if let Some(session) = &slot.session {
            if session.is_live() {
                return Ok(Arc::clone(session));
            }
            debug!("stored session is no longer live");
        }

        let Some(descriptor) = slot.descriptor.clone() else {
            return Err(CoreError::NotConnected);
        };

        slot.session = None;
        let _ = self.state_tx.send(ConnectionState::Reconnecting);
        debug!(transport = %descriptor.kind(), "recreating session from stored descriptor");

        match self.create_session(&descriptor).await {
            Ok(session) => {
                slot.session = Some(Arc::clone(&session));
                let _ = self.state_tx.send(ConnectionState::Connected);
                info!(transport = %descriptor.kind(), "session re-established");
                Ok(session)
            }
            Err(cause) => {
                // Descriptor stays on file for the next attempt.
                let _ = self.state_tx.send(ConnectionState::Disconnected);
                warn!(error = %cause, "auto-reconnect failed");
                Err(CoreError::ReconnectFailed { cause })
            }
        }
    }

    /// The current session, if any, without liveness checks or I/O.
    pub async fn current_session(&self) -> Option<Arc<dyn DeviceSession>> {
        self.slot.lock().await.session.clone()
    }

    pub async fn is_connected(&self) -> bool {
        self.slot
            .lock()
            .await
            .session
            .as_ref()
            .is_some_and(|s| s.is_live())
    }

    /// Tear down the session and forget the descriptor.
    ///
    /// Local state is cleared before the driver teardown runs, so even
    /// an erroring teardown never leaves a half-torn-down session
    /// referenced. Returns the transport that was connected, if any.
    pub async fn teardown(&self) -> Result<Option<TransportKind>, CoreError> {
        let mut slot = self.slot.lock().await;

        let transport = slot.descriptor.take().map(|d| d.kind());
        let Some(session) = slot.session.take() else {
            return Ok(None);
        };
        let _ = self.state_tx.send(ConnectionState::Disconnected);

        // Keep the slot locked across the driver teardown so a racing
        // connect cannot start until the old link is fully down.
        session.disconnect().await.map_err(CoreError::Driver)?;
        info!(transport = ?transport, "disconnected");
        Ok(transport)
    }

    async fn create_session(
        &self,
        descriptor: &ConnectionDescriptor,
    ) -> Result<Arc<dyn DeviceSession>, DriverError> {
        match tokio::time::timeout(self.connect_timeout, self.driver.create_session(descriptor))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(DriverError::Timeout {
                timeout_secs: self.connect_timeout.as_secs(),
            }),
        }
    }
}
