// ── Push-event subscriptions ──
//
// Attaches normalizing callbacks to a live session and routes incoming
// events into the ring buffer. Driver callbacks only enqueue onto an
// internal channel; a single drain task owns buffer mutation, so the
// driver's delivery context never blocks.

use std::sync::Arc;

use meshlink_driver::{DeviceSession, Event, EventCallback, EventKind, SubscriptionHandle};
use tokio::sync::{Mutex, broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::buffer::MessageRingBuffer;
use crate::error::CoreError;
use crate::model::MessageRecord;

const EVENT_QUEUE_SIZE: usize = 256;
const RECORD_CHANNEL_SIZE: usize = 256;

/// Outcome of a `start` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyListening,
}

/// Outcome of a `stop` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped,
    NotListening,
}

/// The listening flag and the handle set are only ever updated together,
/// under this mutex.
struct ListenState {
    listening: bool,
    handles: Vec<Box<dyn SubscriptionHandle>>,
    drain: Option<(CancellationToken, JoinHandle<()>)>,
}

pub struct EventSubscriptionRegistry {
    buffer: Arc<MessageRingBuffer>,
    record_tx: broadcast::Sender<Arc<MessageRecord>>,
    capture_advertisements: bool,
    state: Mutex<ListenState>,
}

impl EventSubscriptionRegistry {
    pub fn new(buffer: Arc<MessageRingBuffer>, capture_advertisements: bool) -> Self {
        let (record_tx, _) = broadcast::channel(RECORD_CHANNEL_SIZE);
        Self {
            buffer,
            record_tx,
            capture_advertisements,
            state: Mutex::new(ListenState {
                listening: false,
                handles: Vec::new(),
                drain: None,
            }),
        }
    }

    /// Subscribe to normalized records as they are appended.
    pub fn records(&self) -> broadcast::Receiver<Arc<MessageRecord>> {
        self.record_tx.subscribe()
    }

    pub async fn is_listening(&self) -> bool {
        self.state.lock().await.listening
    }

    pub async fn subscription_count(&self) -> usize {
        self.state.lock().await.handles.len()
    }

    /// Activate listening on the given session. Idempotent.
    ///
    /// All-or-nothing: if any subscribe step or the push-delivery start
    /// fails partway, every already-acquired handle is released and the
    /// listening flag stays false.
    pub async fn start(
        &self,
        session: &Arc<dyn DeviceSession>,
    ) -> Result<StartOutcome, CoreError> {
        let mut state = self.state.lock().await;
        if state.listening {
            debug!(
                subscriptions = state.handles.len(),
                "already listening, nothing to do"
            );
            return Ok(StartOutcome::AlreadyListening);
        }

        let (event_tx, event_rx) = mpsc::channel::<Event>(EVENT_QUEUE_SIZE);

        let mut kinds = vec![EventKind::ContactMessage, EventKind::ChannelMessage];
        if self.capture_advertisements {
            kinds.push(EventKind::Advertisement);
        }

        let mut handles: Vec<Box<dyn SubscriptionHandle>> = Vec::with_capacity(kinds.len());
        for kind in kinds {
            let tx = event_tx.clone();
            let callback: EventCallback = Arc::new(move |event: Event| {
                // Runs on the driver's delivery context: enqueue and
                // return, shedding events if the drain falls behind.
                if tx.try_send(event).is_err() {
                    warn!(kind = ?kind, "event queue full, dropping event");
                }
            });

            match session.subscribe(kind, callback) {
                Ok(handle) => {
                    debug!(kind = ?kind, "subscribed");
                    handles.push(handle);
                }
                Err(cause) => {
                    warn!(kind = ?kind, error = %cause, "subscribe failed, rolling back");
                    release_all(handles);
                    return Err(CoreError::SubscriptionFailed { cause });
                }
            }
        }

        if let Err(cause) = session.start_push_delivery().await {
            warn!(error = %cause, "push delivery failed to start, rolling back");
            release_all(handles);
            return Err(CoreError::SubscriptionFailed { cause });
        }

        let cancel = CancellationToken::new();
        let task = tokio::spawn(drain_task(
            event_rx,
            Arc::clone(&self.buffer),
            self.record_tx.clone(),
            cancel.clone(),
        ));

        state.handles = handles;
        state.drain = Some((cancel, task));
        state.listening = true;
        debug!(
            subscriptions = state.handles.len(),
            "listening for device events"
        );
        Ok(StartOutcome::Started)
    }

    /// Deactivate listening. Idempotent. The message buffer is retained.
    ///
    /// When the session is already gone the push-delivery stop is
    /// skipped silently; a driver error stopping delivery is logged and
    /// cleanup continues regardless.
    pub async fn stop(
        &self,
        session: Option<&Arc<dyn DeviceSession>>,
    ) -> Result<StopOutcome, CoreError> {
        let mut state = self.state.lock().await;
        if !state.listening {
            return Ok(StopOutcome::NotListening);
        }

        if let Some(session) = session {
            if session.is_live() {
                if let Err(e) = session.stop_push_delivery().await {
                    warn!(error = %e, "failed to stop push delivery, continuing cleanup");
                }
            }
        }

        let count = state.handles.len();
        release_all(state.handles.drain(..).collect());

        if let Some((cancel, task)) = state.drain.take() {
            cancel.cancel();
            let _ = task.await;
        }

        state.listening = false;
        debug!(released = count, buffered = self.buffer.len(), "stopped listening");
        Ok(StopOutcome::Stopped)
    }
}

fn release_all(handles: Vec<Box<dyn SubscriptionHandle>>) {
    for handle in handles {
        handle.release();
    }
}

/// Drains raw events off the internal queue, normalizes them, and
/// appends to the ring buffer. Ends when cancelled or when every
/// producing callback has been released.
async fn drain_task(
    mut event_rx: mpsc::Receiver<Event>,
    buffer: Arc<MessageRingBuffer>,
    record_tx: broadcast::Sender<Arc<MessageRecord>>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            event = event_rx.recv() => {
                let Some(event) = event else { break };
                let record = Arc::new(MessageRecord::from_event(&event));
                debug!(
                    kind = %record.kind,
                    sender = %record.sender,
                    "event normalized"
                );
                buffer.append(Arc::clone(&record));
                let _ = record_tx.send(record);
            }
        }
    }
}
