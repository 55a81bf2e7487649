//! Deferred push delivery of agent responses.
//!
//! Each scheduled message gets its own tokio task that sleeps for the
//! configured latency and then broadcasts to every live session of the
//! receiving user. Tasks are tracked by message id and only stop early when
//! the scheduler is shut down.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use mindvolta_core::types::Message;

use crate::error::ChatError;
use crate::registry::ConnectionRegistry;
use crate::types::{MessageView, PushEvent};

type PendingMap = HashMap<Uuid, JoinHandle<()>>;

/// Schedules delayed broadcasts through a [`ConnectionRegistry`].
#[derive(Clone)]
pub struct DeliveryScheduler {
    registry: Arc<ConnectionRegistry>,
    delay: Duration,
    pending: Arc<Mutex<PendingMap>>,
    shutdown: CancellationToken,
}

impl DeliveryScheduler {
    pub fn new(registry: Arc<ConnectionRegistry>, delay: Duration) -> Self {
        Self {
            registry,
            delay,
            pending: Arc::new(Mutex::new(HashMap::new())),
            shutdown: CancellationToken::new(),
        }
    }

    /// Deliver `message` to its receiver's sessions after the delay.
    ///
    /// Returns immediately. Fails only when the scheduler has been shut down
    /// or no tokio runtime is available to run the task.
    pub fn schedule(&self, message: Message) -> Result<(), ChatError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| ChatError::Delivery(format!("no runtime for deferred delivery: {}", e)))?;

        // Checked and inserted under the lock `shutdown` drains, so every
        // accepted task is awaited. Held across spawn so the task cannot
        // remove itself before insertion.
        let mut guard = lock(&self.pending);
        if self.shutdown.is_cancelled() {
            return Err(ChatError::Delivery("scheduler is shut down".to_string()));
        }

        let message_id = message.id;
        let registry = self.registry.clone();
        let pending = self.pending.clone();
        let token = self.shutdown.clone();
        let delay = self.delay;

        let handle = runtime.spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    let receiver = message.receiver_id.clone();
                    let event = PushEvent::ReceiveMessage(MessageView::for_viewer(&message, &receiver));
                    match registry.broadcast(&receiver, &event) {
                        Ok(count) => debug!(
                            message = %message.id,
                            user = %receiver,
                            sessions = count,
                            "Agent response delivered"
                        ),
                        Err(e) => warn!(
                            message = %message.id,
                            user = %receiver,
                            "Push delivery skipped: {}",
                            e
                        ),
                    }
                }
                _ = token.cancelled() => {
                    debug!(message = %message.id, "Deferred delivery cancelled");
                }
            }
            lock(&pending).remove(&message.id);
        });
        guard.insert(message_id, handle);
        Ok(())
    }

    /// Number of deliveries that have not fired yet.
    pub fn pending_count(&self) -> usize {
        lock(&self.pending).len()
    }

    pub fn is_pending(&self, message_id: Uuid) -> bool {
        lock(&self.pending).contains_key(&message_id)
    }

    /// Cancel every pending delivery and wait for the tasks to finish.
    ///
    /// Later calls to [`schedule`](Self::schedule) fail.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let handles: Vec<JoinHandle<()>> = lock(&self.pending).drain().map(|(_, h)| h).collect();
        let count = handles.len();
        for handle in handles {
            if let Err(e) = handle.await {
                warn!("Deferred delivery task failed: {}", e);
            }
        }
        info!(cancelled = count, "Delivery scheduler shut down");
    }
}

impl std::fmt::Debug for DeliveryScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryScheduler")
            .field("delay", &self.delay)
            .field("pending", &self.pending_count())
            .finish()
    }
}

fn lock(pending: &Mutex<PendingMap>) -> MutexGuard<'_, PendingMap> {
    pending.lock().unwrap_or_else(|e| e.into_inner())
}
