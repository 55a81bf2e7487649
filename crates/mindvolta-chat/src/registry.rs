//! Live push-channel sessions.
//!
//! Maps connection ids to the user they joined as, with an outbox per
//! connection. A user may hold several sessions at once (tabs, devices).
//! Membership is in memory only and is lost on restart.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::ChatError;
use crate::types::PushEvent;

/// Identifies one live connection.
pub type ConnectionId = Uuid;

struct Session {
    user_id: String,
    outbox: mpsc::UnboundedSender<PushEvent>,
}

/// Concurrent-safe membership set of push sessions.
#[derive(Default)]
pub struct ConnectionRegistry {
    sessions: RwLock<HashMap<ConnectionId, Session>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `connection_id` as a session of `user_id`.
    ///
    /// Joining again with the same connection id rebinds it.
    pub fn join(
        &self,
        user_id: &str,
        connection_id: ConnectionId,
        outbox: mpsc::UnboundedSender<PushEvent>,
    ) {
        let previous = self.write().insert(
            connection_id,
            Session {
                user_id: user_id.to_string(),
                outbox,
            },
        );
        match previous {
            Some(old) if old.user_id != user_id => info!(
                connection = %connection_id,
                from = %old.user_id,
                to = %user_id,
                "Session rebound to another user"
            ),
            _ => debug!(connection = %connection_id, user = %user_id, "Session joined"),
        }
    }

    /// Remove a session. Returns the user it was bound to, if any.
    pub fn leave(&self, connection_id: ConnectionId) -> Option<String> {
        let removed = self.write().remove(&connection_id).map(|s| s.user_id);
        if let Some(user_id) = &removed {
            debug!(connection = %connection_id, user = %user_id, "Session left");
        }
        removed
    }

    /// Connection ids currently joined for `user_id`.
    pub fn sessions_for(&self, user_id: &str) -> Vec<ConnectionId> {
        self.read()
            .iter()
            .filter(|(_, s)| s.user_id == user_id)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Total number of live sessions across all users.
    pub fn session_count(&self) -> usize {
        self.read().len()
    }

    /// Send `event` to every session of `user_id`.
    ///
    /// Returns how many sessions accepted it. Sessions whose receiver is gone
    /// are skipped. Fails when nobody accepted the event.
    pub fn broadcast(&self, user_id: &str, event: &PushEvent) -> Result<usize, ChatError> {
        let delivered = self
            .read()
            .values()
            .filter(|s| s.user_id == user_id)
            .filter(|s| s.outbox.send(event.clone()).is_ok())
            .count();

        if delivered == 0 {
            return Err(ChatError::Delivery(format!(
                "no live session for user {}",
                user_id
            )));
        }
        Ok(delivered)
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<ConnectionId, Session>> {
        self.sessions.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<ConnectionId, Session>> {
        self.sessions.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("sessions", &self.session_count())
            .finish()
    }
}
