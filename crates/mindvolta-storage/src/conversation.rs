//! Append-only conversation store.
//!
//! Records are created once and never updated or deleted. A conversation for
//! a user is every message where that user is sender or receiver, ordered by
//! creation time and then insertion order.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use mindvolta_core::error::MindvoltaError;
use mindvolta_core::types::{Category, Message};

use crate::db::Database;

/// Persistence contract for chat messages.
pub trait ConversationStore: Send + Sync {
    /// Persist a message. Either the whole record is written or nothing is.
    fn append(&self, message: Message) -> Result<Message, MindvoltaError>;

    /// Return at most `limit` of the most recent messages involving `user_id`,
    /// in ascending creation order.
    fn history(&self, user_id: &str, limit: usize) -> Result<Vec<Message>, MindvoltaError>;
}

/// SQLite-backed [`ConversationStore`].
pub struct SqliteConversationStore {
    db: Arc<Database>,
}

impl SqliteConversationStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

impl ConversationStore for SqliteConversationStore {
    fn append(&self, message: Message) -> Result<Message, MindvoltaError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (id, content, sender_id, receiver_id, is_agent_response, category, requires_action, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                rusqlite::params![
                    message.id.to_string(),
                    message.content,
                    message.sender_id,
                    message.receiver_id,
                    message.is_agent_response as i32,
                    message.category.map(|c| c.as_str()),
                    message.requires_action as i32,
                    message.created_at.timestamp_millis(),
                ],
            )
            .map_err(|e| MindvoltaError::Storage(format!("Failed to save message: {}", e)))?;
            Ok(())
        })?;
        Ok(message)
    }

    fn history(&self, user_id: &str, limit: usize) -> Result<Vec<Message>, MindvoltaError> {
        self.db.with_conn(|conn| {
            // Newest `limit` rows, flipped back to ascending order.
            let mut stmt = conn
                .prepare(
                    "SELECT id, content, sender_id, receiver_id, is_agent_response, category, requires_action, created_at
                     FROM (
                         SELECT seq, id, content, sender_id, receiver_id, is_agent_response, category, requires_action, created_at
                         FROM messages
                         WHERE sender_id = ?1 OR receiver_id = ?1
                         ORDER BY created_at DESC, seq DESC
                         LIMIT ?2
                     )
                     ORDER BY created_at ASC, seq ASC",
                )
                .map_err(|e| MindvoltaError::Storage(e.to_string()))?;

            let rows = stmt
                .query_map(rusqlite::params![user_id, limit as i64], |row| {
                    Ok(row_to_message(row))
                })
                .map_err(|e| MindvoltaError::Storage(e.to_string()))?;

            let mut messages = Vec::new();
            for row in rows {
                let message = row.map_err(|e| MindvoltaError::Storage(e.to_string()))??;
                messages.push(message);
            }
            Ok(messages)
        })
    }
}

fn row_to_message(row: &rusqlite::Row<'_>) -> Result<Message, MindvoltaError> {
    let storage = |e: rusqlite::Error| MindvoltaError::Storage(e.to_string());

    let id_str: String = row.get(0).map_err(storage)?;
    let content: String = row.get(1).map_err(storage)?;
    let sender_id: String = row.get(2).map_err(storage)?;
    let receiver_id: String = row.get(3).map_err(storage)?;
    let is_agent_response: i32 = row.get(4).map_err(storage)?;
    let category: Option<String> = row.get(5).map_err(storage)?;
    let requires_action: i32 = row.get(6).map_err(storage)?;
    let created_at_ms: i64 = row.get(7).map_err(storage)?;

    let category = match category {
        Some(name) => Some(Category::parse(&name).ok_or_else(|| {
            MindvoltaError::Storage(format!("Unknown category: {}", name))
        })?),
        None => None,
    };

    Ok(Message {
        id: Uuid::parse_str(&id_str)
            .map_err(|e| MindvoltaError::Storage(format!("Invalid UUID: {}", e)))?,
        content,
        sender_id,
        receiver_id,
        is_agent_response: is_agent_response != 0,
        category,
        requires_action: requires_action != 0,
        created_at: DateTime::<Utc>::from_timestamp_millis(created_at_ms).ok_or_else(|| {
            MindvoltaError::Storage(format!("Invalid timestamp: {}", created_at_ms))
        })?,
    })
}
