//! MindVolta storage crate - SQLite persistence for conversations.
//!
//! Provides a WAL-mode SQLite database with migrations and the append-only
//! conversation store that records every user message and agent response.

pub mod conversation;
pub mod db;
pub mod migrations;

pub use conversation::{ConversationStore, SqliteConversationStore};
pub use db::Database;
