//! Database schema migrations.
//!
//! Applies the messages table and the schema_migrations tracking table.

use rusqlite::Connection;
use tracing::info;

use mindvolta_core::error::MindvoltaError;

/// Run all pending database migrations.
pub fn run_migrations(conn: &Connection) -> Result<(), MindvoltaError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| MindvoltaError::Storage(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| MindvoltaError::Storage(format!("Failed to query migration version: {}", e)))?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: messages");
    }

    Ok(())
}

/// Version 1: append-only messages table.
///
/// `seq` preserves insertion order for messages sharing a millisecond.
fn apply_v1(conn: &Connection) -> Result<(), MindvoltaError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS messages (
            seq                 INTEGER PRIMARY KEY AUTOINCREMENT,
            id                  TEXT NOT NULL UNIQUE,
            content             TEXT NOT NULL CHECK (length(content) > 0),
            sender_id           TEXT NOT NULL,
            receiver_id         TEXT NOT NULL,
            is_agent_response   INTEGER NOT NULL CHECK (is_agent_response IN (0, 1)),
            category            TEXT
                                CHECK (category IS NULL OR category IN (
                                    'professional_referral', 'sadness', 'anxiety',
                                    'greeting', 'happiness', 'default')),
            requires_action     INTEGER NOT NULL DEFAULT 0 CHECK (requires_action IN (0, 1)),
            created_at          INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_messages_sender
            ON messages (sender_id, created_at DESC);

        CREATE INDEX IF NOT EXISTS idx_messages_receiver
            ON messages (receiver_id, created_at DESC);

        INSERT INTO schema_migrations (version, name) VALUES (1, 'messages');
        ",
    )
    .map_err(|e| MindvoltaError::Storage(format!("Migration v1 failed: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_test_conn() -> Connection {
        Connection::open_in_memory().unwrap()
    }

    #[test]
    fn test_migrations_run_once() {
        let conn = open_test_conn();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_messages_table_exists() {
        let conn = open_test_conn();
        run_migrations(&conn).unwrap();

        conn.execute(
            "INSERT INTO messages (id, content, sender_id, receiver_id, is_agent_response, created_at)
             VALUES ('m-1', 'hello', 'user-1', 'ai', 0, 1700000000000)",
            [],
        )
        .unwrap();

        let content: String = conn
            .query_row("SELECT content FROM messages WHERE id = 'm-1'", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(content, "hello");
    }

    #[test]
    fn test_messages_reject_empty_content() {
        let conn = open_test_conn();
        run_migrations(&conn).unwrap();

        let result = conn.execute(
            "INSERT INTO messages (id, content, sender_id, receiver_id, is_agent_response, created_at)
             VALUES ('m-1', '', 'user-1', 'ai', 0, 1700000000000)",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_messages_category_check() {
        let conn = open_test_conn();
        run_migrations(&conn).unwrap();

        let result = conn.execute(
            "INSERT INTO messages (id, content, sender_id, receiver_id, is_agent_response, category, created_at)
             VALUES ('m-1', 'x', 'ai', 'user-1', 1, 'bogus', 1700000000000)",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_message_ids_are_unique() {
        let conn = open_test_conn();
        run_migrations(&conn).unwrap();

        let insert = "INSERT INTO messages (id, content, sender_id, receiver_id, is_agent_response, created_at)
                      VALUES ('dup', 'x', 'user-1', 'ai', 0, 1700000000000)";
        conn.execute(insert, []).unwrap();
        assert!(conn.execute(insert, []).is_err());
    }
}
