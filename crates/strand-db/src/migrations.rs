use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id              TEXT PRIMARY KEY,
            name            TEXT,
            email           TEXT,
            image           TEXT,
            ai_nickname     TEXT,
            ai_personality  TEXT,
            created_at      TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS threads (
            id              TEXT PRIMARY KEY,
            user_id         TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            title           TEXT NOT NULL DEFAULT 'New Chat',
            messages        TEXT,
            pinned          INTEGER NOT NULL DEFAULT 0,
            share_id        TEXT NOT NULL UNIQUE,
            require_auth    INTEGER NOT NULL DEFAULT 0,
            created_at      TEXT NOT NULL,
            updated_at      TEXT NOT NULL
        );

        -- Sidebar listing: newest-activity-first per user
        CREATE INDEX IF NOT EXISTS idx_threads_user
            ON threads(user_id, updated_at);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
