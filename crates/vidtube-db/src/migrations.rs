use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);"
    )?;

    let version: i64 = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (users, subscriptions)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id              TEXT PRIMARY KEY,
                username        TEXT NOT NULL UNIQUE COLLATE NOCASE,
                email           TEXT NOT NULL UNIQUE COLLATE NOCASE,
                full_name       TEXT NOT NULL,
                password        TEXT NOT NULL,
                avatar_url      TEXT NOT NULL,
                cover_image_url TEXT NOT NULL DEFAULT '',
                refresh_token   TEXT,
                created_at      TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at      TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE subscriptions (
                id              TEXT PRIMARY KEY,
                subscriber_id   TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                channel_id      TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                created_at      TEXT NOT NULL DEFAULT (datetime('now')),
                UNIQUE(subscriber_id, channel_id)
            );

            CREATE INDEX idx_subscriptions_channel
                ON subscriptions(channel_id);

            INSERT INTO schema_version (version) VALUES (1);
            "
        )?;
    }

    if version < 2 {
        info!("Running migration v2 (videos, watch history)");
        conn.execute_batch(
            "
            CREATE TABLE videos (
                id              TEXT PRIMARY KEY,
                owner_id        TEXT REFERENCES users(id) ON DELETE SET NULL,
                video_file      TEXT NOT NULL,
                thumbnail       TEXT NOT NULL,
                title           TEXT NOT NULL,
                description     TEXT NOT NULL,
                duration        REAL NOT NULL,
                views           INTEGER NOT NULL DEFAULT 0,
                is_published    INTEGER NOT NULL DEFAULT 1,
                created_at      TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at      TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE watch_history (
                user_id         TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                position        INTEGER NOT NULL,
                video_id        TEXT NOT NULL REFERENCES videos(id) ON DELETE CASCADE,
                watched_at      TEXT NOT NULL DEFAULT (datetime('now')),
                PRIMARY KEY (user_id, position)
            );

            INSERT INTO schema_version (version) VALUES (2);
            "
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
