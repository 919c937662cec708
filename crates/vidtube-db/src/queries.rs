use crate::models::{NewUser, NewVideo, UserRow, WatchHistoryRow};
use crate::Database;
use anyhow::Result;
use rusqlite::{Connection, Row};

const USER_COLUMNS: &str = "id, username, email, full_name, password, avatar_url, \
                            cover_image_url, refresh_token, created_at, updated_at";

impl Database {
    // -- Users --

    pub fn create_user(&self, user: &NewUser<'_>) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, email, full_name, password, avatar_url, cover_image_url)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    user.id,
                    user.username,
                    user.email,
                    user.full_name,
                    user.password_hash,
                    user.avatar_url,
                    user.cover_image_url,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id = ?1", &[id]))
    }

    /// Username comparison is case-insensitive (column collation).
    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "username = ?1", &[username]))
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email = ?1", &[email]))
    }

    /// First user matching either identifier.
    pub fn find_user_by_username_or_email(
        &self,
        username: &str,
        email: &str,
    ) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "username = ?1 OR email = ?2", &[username, email]))
    }

    /// Set or clear the single active refresh token. Touches no other column.
    pub fn set_refresh_token(&self, id: &str, token: Option<&str>) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET refresh_token = ?2 WHERE id = ?1",
                rusqlite::params![id, token],
            )?;
            Ok(())
        })
    }

    /// Replace `current` with `next` only if `current` is still the stored
    /// token. Returns false when another rotation or a logout got there first.
    pub fn rotate_refresh_token(&self, id: &str, current: &str, next: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE users SET refresh_token = ?3 WHERE id = ?1 AND refresh_token = ?2",
                (id, current, next),
            )?;
            Ok(n == 1)
        })
    }

    pub fn update_password(&self, id: &str, password_hash: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET password = ?2, updated_at = datetime('now') WHERE id = ?1",
                (id, password_hash),
            )?;
            Ok(())
        })
    }

    pub fn update_account(&self, id: &str, full_name: &str, email: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET full_name = ?2, email = ?3, updated_at = datetime('now') WHERE id = ?1",
                (id, full_name, email),
            )?;
            Ok(())
        })
    }

    pub fn update_avatar(&self, id: &str, avatar_url: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET avatar_url = ?2, updated_at = datetime('now') WHERE id = ?1",
                (id, avatar_url),
            )?;
            Ok(())
        })
    }

    pub fn update_cover_image(&self, id: &str, cover_image_url: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET cover_image_url = ?2, updated_at = datetime('now') WHERE id = ?1",
                (id, cover_image_url),
            )?;
            Ok(())
        })
    }

    // -- Subscriptions --

    /// Toggle a subscription edge: removes if it exists, inserts if not.
    /// Returns true when the edge was inserted.
    pub fn toggle_subscription(
        &self,
        id: &str,
        subscriber_id: &str,
        channel_id: &str,
    ) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let removed = tx.execute(
                "DELETE FROM subscriptions WHERE subscriber_id = ?1 AND channel_id = ?2",
                (subscriber_id, channel_id),
            )?;
            let subscribed = removed == 0;
            if subscribed {
                tx.execute(
                    "INSERT INTO subscriptions (id, subscriber_id, channel_id) VALUES (?1, ?2, ?3)",
                    (id, subscriber_id, channel_id),
                )?;
            }
            tx.commit()?;
            Ok(subscribed)
        })
    }

    /// Number of edges pointing at `channel_id`.
    pub fn count_subscribers(&self, channel_id: &str) -> Result<u64> {
        self.with_conn(|conn| {
            let n: i64 = conn.query_row(
                "SELECT COUNT(*) FROM subscriptions WHERE channel_id = ?1",
                [channel_id],
                |r| r.get(0),
            )?;
            Ok(n as u64)
        })
    }

    /// Number of edges leaving `subscriber_id`.
    pub fn count_subscriptions(&self, subscriber_id: &str) -> Result<u64> {
        self.with_conn(|conn| {
            let n: i64 = conn.query_row(
                "SELECT COUNT(*) FROM subscriptions WHERE subscriber_id = ?1",
                [subscriber_id],
                |r| r.get(0),
            )?;
            Ok(n as u64)
        })
    }

    pub fn is_subscribed(&self, subscriber_id: &str, channel_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM subscriptions WHERE subscriber_id = ?1 AND channel_id = ?2)",
                (subscriber_id, channel_id),
                |r| r.get(0),
            )?;
            Ok(exists)
        })
    }

    // -- Videos & watch history --

    /// Video publishing lives outside this service; used to seed data and in tests.
    pub fn insert_video(&self, video: &NewVideo<'_>) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO videos (id, owner_id, video_file, thumbnail, title, description, duration)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    video.id,
                    video.owner_id,
                    video.video_file,
                    video.thumbnail,
                    video.title,
                    video.description,
                    video.duration,
                ],
            )?;
            Ok(())
        })
    }

    /// Append a video to the end of a user's watch history. Playback lives
    /// outside this service; used to seed data and in tests.
    pub fn record_watch(&self, user_id: &str, video_id: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO watch_history (user_id, position, video_id)
                 VALUES (?1, (SELECT COALESCE(MAX(position), -1) + 1 FROM watch_history WHERE user_id = ?1), ?2)",
                (user_id, video_id),
            )?;
            Ok(())
        })
    }

    pub fn get_watch_history(&self, user_id: &str) -> Result<Vec<WatchHistoryRow>> {
        self.with_conn(|conn| query_watch_history(conn, user_id))
    }
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        full_name: row.get(3)?,
        password: row.get(4)?,
        avatar_url: row.get(5)?,
        cover_image_url: row.get(6)?,
        refresh_token: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

fn query_user(conn: &Connection, predicate: &str, params: &[&str]) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {} FROM users WHERE {} LIMIT 1", USER_COLUMNS, predicate);
    let mut stmt = conn.prepare(&sql)?;

    let row = stmt
        .query_row(rusqlite::params_from_iter(params.iter()), user_from_row)
        .optional()?;

    Ok(row)
}

fn query_watch_history(conn: &Connection, user_id: &str) -> Result<Vec<WatchHistoryRow>> {
    // One join per entry for the owner; LEFT so orphaned videos still show.
    let mut stmt = conn.prepare(
        "SELECT v.id, v.video_file, v.thumbnail, v.title, v.description, v.duration, v.views,
                v.is_published, v.created_at, o.full_name, o.username, o.avatar_url
         FROM watch_history w
         JOIN videos v ON v.id = w.video_id
         LEFT JOIN users o ON o.id = v.owner_id
         WHERE w.user_id = ?1
         ORDER BY w.position ASC",
    )?;

    let rows = stmt
        .query_map([user_id], |row| {
            Ok(WatchHistoryRow {
                video_id: row.get(0)?,
                video_file: row.get(1)?,
                thumbnail: row.get(2)?,
                title: row.get(3)?,
                description: row.get(4)?,
                duration: row.get(5)?,
                views: row.get(6)?,
                is_published: row.get(7)?,
                created_at: row.get(8)?,
                owner_full_name: row.get(9)?,
                owner_username: row.get(10)?,
                owner_avatar_url: row.get(11)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
