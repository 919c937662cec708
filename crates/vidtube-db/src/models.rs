//! Database row types: these map directly to SQLite rows.
//! Distinct from vidtube-types API models to keep the DB layer independent.

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub password: String,
    pub avatar_url: String,
    pub cover_image_url: String,
    pub refresh_token: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Insert payload for a user. `password_hash` must already be hashed.
pub struct NewUser<'a> {
    pub id: &'a str,
    pub username: &'a str,
    pub email: &'a str,
    pub full_name: &'a str,
    pub password_hash: &'a str,
    pub avatar_url: &'a str,
    pub cover_image_url: &'a str,
}

pub struct NewVideo<'a> {
    pub id: &'a str,
    pub owner_id: &'a str,
    pub video_file: &'a str,
    pub thumbnail: &'a str,
    pub title: &'a str,
    pub description: &'a str,
    pub duration: f64,
}

/// A watch-history entry joined with its video and the video's owner.
pub struct WatchHistoryRow {
    pub video_id: String,
    pub video_file: String,
    pub thumbnail: String,
    pub title: String,
    pub description: String,
    pub duration: f64,
    pub views: i64,
    pub is_published: bool,
    pub created_at: String,
    pub owner_full_name: Option<String>,
    pub owner_username: Option<String>,
    pub owner_avatar_url: Option<String>,
}
