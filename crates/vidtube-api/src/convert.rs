//! Row → wire conversions.

use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use vidtube_db::models::{UserRow, WatchHistoryRow};
use vidtube_types::models::{User, VideoOwner, WatchedVideo};

use crate::error::ApiError;

/// Strip a stored user down to its public fields.
pub fn public_user(row: &UserRow) -> Result<User, ApiError> {
    Ok(User {
        id: parse_id(&row.id)?,
        username: row.username.clone(),
        email: row.email.clone(),
        full_name: row.full_name.clone(),
        avatar_url: row.avatar_url.clone(),
        cover_image_url: row.cover_image_url.clone(),
        created_at: parse_timestamp(&row.created_at),
        updated_at: parse_timestamp(&row.updated_at),
    })
}

pub fn watched_video(row: WatchHistoryRow) -> Result<WatchedVideo, ApiError> {
    let owner = match (row.owner_full_name, row.owner_username, row.owner_avatar_url) {
        (Some(full_name), Some(username), Some(avatar_url)) => Some(VideoOwner {
            full_name,
            username,
            avatar_url,
        }),
        _ => None,
    };

    Ok(WatchedVideo {
        id: parse_id(&row.video_id)?,
        video_file: row.video_file,
        thumbnail: row.thumbnail,
        title: row.title,
        description: row.description,
        duration: row.duration,
        views: row.views.max(0) as u64,
        is_published: row.is_published,
        created_at: parse_timestamp(&row.created_at),
        owner,
    })
}

pub fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    raw.parse()
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("Corrupt id '{}': {}", raw, e)))
}

pub fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // SQLite stores timestamps as "YYYY-MM-DD HH:MM:SS" without timezone.
            // Parse as naive UTC and convert.
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
                .map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}': {}", raw, e);
            DateTime::default()
        })
}
