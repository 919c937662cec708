//! The caller's own account: read it, edit details, replace images.

use std::path::Path;

use tracing::info;

use vidtube_db::is_unique_violation;
use vidtube_db::models::UserRow;
use vidtube_types::models::User;

use crate::AppStateInner;
use crate::convert::public_user;
use crate::error::ApiError;
use crate::middleware::Identity;

pub fn current_user(state: &AppStateInner, identity: &Identity) -> Result<User, ApiError> {
    public_user(&load(state, identity)?)
}

pub fn update_details(
    state: &AppStateInner,
    identity: &Identity,
    full_name: &str,
    email: &str,
) -> Result<User, ApiError> {
    let (full_name, email) = (full_name.trim(), email.trim());
    if full_name.is_empty() || email.is_empty() {
        return Err(ApiError::Validation("All fields are required".into()));
    }

    let id = identity.user_id.to_string();
    if let Some(owner) = state.db.get_user_by_email(email)? {
        if owner.id != id {
            return Err(ApiError::Conflict("Email is already in use".into()));
        }
    }

    state.db.update_account(&id, full_name, email).map_err(|e| {
        if is_unique_violation(&e) {
            ApiError::Conflict("Email is already in use".into())
        } else {
            ApiError::Internal(e)
        }
    })?;

    info!("User {} updated account details", identity.username);
    current_user(state, identity)
}

pub async fn update_avatar(
    state: &AppStateInner,
    identity: &Identity,
    file: Option<&Path>,
) -> Result<User, ApiError> {
    let file = file.ok_or_else(|| ApiError::Validation("Avatar file is missing".into()))?;
    let media = state
        .uploader
        .upload(file)
        .await
        .ok_or_else(|| ApiError::Upload("Error while uploading avatar".into()))?;

    state
        .db
        .update_avatar(&identity.user_id.to_string(), &media.url)?;

    info!("User {} replaced avatar", identity.username);
    current_user(state, identity)
}

pub async fn update_cover_image(
    state: &AppStateInner,
    identity: &Identity,
    file: Option<&Path>,
) -> Result<User, ApiError> {
    let file = file.ok_or_else(|| ApiError::Validation("Cover image file is missing".into()))?;
    let media = state
        .uploader
        .upload(file)
        .await
        .ok_or_else(|| ApiError::Upload("Error while uploading cover image".into()))?;

    state
        .db
        .update_cover_image(&identity.user_id.to_string(), &media.url)?;

    info!("User {} replaced cover image", identity.username);
    current_user(state, identity)
}

fn load(state: &AppStateInner, identity: &Identity) -> Result<UserRow, ApiError> {
    state
        .db
        .get_user_by_id(&identity.user_id.to_string())?
        .ok_or_else(|| ApiError::NotFound("User does not exist".into()))
}
