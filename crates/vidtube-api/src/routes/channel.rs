use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use uuid::Uuid;

use vidtube_types::api::{ApiResponse, SubscriptionResponse};

use crate::AppState;
use crate::error::ApiError;
use crate::middleware::Identity;
use crate::profile;

pub async fn channel_profile(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Extension(identity): Extension<Identity>,
) -> Result<impl IntoResponse, ApiError> {
    let channel = profile::channel_profile(&state, &identity, &username)?;
    Ok(Json(ApiResponse::new(200, channel, "User channel fetched successfully")))
}

/// POST /subscriptions/{channel_id}: toggles the caller's subscription.
pub async fn toggle_subscription(
    State(state): State<AppState>,
    Path(channel_id): Path<String>,
    Extension(identity): Extension<Identity>,
) -> Result<impl IntoResponse, ApiError> {
    let channel_id: Uuid = channel_id
        .parse()
        .map_err(|_| ApiError::Validation("Invalid channel id".into()))?;

    let subscribed = profile::toggle_subscription(&state, &identity, channel_id)?;
    let message = if subscribed { "Subscribed" } else { "Unsubscribed" };
    Ok(Json(ApiResponse::new(200, SubscriptionResponse { subscribed }, message)))
}
