use axum::{
    Extension, Json,
    extract::{Multipart, State, multipart::MultipartRejection, rejection::JsonRejection},
    response::IntoResponse,
};

use vidtube_types::api::{ApiResponse, UpdateAccountRequest};

use crate::AppState;
use crate::account;
use crate::error::ApiError;
use crate::middleware::Identity;
use crate::profile;
use crate::uploads::UploadForm;

pub async fn current_user(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<impl IntoResponse, ApiError> {
    let user = account::current_user(&state, &identity)?;
    Ok(Json(ApiResponse::new(200, user, "Current user fetched successfully")))
}

pub async fn update_account(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    payload: Result<Json<UpdateAccountRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    let user = account::update_details(&state, &identity, &req.full_name, &req.email)?;
    Ok(Json(ApiResponse::new(200, user, "Account details updated successfully")))
}

/// PATCH /avatar: multipart with a single `avatar` file.
pub async fn update_avatar(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let form = UploadForm::read(multipart?, &state.temp_dir, &["avatar"]).await?;
    let user = account::update_avatar(&state, &identity, form.file("avatar")).await?;
    Ok(Json(ApiResponse::new(200, user, "Avatar updated successfully")))
}

/// PATCH /cover-image: multipart with a single `coverImage` file.
pub async fn update_cover_image(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let form = UploadForm::read(multipart?, &state.temp_dir, &["coverImage"]).await?;
    let user = account::update_cover_image(&state, &identity, form.file("coverImage")).await?;
    Ok(Json(ApiResponse::new(200, user, "Cover image updated successfully")))
}

pub async fn watch_history(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<impl IntoResponse, ApiError> {
    let history = profile::watch_history(&state, &identity)?;
    Ok(Json(ApiResponse::new(200, history, "Watch history fetched successfully")))
}
