use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Multipart, State, multipart::MultipartRejection, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::CookieJar;

use vidtube_types::api::{
    ApiResponse, ChangePasswordRequest, LoginRequest, LoginResponse, RefreshRequest,
    TokenPairResponse,
};

use crate::AppState;
use crate::error::ApiError;
use crate::middleware::{Identity, REFRESH_COOKIE};
use crate::routes::{with_session, without_session};
use crate::session::{self, Registration};
use crate::uploads::UploadForm;

/// POST /register: multipart: fullName, email, username, password,
/// avatar (file, required), coverImage (file, optional).
pub async fn register(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let form = UploadForm::read(multipart?, &state.temp_dir, &["avatar", "coverImage"]).await?;

    let user = session::register(
        &state,
        Registration {
            full_name: form.field("fullName"),
            email: form.field("email"),
            username: form.field("username"),
            password: form.field("password"),
            avatar: form.file("avatar"),
            cover_image: form.file("coverImage"),
        },
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(201, user, "User registered successfully")),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    let outcome = session::login(
        &state,
        req.username.as_deref(),
        req.email.as_deref(),
        &req.password,
    )?;

    let jar = with_session(jar, &outcome.tokens);
    Ok((
        jar,
        Json(ApiResponse::new(
            200,
            LoginResponse {
                user: outcome.user,
                access_token: outcome.tokens.access_token,
                refresh_token: outcome.tokens.refresh_token,
            },
            "User logged in successfully",
        )),
    ))
}

pub async fn logout(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    jar: CookieJar,
) -> Result<impl IntoResponse, ApiError> {
    session::logout(&state, &identity)?;

    Ok((
        without_session(jar),
        Json(ApiResponse::new(200, serde_json::json!({}), "User logged out")),
    ))
}

/// POST /refresh-token: token from the `refreshToken` cookie, else from a
/// JSON body `{ "refreshToken": "..." }`. The body may be empty.
pub async fn refresh_token(
    State(state): State<AppState>,
    jar: CookieJar,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let from_cookie = jar
        .get(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty());

    // The body is only consulted when no cookie carried a token.
    let presented = match from_cookie {
        Some(token) => Some(token),
        None if body.iter().all(u8::is_ascii_whitespace) => None,
        None => {
            serde_json::from_slice::<RefreshRequest>(&body)
                .map_err(|e| ApiError::Validation(format!("Invalid request body: {}", e)))?
                .refresh_token
        }
    };

    let tokens = session::refresh(&state, presented.as_deref())?;

    let jar = with_session(jar, &tokens);
    Ok((
        jar,
        Json(ApiResponse::new(
            200,
            TokenPairResponse {
                access_token: tokens.access_token,
                refresh_token: tokens.refresh_token,
            },
            "Access token refreshed",
        )),
    ))
}

pub async fn change_password(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    payload: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    session::change_password(&state, &identity, &req.old_password, &req.new_password)?;

    Ok(Json(ApiResponse::new(
        200,
        serde_json::json!({}),
        "Password changed successfully",
    )))
}
