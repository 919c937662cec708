use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;
use tracing::debug;
use uuid::Uuid;

use crate::AppState;
use crate::error::ApiError;

pub const ACCESS_COOKIE: &str = "accessToken";
pub const REFRESH_COOKIE: &str = "refreshToken";

/// The authenticated caller, established once per request by
/// [`require_auth`] and handed to handlers explicitly.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: Uuid,
    pub username: String,
}

/// Extract and validate the access token from the `accessToken` cookie or
/// the `Authorization: Bearer` header, and confirm the user still exists.
pub async fn require_auth(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = jar
        .get(ACCESS_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|t| !t.is_empty())
        .or_else(|| {
            req.headers()
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.strip_prefix("Bearer "))
                .map(str::to_string)
                .filter(|t| !t.is_empty())
        })
        .ok_or_else(|| ApiError::Unauthorized("Unauthorized request".into()))?;

    let claims = state.tokens.verify_access(&token)?;

    let user = state
        .db
        .get_user_by_id(&claims.sub.to_string())?
        .ok_or_else(|| {
            debug!("Access token for vanished user {}", claims.sub);
            ApiError::Unauthorized("Invalid access token".into())
        })?;

    req.extensions_mut().insert(Identity {
        user_id: claims.sub,
        username: user.username,
    });
    Ok(next.run(req).await)
}
