pub mod account;
pub mod auth;
pub mod channel;

use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, patch, post},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};

use crate::AppState;
use crate::middleware::{ACCESS_COOKIE, REFRESH_COOKIE, require_auth};
use crate::tokens::TokenPair;
use crate::uploads::MAX_FILE_SIZE;

/// Two files plus text fields per multipart request.
const MAX_BODY_SIZE: usize = 2 * MAX_FILE_SIZE + 64 * 1024;

/// All user routes, nested under `/api/v1/users`, plus `/health`.
pub fn build_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/refresh-token", post(auth::refresh_token));

    let protected_routes = Router::new()
        .route("/logout", post(auth::logout))
        .route("/change-password", post(auth::change_password))
        .route("/currentUser", get(account::current_user))
        .route("/update-account", patch(account::update_account))
        .route("/avatar", patch(account::update_avatar))
        .route("/cover-image", patch(account::update_cover_image))
        .route("/watch-history", get(account::watch_history))
        .route("/channel/{username}", get(channel::channel_profile))
        .route("/subscriptions/{channel_id}", post(channel::toggle_subscription))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let users = public_routes
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .with_state(state);

    Router::new()
        .nest("/api/v1/users", users)
        .route("/health", get(health))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

fn session_cookie(name: &'static str, value: String) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(true)
        .secure(true)
        .path("/")
        .build()
}

/// Set both token cookies.
pub(crate) fn with_session(jar: CookieJar, tokens: &TokenPair) -> CookieJar {
    jar.add(session_cookie(ACCESS_COOKIE, tokens.access_token.clone()))
        .add(session_cookie(REFRESH_COOKIE, tokens.refresh_token.clone()))
}

/// Expire both token cookies. Removal cookies are added outright so the
/// clearing `Set-Cookie` goes out even when the request carried no cookies.
pub(crate) fn without_session(jar: CookieJar) -> CookieJar {
    let expired = |name| {
        let mut cookie = session_cookie(name, String::new());
        cookie.make_removal();
        cookie
    };
    jar.add(expired(ACCESS_COOKIE)).add(expired(REFRESH_COOKIE))
}
