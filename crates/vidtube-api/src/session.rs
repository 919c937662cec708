//! Registration, login, logout, refresh and password change.
//!
//! Every operation takes the caller's identity explicitly; nothing here reads
//! request state. Refresh tokens rotate: a user has at most one live refresh
//! token, stored on their row, and presenting anything else is rejected.

use std::path::Path;

use tracing::{info, warn};
use uuid::Uuid;

use vidtube_db::is_unique_violation;
use vidtube_db::models::{NewUser, UserRow};
use vidtube_types::models::User;

use crate::AppStateInner;
use crate::convert::{parse_id, public_user};
use crate::error::ApiError;
use crate::middleware::Identity;
use crate::password::{hash_password, verify_password};
use crate::tokens::{TokenPair, TokenSubject};

/// Raw registration input as received from the form.
#[derive(Debug, Default)]
pub struct Registration<'a> {
    pub full_name: Option<&'a str>,
    pub email: Option<&'a str>,
    pub username: Option<&'a str>,
    pub password: Option<&'a str>,
    pub avatar: Option<&'a Path>,
    pub cover_image: Option<&'a Path>,
}

#[derive(Debug)]
pub struct LoginOutcome {
    pub user: User,
    pub tokens: TokenPair,
}

pub async fn register(state: &AppStateInner, form: Registration<'_>) -> Result<User, ApiError> {
    let (Some(full_name), Some(email), Some(username), Some(password)) = (
        non_blank(form.full_name),
        non_blank(form.email),
        non_blank(form.username),
        form.password.filter(|p| !p.trim().is_empty()),
    ) else {
        return Err(ApiError::Validation("All fields are required".into()));
    };

    let avatar_path = form
        .avatar
        .ok_or_else(|| ApiError::Validation("Avatar file is required".into()))?;

    let username = username.to_lowercase();

    if state
        .db
        .find_user_by_username_or_email(&username, email)?
        .is_some()
    {
        return Err(conflict());
    }

    let avatar = state
        .uploader
        .upload(avatar_path)
        .await
        .ok_or_else(|| ApiError::Upload("Avatar file upload failed".into()))?;

    let cover_image_url = match form.cover_image {
        Some(path) => match state.uploader.upload(path).await {
            Some(media) => media.url,
            None => {
                warn!("Cover image upload failed for new user {}; continuing without one", username);
                String::new()
            }
        },
        None => String::new(),
    };

    let password_hash = hash_password(password)?;
    let user_id = Uuid::new_v4().to_string();

    state
        .db
        .create_user(&NewUser {
            id: &user_id,
            username: &username,
            email,
            full_name,
            password_hash: &password_hash,
            avatar_url: &avatar.url,
            cover_image_url: &cover_image_url,
        })
        .map_err(|e| {
            if is_unique_violation(&e) {
                conflict()
            } else {
                ApiError::Internal(e)
            }
        })?;

    let created = state.db.get_user_by_id(&user_id)?.ok_or_else(|| {
        ApiError::Internal(anyhow::anyhow!("Something went wrong while registering the user"))
    })?;

    info!("Registered user {} ({})", created.username, created.id);
    public_user(&created)
}

pub fn login(
    state: &AppStateInner,
    username: Option<&str>,
    email: Option<&str>,
    password: &str,
) -> Result<LoginOutcome, ApiError> {
    let username = non_blank(username).map(str::to_lowercase);
    let email = non_blank(email);

    let user = match (username.as_deref(), email) {
        (Some(u), Some(e)) => state.db.find_user_by_username_or_email(u, e)?,
        (Some(u), None) => state.db.get_user_by_username(u)?,
        (None, Some(e)) => state.db.get_user_by_email(e)?,
        (None, None) => {
            return Err(ApiError::Validation("username or email is required".into()));
        }
    }
    .ok_or_else(|| ApiError::NotFound("User does not exist".into()))?;

    if !verify_password(password, &user.password)? {
        warn!("Failed login for {}", user.username);
        return Err(ApiError::Unauthorized("Invalid user credentials".into()));
    }

    let tokens = issue_tokens(state, &user)?;

    info!("User {} logged in", user.username);
    Ok(LoginOutcome {
        user: public_user(&user)?,
        tokens,
    })
}

/// Clear the caller's refresh token. Clearing an absent token is fine.
pub fn logout(state: &AppStateInner, identity: &Identity) -> Result<(), ApiError> {
    state
        .db
        .set_refresh_token(&identity.user_id.to_string(), None)?;

    info!("User {} logged out", identity.username);
    Ok(())
}

/// Exchange the current refresh token for a new pair.
///
/// Order matters: verify the token, load the user it names, then compare
/// against that user's stored token.
pub fn refresh(state: &AppStateInner, presented: Option<&str>) -> Result<TokenPair, ApiError> {
    let presented = non_blank(presented)
        .ok_or_else(|| ApiError::Unauthorized("Unauthorized request".into()))?;

    let claims = state
        .tokens
        .verify_refresh(presented)
        .map_err(|_| ApiError::Unauthorized("Invalid refresh token".into()))?;

    let user = state
        .db
        .get_user_by_id(&claims.sub.to_string())?
        .ok_or_else(|| ApiError::Unauthorized("Invalid refresh token".into()))?;

    if user.refresh_token.as_deref() != Some(presented) {
        return Err(reused(&user));
    }

    // The swap only lands if `presented` is still stored, so of two
    // concurrent refreshes with the same token exactly one wins.
    let tokens = mint_tokens(state, &user)?;
    if !state
        .db
        .rotate_refresh_token(&user.id, presented, &tokens.refresh_token)?
    {
        return Err(reused(&user));
    }

    info!("Rotated refresh token for {}", user.username);
    Ok(tokens)
}

pub fn change_password(
    state: &AppStateInner,
    identity: &Identity,
    old_password: &str,
    new_password: &str,
) -> Result<(), ApiError> {
    if new_password.trim().is_empty() {
        return Err(ApiError::Validation("New password is required".into()));
    }

    let user = state
        .db
        .get_user_by_id(&identity.user_id.to_string())?
        .ok_or_else(|| ApiError::Unauthorized("Invalid access token".into()))?;

    if !verify_password(old_password, &user.password)? {
        return Err(ApiError::Unauthorized("Invalid old password".into()));
    }

    let password_hash = hash_password(new_password)?;
    state.db.update_password(&user.id, &password_hash)?;

    info!("User {} changed password", user.username);
    Ok(())
}

fn mint_tokens(state: &AppStateInner, user: &UserRow) -> Result<TokenPair, ApiError> {
    Ok(state.tokens.issue_pair(&TokenSubject {
        id: parse_id(&user.id)?,
        username: &user.username,
        email: &user.email,
        full_name: &user.full_name,
    })?)
}

/// Mint a token pair for `user` and store the refresh half on their row.
fn issue_tokens(state: &AppStateInner, user: &UserRow) -> Result<TokenPair, ApiError> {
    let tokens = mint_tokens(state, user)?;

    state
        .db
        .set_refresh_token(&user.id, Some(&tokens.refresh_token))?;

    Ok(tokens)
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn reused(user: &UserRow) -> ApiError {
    warn!("Stale or reused refresh token presented for {}", user.username);
    ApiError::Unauthorized("Refresh token is expired or used".into())
}

fn conflict() -> ApiError {
    ApiError::Conflict("User with email or username already exists".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use crate::testing::{avatar, identity_of, test_state};

    fn alice<'a>(avatar: &'a Path) -> Registration<'a> {
        Registration {
            full_name: Some("Alice Liddell"),
            email: Some("alice@example.com"),
            username: Some("Alice"),
            password: Some("wonderland"),
            avatar: Some(avatar),
            cover_image: None,
        }
    }

    async fn registered(state: &AppStateInner) -> User {
        let avatar = avatar();
        register(state, alice(&avatar)).await.unwrap()
    }

    #[tokio::test]
    async fn register_lowercases_and_hides_secrets() {
        let (state, uploader) = test_state();
        let user = registered(&state).await;

        assert_eq!(user.username, "alice");
        assert_eq!(user.avatar_url, "http://media.test/avatar.png");
        assert_eq!(user.cover_image_url, "");
        assert_eq!(uploader.calls(), 1);

        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password").is_none());
        assert!(json.get("passwordHash").is_none());
        assert!(json.get("refreshToken").is_none());

        let row = state.db.get_user_by_username("alice").unwrap().unwrap();
        assert_ne!(row.password, "wonderland");
        assert!(row.password.starts_with("$argon2id$"));
    }

    #[tokio::test]
    async fn register_without_avatar_fails_before_any_upload() {
        let (state, uploader) = test_state();
        let cover = PathBuf::from("/tmp/cover.png");
        let form = Registration {
            avatar: None,
            cover_image: Some(&cover),
            ..alice(Path::new("unused"))
        };

        let err = register(&state, form).await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(ref m) if m.contains("Avatar")));
        assert_eq!(uploader.calls(), 0);
        assert!(state.db.get_user_by_username("alice").unwrap().is_none());
    }

    #[tokio::test]
    async fn register_rejects_blank_fields() {
        let (state, uploader) = test_state();
        let avatar = avatar();

        for form in [
            Registration { full_name: Some("   "), ..alice(&avatar) },
            Registration { email: None, ..alice(&avatar) },
            Registration { username: Some(""), ..alice(&avatar) },
            Registration { password: Some(" \t"), ..alice(&avatar) },
        ] {
            let err = register(&state, form).await.unwrap_err();
            assert!(matches!(err, ApiError::Validation(_)));
        }
        assert_eq!(uploader.calls(), 0);
    }

    #[tokio::test]
    async fn register_conflicts_regardless_of_username_case() {
        let (state, _) = test_state();
        registered(&state).await;
        let avatar = avatar();

        let same_name = Registration {
            username: Some("ALICE"),
            email: Some("other@example.com"),
            ..alice(&avatar)
        };
        assert!(matches!(register(&state, same_name).await, Err(ApiError::Conflict(_))));

        let same_mail = Registration {
            username: Some("someone"),
            ..alice(&avatar)
        };
        assert!(matches!(register(&state, same_mail).await, Err(ApiError::Conflict(_))));
    }

    #[tokio::test]
    async fn failed_avatar_upload_is_fatal() {
        let (state, _) = test_state();
        let broken = PathBuf::from("/tmp/fail-avatar.png");

        let err = register(&state, alice(&broken)).await.unwrap_err();
        assert!(matches!(err, ApiError::Upload(_)));
        assert!(state.db.get_user_by_username("alice").unwrap().is_none());
    }

    #[tokio::test]
    async fn failed_cover_upload_is_tolerated() {
        let (state, uploader) = test_state();
        let avatar = avatar();
        let cover = PathBuf::from("/tmp/fail-cover.png");

        let user = register(&state, Registration { cover_image: Some(&cover), ..alice(&avatar) })
            .await
            .unwrap();
        assert_eq!(user.cover_image_url, "");
        assert_eq!(uploader.calls(), 2);
    }

    #[tokio::test]
    async fn cover_upload_is_stored() {
        let (state, _) = test_state();
        let avatar = avatar();
        let cover = PathBuf::from("/tmp/cover.jpg");

        let user = register(&state, Registration { cover_image: Some(&cover), ..alice(&avatar) })
            .await
            .unwrap();
        assert_eq!(user.cover_image_url, "http://media.test/cover.jpg");
    }

    #[tokio::test]
    async fn login_issues_distinct_tokens_and_stores_refresh() {
        let (state, _) = test_state();
        registered(&state).await;

        let outcome = login(&state, Some("Alice"), None, "wonderland").unwrap();
        assert!(!outcome.tokens.access_token.is_empty());
        assert!(!outcome.tokens.refresh_token.is_empty());
        assert_ne!(outcome.tokens.access_token, outcome.tokens.refresh_token);
        assert_eq!(outcome.user.username, "alice");

        let row = state.db.get_user_by_username("alice").unwrap().unwrap();
        assert_eq!(row.refresh_token.as_deref(), Some(outcome.tokens.refresh_token.as_str()));
    }

    #[tokio::test]
    async fn login_by_email() {
        let (state, _) = test_state();
        registered(&state).await;
        assert!(login(&state, None, Some("alice@example.com"), "wonderland").is_ok());
    }

    #[tokio::test]
    async fn wrong_password_issues_nothing() {
        let (state, _) = test_state();
        registered(&state).await;

        let err = login(&state, Some("alice"), None, "looking-glass").unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));

        let row = state.db.get_user_by_username("alice").unwrap().unwrap();
        assert!(row.refresh_token.is_none());
    }

    #[tokio::test]
    async fn login_needs_a_known_identifier() {
        let (state, _) = test_state();
        registered(&state).await;

        assert!(matches!(login(&state, None, None, "x"), Err(ApiError::Validation(_))));
        assert!(matches!(login(&state, Some("  "), Some(""), "x"), Err(ApiError::Validation(_))));
        assert!(matches!(login(&state, Some("bob"), None, "x"), Err(ApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn logout_clears_token_and_blocks_refresh() {
        let (state, _) = test_state();
        registered(&state).await;
        let outcome = login(&state, Some("alice"), None, "wonderland").unwrap();
        let identity = identity_of(&state, "alice");

        logout(&state, &identity).unwrap();
        logout(&state, &identity).unwrap();

        let row = state.db.get_user_by_username("alice").unwrap().unwrap();
        assert!(row.refresh_token.is_none());

        let err = refresh(&state, Some(&outcome.tokens.refresh_token)).unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn refresh_rotates_and_retires_old_token() {
        let (state, _) = test_state();
        registered(&state).await;
        let first = login(&state, Some("alice"), None, "wonderland").unwrap().tokens;

        let second = refresh(&state, Some(&first.refresh_token)).unwrap();
        assert_ne!(second.refresh_token, first.refresh_token);

        let row = state.db.get_user_by_username("alice").unwrap().unwrap();
        assert_eq!(row.refresh_token.as_deref(), Some(second.refresh_token.as_str()));

        // Replaying the retired token fails, the fresh one still works
        assert!(matches!(
            refresh(&state, Some(&first.refresh_token)),
            Err(ApiError::Unauthorized(_))
        ));
        assert!(refresh(&state, Some(&second.refresh_token)).is_ok());
    }

    #[tokio::test]
    async fn concurrent_refreshes_with_one_token_yield_one_pair() {
        let (state, _) = test_state();
        registered(&state).await;
        let first = login(&state, Some("alice"), None, "wonderland").unwrap().tokens;

        let barrier = std::sync::Barrier::new(2);
        let (barrier, shared, token) = (&barrier, &state, first.refresh_token.as_str());
        let results: Vec<_> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..2)
                .map(|_| {
                    s.spawn(move || {
                        barrier.wait();
                        refresh(shared, Some(token))
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
        assert_eq!(winners.len(), 1);
        assert!(results.iter().any(|r| matches!(
            r,
            Err(ApiError::Unauthorized(m)) if m.contains("expired or used")
        )));

        let row = state.db.get_user_by_username("alice").unwrap().unwrap();
        assert_eq!(row.refresh_token.as_deref(), Some(winners[0].refresh_token.as_str()));
    }

    #[tokio::test]
    async fn validly_signed_but_unstored_token_is_rejected() {
        let (state, _) = test_state();
        registered(&state).await;
        login(&state, Some("alice"), None, "wonderland").unwrap();
        let identity = identity_of(&state, "alice");

        let forged = state.tokens.issue_refresh(identity.user_id).unwrap();
        let err = refresh(&state, Some(&forged)).unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(ref m) if m.contains("expired or used")));
    }

    #[tokio::test]
    async fn refresh_for_unknown_user_or_missing_token_fails() {
        let (state, _) = test_state();

        let orphan = state.tokens.issue_refresh(Uuid::new_v4()).unwrap();
        assert!(matches!(refresh(&state, Some(&orphan)), Err(ApiError::Unauthorized(_))));
        assert!(matches!(refresh(&state, None), Err(ApiError::Unauthorized(_))));
        assert!(matches!(refresh(&state, Some("")), Err(ApiError::Unauthorized(_))));
        assert!(matches!(refresh(&state, Some("junk")), Err(ApiError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn access_token_cannot_be_used_to_refresh() {
        let (state, _) = test_state();
        registered(&state).await;
        let tokens = login(&state, Some("alice"), None, "wonderland").unwrap().tokens;

        assert!(matches!(
            refresh(&state, Some(&tokens.access_token)),
            Err(ApiError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn change_password_requires_old_password() {
        let (state, _) = test_state();
        registered(&state).await;
        let identity = identity_of(&state, "alice");

        let err = change_password(&state, &identity, "guess", "new-secret").unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));
        assert!(matches!(
            change_password(&state, &identity, "wonderland", "  "),
            Err(ApiError::Validation(_))
        ));

        change_password(&state, &identity, "wonderland", "new-secret").unwrap();
        assert!(login(&state, Some("alice"), None, "new-secret").is_ok());
        assert!(matches!(
            login(&state, Some("alice"), None, "wonderland"),
            Err(ApiError::Unauthorized(_))
        ));
    }
}
