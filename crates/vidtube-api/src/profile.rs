//! Channel profiles, subscriptions and watch history.

use tracing::info;
use uuid::Uuid;

use vidtube_types::models::{ChannelProfile, WatchedVideo};

use crate::AppStateInner;
use crate::convert::watched_video;
use crate::error::ApiError;
use crate::middleware::Identity;

/// Look up a channel by username (case-insensitive) as seen by `viewer`.
pub fn channel_profile(
    state: &AppStateInner,
    viewer: &Identity,
    username: &str,
) -> Result<ChannelProfile, ApiError> {
    let username = username.trim();
    if username.is_empty() {
        return Err(ApiError::Validation("username is missing".into()));
    }

    let channel = state
        .db
        .get_user_by_username(&username.to_lowercase())?
        .ok_or_else(|| ApiError::NotFound("channel does not exist".into()))?;

    let subscribers_count = state.db.count_subscribers(&channel.id)?;
    let channels_subscribed_to_count = state.db.count_subscriptions(&channel.id)?;
    let is_subscribed = state
        .db
        .is_subscribed(&viewer.user_id.to_string(), &channel.id)?;

    Ok(ChannelProfile {
        full_name: channel.full_name,
        username: channel.username,
        subscribers_count,
        channels_subscribed_to_count,
        is_subscribed,
        avatar_url: channel.avatar_url,
        cover_image_url: channel.cover_image_url,
        email: channel.email,
    })
}

/// Subscribe to `channel_id`, or unsubscribe if already subscribed.
/// Returns whether the caller is subscribed afterwards.
pub fn toggle_subscription(
    state: &AppStateInner,
    identity: &Identity,
    channel_id: Uuid,
) -> Result<bool, ApiError> {
    if channel_id == identity.user_id {
        return Err(ApiError::Validation("cannot subscribe to your own channel".into()));
    }

    let channel = state
        .db
        .get_user_by_id(&channel_id.to_string())?
        .ok_or_else(|| ApiError::NotFound("channel does not exist".into()))?;

    let subscribed = state.db.toggle_subscription(
        &Uuid::new_v4().to_string(),
        &identity.user_id.to_string(),
        &channel.id,
    )?;

    info!(
        "{} {} {}",
        identity.username,
        if subscribed { "subscribed to" } else { "unsubscribed from" },
        channel.username
    );
    Ok(subscribed)
}

/// The caller's watch history, oldest first, each video with its owner.
pub fn watch_history(
    state: &AppStateInner,
    identity: &Identity,
) -> Result<Vec<WatchedVideo>, ApiError> {
    state
        .db
        .get_watch_history(&identity.user_id.to_string())?
        .into_iter()
        .map(watched_video)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use vidtube_db::models::{NewUser, NewVideo};

    use crate::testing::{identity_of, test_state};

    fn add_user(state: &AppStateInner, username: &str) -> Identity {
        state
            .db
            .create_user(&NewUser {
                id: &Uuid::new_v4().to_string(),
                username,
                email: &format!("{}@example.com", username),
                full_name: &username.to_uppercase(),
                password_hash: "$argon2id$unused",
                avatar_url: &format!("http://media.test/{}.png", username),
                cover_image_url: "",
            })
            .unwrap();
        identity_of(state, username)
    }

    #[test]
    fn profile_counts_and_viewer_status() {
        let (state, _) = test_state();
        let alice = add_user(&state, "alice");
        let bob = add_user(&state, "bob");
        let carol = add_user(&state, "carol");

        toggle_subscription(&state, &bob, alice.user_id).unwrap();
        toggle_subscription(&state, &carol, alice.user_id).unwrap();
        toggle_subscription(&state, &alice, carol.user_id).unwrap();

        let seen_by_bob = channel_profile(&state, &bob, "ALICE").unwrap();
        assert_eq!(seen_by_bob.username, "alice");
        assert_eq!(seen_by_bob.full_name, "ALICE");
        assert_eq!(seen_by_bob.email, "alice@example.com");
        assert_eq!(seen_by_bob.subscribers_count, 2);
        assert_eq!(seen_by_bob.channels_subscribed_to_count, 1);
        assert!(seen_by_bob.is_subscribed);

        let seen_by_self = channel_profile(&state, &alice, "alice").unwrap();
        assert!(!seen_by_self.is_subscribed);

        let carol_seen_by_bob = channel_profile(&state, &bob, "carol").unwrap();
        assert_eq!(carol_seen_by_bob.subscribers_count, 1);
        assert!(!carol_seen_by_bob.is_subscribed);
    }

    #[test]
    fn is_subscribed_tracks_the_edge() {
        let (state, _) = test_state();
        let alice = add_user(&state, "alice");
        let bob = add_user(&state, "bob");

        assert!(toggle_subscription(&state, &bob, alice.user_id).unwrap());
        assert!(channel_profile(&state, &bob, "alice").unwrap().is_subscribed);

        assert!(!toggle_subscription(&state, &bob, alice.user_id).unwrap());
        let profile = channel_profile(&state, &bob, "alice").unwrap();
        assert!(!profile.is_subscribed);
        assert_eq!(profile.subscribers_count, 0);
    }

    #[test]
    fn profile_lookup_errors() {
        let (state, _) = test_state();
        let alice = add_user(&state, "alice");

        assert!(matches!(channel_profile(&state, &alice, "  "), Err(ApiError::Validation(_))));
        assert!(matches!(channel_profile(&state, &alice, "nobody"), Err(ApiError::NotFound(_))));
    }

    #[test]
    fn subscription_guards() {
        let (state, _) = test_state();
        let alice = add_user(&state, "alice");

        assert!(matches!(
            toggle_subscription(&state, &alice, alice.user_id),
            Err(ApiError::Validation(_))
        ));
        assert!(matches!(
            toggle_subscription(&state, &alice, Uuid::new_v4()),
            Err(ApiError::NotFound(_))
        ));
    }

    #[test]
    fn watch_history_resolves_videos_with_owner() {
        let (state, _) = test_state();
        let viewer = add_user(&state, "viewer");
        let maker = add_user(&state, "maker");

        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        for (id, title) in [(first, "Intro"), (second, "Deep dive")] {
            state
                .db
                .insert_video(&NewVideo {
                    id: &id.to_string(),
                    owner_id: &maker.user_id.to_string(),
                    video_file: "http://media.test/v.mp4",
                    thumbnail: "http://media.test/t.png",
                    title,
                    description: "about things",
                    duration: 61.0,
                })
                .unwrap();
        }
        state.db.record_watch(&viewer.user_id.to_string(), &first.to_string()).unwrap();
        state.db.record_watch(&viewer.user_id.to_string(), &second.to_string()).unwrap();

        let history = watch_history(&state, &viewer).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, first);
        assert_eq!(history[1].title, "Deep dive");

        let owner = history[0].owner.as_ref().unwrap();
        assert_eq!(owner.username, "maker");
        assert_eq!(owner.full_name, "MAKER");
        assert_eq!(owner.avatar_url, "http://media.test/maker.png");

        assert!(watch_history(&state, &maker).unwrap().is_empty());
    }
}
