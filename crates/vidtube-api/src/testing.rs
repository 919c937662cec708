//! Shared fixtures for unit tests.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use vidtube_db::Database;

use crate::AppStateInner;
use crate::media::{MediaUploader, UploadedMedia};
use crate::middleware::Identity;
use crate::tokens::{TokenConfig, TokenIssuer};

/// Records calls and "hosts" every file at `http://media.test/{name}`.
/// Paths containing `fail` come back as `None`.
#[derive(Default)]
pub struct FakeUploader {
    pub calls: AtomicUsize,
}

impl FakeUploader {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaUploader for FakeUploader {
    async fn upload(&self, local_path: &Path) -> Option<UploadedMedia> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let name = local_path.file_name()?.to_str()?;
        if name.contains("fail") {
            return None;
        }
        Some(UploadedMedia {
            url: format!("http://media.test/{}", name),
        })
    }
}

pub fn test_state() -> (AppStateInner, Arc<FakeUploader>) {
    let uploader = Arc::new(FakeUploader::default());
    let state = AppStateInner {
        db: Database::open_in_memory().unwrap(),
        tokens: TokenIssuer::new(&TokenConfig {
            access_secret: "test-access-secret".into(),
            access_ttl: Duration::from_secs(900),
            refresh_secret: "test-refresh-secret".into(),
            refresh_ttl: Duration::from_secs(864_000),
        }),
        uploader: uploader.clone(),
        temp_dir: std::env::temp_dir(),
    };
    (state, uploader)
}

pub fn identity_of(state: &AppStateInner, username: &str) -> Identity {
    let row = state.db.get_user_by_username(username).unwrap().unwrap();
    Identity {
        user_id: row.id.parse().unwrap(),
        username: row.username,
    }
}

pub fn avatar() -> PathBuf {
    PathBuf::from("/tmp/avatar.png")
}
