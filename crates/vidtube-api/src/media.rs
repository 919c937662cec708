//! Media hosting.
//!
//! An uploader takes a file that multipart intake wrote to the temp
//! directory, publishes it, and hands back a public URL. Any failure comes
//! back as `None`; callers decide whether a missing result is fatal. The temp
//! file is removed after every attempt.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde::Deserialize;
use sha1::{Digest, Sha1};
use tokio::fs;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct UploadedMedia {
    pub url: String,
}

#[async_trait]
pub trait MediaUploader: Send + Sync {
    async fn upload(&self, local_path: &Path) -> Option<UploadedMedia>;
}

// ── Cloudinary ──────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
}

/// Signed uploads to the Cloudinary REST API (`resource_type=auto`).
pub struct CloudinaryUploader {
    client: reqwest::Client,
    config: CloudinaryConfig,
    endpoint: String,
}

#[derive(Deserialize)]
struct CloudinaryResponse {
    url: Option<String>,
    secure_url: Option<String>,
}

impl CloudinaryUploader {
    pub fn new(config: CloudinaryConfig) -> Self {
        let endpoint = format!(
            "https://api.cloudinary.com/v1_1/{}/auto/upload",
            config.cloud_name
        );
        Self {
            client: reqwest::Client::new(),
            config,
            endpoint,
        }
    }

    async fn try_upload(&self, local_path: &Path) -> Result<UploadedMedia> {
        let bytes = fs::read(local_path)
            .await
            .with_context(|| format!("reading {}", local_path.display()))?;
        let file_name = local_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload")
            .to_string();

        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = sign_params(&timestamp, &self.config.api_secret);

        let form = reqwest::multipart::Form::new()
            .text("api_key", self.config.api_key.clone())
            .text("timestamp", timestamp)
            .text("signature", signature)
            .part(
                "file",
                reqwest::multipart::Part::bytes(bytes).file_name(file_name),
            );

        let resp: CloudinaryResponse = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        match resp.secure_url.or(resp.url) {
            Some(url) => Ok(UploadedMedia { url }),
            None => bail!("upload response carried no url"),
        }
    }
}

/// Cloudinary request signature: SHA-1 over the sorted signed params with
/// the API secret appended.
fn sign_params(timestamp: &str, api_secret: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(format!("timestamp={}{}", timestamp, api_secret).as_bytes());
    hex::encode(hasher.finalize())
}

#[async_trait]
impl MediaUploader for CloudinaryUploader {
    async fn upload(&self, local_path: &Path) -> Option<UploadedMedia> {
        let result = self.try_upload(local_path).await;
        discard(local_path).await;

        match result {
            Ok(media) => {
                info!("Uploaded {} to {}", local_path.display(), media.url);
                Some(media)
            }
            Err(e) => {
                warn!("Cloudinary upload of {} failed: {:#}", local_path.display(), e);
                None
            }
        }
    }
}

// ── Local disk ──────────────────────────────────────────────────────────

/// Publishes files into a directory that the server exposes statically.
///
/// Each file is stored as `{media_dir}/{uuid}.{ext}` and served under
/// `{public_base}/{uuid}.{ext}`.
pub struct DiskUploader {
    dir: PathBuf,
    public_base: String,
}

impl DiskUploader {
    pub async fn new(dir: PathBuf, public_base: impl Into<String>) -> Result<Self> {
        fs::create_dir_all(&dir).await?;
        info!("Media directory: {}", dir.display());
        Ok(Self {
            dir,
            public_base: public_base.into().trim_end_matches('/').to_string(),
        })
    }

    async fn try_upload(&self, local_path: &Path) -> Result<UploadedMedia> {
        let name = match local_path.extension().and_then(|e| e.to_str()) {
            Some(ext) => format!("{}.{}", Uuid::new_v4(), ext),
            None => Uuid::new_v4().to_string(),
        };

        fs::copy(local_path, self.dir.join(&name))
            .await
            .with_context(|| format!("copying {}", local_path.display()))?;

        Ok(UploadedMedia {
            url: format!("{}/{}", self.public_base, name),
        })
    }
}

#[async_trait]
impl MediaUploader for DiskUploader {
    async fn upload(&self, local_path: &Path) -> Option<UploadedMedia> {
        let result = self.try_upload(local_path).await;
        discard(local_path).await;

        match result {
            Ok(media) => Some(media),
            Err(e) => {
                warn!("Disk upload of {} failed: {:#}", local_path.display(), e);
                None
            }
        }
    }
}

/// Remove a temp file, tolerating one that is already gone.
async fn discard(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove temp file {}: {}", path.display(), e),
    }
}
