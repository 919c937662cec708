//! Server configuration loaded from environment variables (after `.env`).
//!
//! Everything except the two token secrets has a development default.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};

use vidtube_api::media::CloudinaryConfig;
use vidtube_api::tokens::{TokenConfig, parse_ttl};

/// Placeholder secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
    "secret",
];

#[derive(Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub db_path: PathBuf,
    pub tokens: TokenConfig,
    /// Allowed browser origin for credentialed requests. `None` = permissive.
    pub cors_origin: Option<String>,
    /// Multipart intake parks files here until they are uploaded.
    pub temp_dir: PathBuf,
    /// Disk uploader target, served at `/media`.
    pub media_dir: PathBuf,
    /// Base URL clients use to reach this server, for disk-hosted media.
    pub public_url: String,
    /// Set when all three `CLOUDINARY_*` variables are present.
    pub cloudinary: Option<CloudinaryConfig>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let host = var("VIDTUBE_HOST", "0.0.0.0");
        let port: u16 = var("VIDTUBE_PORT", "8000")
            .parse()
            .context("VIDTUBE_PORT must be a port number")?;
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .context("VIDTUBE_HOST must be an IP address")?;

        let tokens = TokenConfig {
            access_secret: secret(&get, "VIDTUBE_ACCESS_TOKEN_SECRET")?,
            access_ttl: ttl(&var("VIDTUBE_ACCESS_TOKEN_EXPIRY", "1d"), "VIDTUBE_ACCESS_TOKEN_EXPIRY")?,
            refresh_secret: secret(&get, "VIDTUBE_REFRESH_TOKEN_SECRET")?,
            refresh_ttl: ttl(&var("VIDTUBE_REFRESH_TOKEN_EXPIRY", "10d"), "VIDTUBE_REFRESH_TOKEN_EXPIRY")?,
        };
        if tokens.access_secret == tokens.refresh_secret {
            bail!("Access and refresh token secrets must differ");
        }

        let cloudinary = match (
            get("CLOUDINARY_CLOUD_NAME"),
            get("CLOUDINARY_API_KEY"),
            get("CLOUDINARY_API_SECRET"),
        ) {
            (Some(cloud_name), Some(api_key), Some(api_secret)) => Some(CloudinaryConfig {
                cloud_name,
                api_key,
                api_secret,
            }),
            _ => None,
        };

        Ok(Self {
            addr,
            db_path: var("VIDTUBE_DB_PATH", "vidtube.db").into(),
            tokens,
            cors_origin: get("VIDTUBE_CORS_ORIGIN").filter(|o| !o.is_empty() && o != "*"),
            temp_dir: var("VIDTUBE_TEMP_DIR", "./public/temp").into(),
            media_dir: var("VIDTUBE_MEDIA_DIR", "./public/media").into(),
            public_url: var("VIDTUBE_PUBLIC_URL", &format!("http://localhost:{}", port)),
            cloudinary,
        })
    }
}

fn secret(get: &impl Fn(&str) -> Option<String>, key: &str) -> Result<String> {
    let value = get(key).unwrap_or_default();
    if value.is_empty() || PLACEHOLDER_SECRETS.contains(&value.as_str()) {
        bail!("{} is unset or still a placeholder; set it in your .env file", key);
    }
    Ok(value)
}

fn ttl(raw: &str, key: &str) -> Result<Duration> {
    parse_ttl(raw).with_context(|| format!("{} has an unreadable duration '{}'", key, raw))
}
