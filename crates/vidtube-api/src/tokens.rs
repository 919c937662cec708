//! Access and refresh token issuance.
//!
//! Access tokens are short-lived and carry the caller's profile basics.
//! Refresh tokens are long-lived, carry only the subject, and are signed with
//! a separate secret so one can never be replayed as the other.

use std::time::Duration;

use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Serialize, de::DeserializeOwned};
use uuid::Uuid;

use vidtube_types::api::{Claims, RefreshClaims};

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("Token generation failed: {0}")]
    Generation(String),
    #[error("Token expired")]
    Expired,
    #[error("Invalid token")]
    Invalid,
}

/// Secrets and lifetimes for both token kinds.
#[derive(Clone)]
pub struct TokenConfig {
    pub access_secret: String,
    pub access_ttl: Duration,
    pub refresh_secret: String,
    pub refresh_ttl: Duration,
}

/// Who a token pair is minted for.
pub struct TokenSubject<'a> {
    pub id: Uuid,
    pub username: &'a str,
    pub email: &'a str,
    pub full_name: &'a str,
}

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

pub struct TokenIssuer {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenIssuer {
    pub fn new(config: &TokenConfig) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(config.access_secret.as_bytes()),
            access_decoding: DecodingKey::from_secret(config.access_secret.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(config.refresh_secret.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(config.refresh_secret.as_bytes()),
            access_ttl: config.access_ttl,
            refresh_ttl: config.refresh_ttl,
        }
    }

    pub fn issue_pair(&self, subject: &TokenSubject<'_>) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access_token: self.issue_access(subject)?,
            refresh_token: self.issue_refresh(subject.id)?,
        })
    }

    pub fn issue_access(&self, subject: &TokenSubject<'_>) -> Result<String, TokenError> {
        let (iat, exp) = window(self.access_ttl);
        let claims = Claims {
            sub: subject.id,
            username: subject.username.to_string(),
            email: subject.email.to_string(),
            full_name: subject.full_name.to_string(),
            iat,
            exp,
        };
        sign(&claims, &self.access_encoding)
    }

    pub fn issue_refresh(&self, user_id: Uuid) -> Result<String, TokenError> {
        let (iat, exp) = window(self.refresh_ttl);
        let claims = RefreshClaims {
            sub: user_id,
            jti: Uuid::new_v4(),
            iat,
            exp,
        };
        sign(&claims, &self.refresh_encoding)
    }

    pub fn verify_access(&self, token: &str) -> Result<Claims, TokenError> {
        verify(token, &self.access_decoding)
    }

    pub fn verify_refresh(&self, token: &str) -> Result<RefreshClaims, TokenError> {
        verify(token, &self.refresh_decoding)
    }
}

fn window(ttl: Duration) -> (usize, usize) {
    let now = chrono::Utc::now().timestamp() as usize;
    (now, now + ttl.as_secs() as usize)
}

fn sign<T: Serialize>(claims: &T, key: &EncodingKey) -> Result<String, TokenError> {
    encode(&Header::default(), claims, key).map_err(|e| TokenError::Generation(e.to_string()))
}

fn verify<T: DeserializeOwned>(token: &str, key: &DecodingKey) -> Result<T, TokenError> {
    decode::<T>(token, key, &Validation::default())
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Invalid,
        })
}

/// Parse a lifetime such as `15m`, `1d`, `10d`, `12h`, `30s` or bare seconds.
pub fn parse_ttl(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    let (digits, unit) = match raw.find(|c: char| !c.is_ascii_digit()) {
        Some(idx) => raw.split_at(idx),
        None => (raw, "s"),
    };
    let n: u64 = digits.parse().ok()?;
    let secs = match unit {
        "s" => n,
        "m" => n.checked_mul(60)?,
        "h" => n.checked_mul(60 * 60)?,
        "d" => n.checked_mul(24 * 60 * 60)?,
        _ => return None,
    };
    Some(Duration::from_secs(secs))
}
