pub mod account;
pub mod convert;
pub mod error;
pub mod media;
pub mod middleware;
pub mod password;
pub mod profile;
pub mod routes;
pub mod session;
#[cfg(test)]
mod testing;
pub mod tokens;
pub mod uploads;

use std::path::PathBuf;
use std::sync::Arc;

use vidtube_db::Database;

use crate::media::MediaUploader;
use crate::tokens::TokenIssuer;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub tokens: TokenIssuer,
    pub uploader: Arc<dyn MediaUploader>,
    /// Where multipart intake parks files until they are uploaded.
    pub temp_dir: PathBuf,
}
