//! Multipart intake.
//!
//! Text parts are collected into a map. File parts named in `file_fields` are
//! streamed to `{temp_dir}/{uuid}.{ext}`; the client-supplied filename only
//! contributes its extension. Any temp file still present when the form is
//! dropped is deleted.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use axum::extract::Multipart;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::error::ApiError;

/// 10 MB per file
pub const MAX_FILE_SIZE: usize = 10 * 1024 * 1024;

#[derive(Debug, Default)]
pub struct UploadForm {
    fields: HashMap<String, String>,
    files: HashMap<String, PathBuf>,
}

impl UploadForm {
    pub async fn read(
        mut multipart: Multipart,
        temp_dir: &Path,
        file_fields: &[&str],
    ) -> Result<Self, ApiError> {
        let mut form = UploadForm::default();

        while let Some(mut field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::Validation(format!("Malformed multipart body: {}", e)))?
        {
            let name = field.name().unwrap_or("").to_string();

            let Some(file_name) = field.file_name().map(str::to_string) else {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::Validation(format!("Unreadable field '{}': {}", name, e)))?;
                form.fields.insert(name, text);
                continue;
            };

            if !file_fields.contains(&name.as_str()) {
                debug!("Ignoring unexpected file field '{}'", name);
                continue;
            }
            if form.files.contains_key(&name) {
                return Err(ApiError::Validation(format!("Only one '{}' file is allowed", name)));
            }

            tokio::fs::create_dir_all(temp_dir).await.map_err(|e| {
                error!("Failed to create temp directory {}: {}", temp_dir.display(), e);
                ApiError::Internal(e.into())
            })?;

            let path = temp_dir.join(temp_name(&file_name));
            // Track before writing so a failed write is still cleaned up on drop.
            form.files.insert(name.clone(), path.clone());

            let mut file = tokio::fs::File::create(&path).await.map_err(|e| {
                error!("Failed to create temp file {}: {}", path.display(), e);
                ApiError::Internal(e.into())
            })?;

            let mut written = 0usize;
            while let Some(chunk) = field
                .chunk()
                .await
                .map_err(|e| ApiError::Validation(format!("Unreadable file '{}': {}", name, e)))?
            {
                written += chunk.len();
                if written > MAX_FILE_SIZE {
                    warn!("Rejected '{}' upload over {} bytes", name, MAX_FILE_SIZE);
                    return Err(ApiError::TooLarge(format!(
                        "File '{}' exceeds the {} MB limit",
                        name,
                        MAX_FILE_SIZE / (1024 * 1024)
                    )));
                }
                file.write_all(&chunk).await.map_err(|e| {
                    error!("Failed to write temp file {}: {}", path.display(), e);
                    ApiError::Internal(e.into())
                })?;
            }
            file.flush().await.map_err(|e| ApiError::Internal(e.into()))?;

            // Browsers send an empty part when no file was picked.
            if written == 0 && file_name.is_empty() {
                if let Some(p) = form.files.remove(&name) {
                    let _ = tokio::fs::remove_file(p).await;
                }
            }
        }

        Ok(form)
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn file(&self, name: &str) -> Option<&Path> {
        self.files.get(name).map(PathBuf::as_path)
    }
}

impl Drop for UploadForm {
    fn drop(&mut self) {
        for path in self.files.values() {
            match std::fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to remove temp file {}: {}", path.display(), e),
            }
        }
    }
}

fn temp_name(client_name: &str) -> String {
    let ext = Path::new(client_name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.len() <= 8 && e.chars().all(|c| c.is_ascii_alphanumeric()));

    match ext {
        Some(ext) => format!("{}.{}", Uuid::new_v4(), ext.to_ascii_lowercase()),
        None => Uuid::new_v4().to_string(),
    }
}
