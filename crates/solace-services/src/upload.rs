//! # Image upload
//!
//! Validates community images and streams them to the `MediaStore`.

use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use mime::Mime;
use solace_core::{AppError, Clock, MediaStore, ProgressFn, Result};

/// 5 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

/// Object-store prefix for forum images.
pub const IMAGE_PREFIX: &str = "community-images";

/// A file as received from the client.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    /// Declared by the client; guessed from the file name when absent
    pub content_type: Option<String>,
    pub data: Bytes,
}

/// Progress callback that ignores updates.
pub fn no_progress() -> ProgressFn {
    Arc::new(|_: u8| {})
}

/// Declared type when usable, otherwise a guess from the extension.
pub fn resolve_content_type(file_name: &str, declared: Option<&str>) -> Option<Mime> {
    declared
        .and_then(|d| d.parse::<Mime>().ok())
        .filter(|m| *m != mime::APPLICATION_OCTET_STREAM)
        .or_else(|| mime_guess::from_path(file_name).first())
}

/// Checks type and size; returns the resolved MIME type.
pub fn validate(upload: &ImageUpload, max_bytes: usize) -> Result<Mime> {
    let content_type = resolve_content_type(&upload.file_name, upload.content_type.as_deref())
        .filter(|m| m.type_() == mime::IMAGE)
        .ok_or_else(|| AppError::ValidationError("please select an image file".to_string()))?;

    if upload.data.is_empty() {
        return Err(AppError::ValidationError("the selected file is empty".to_string()));
    }
    if upload.data.len() > max_bytes {
        return Err(AppError::ValidationError(format!(
            "image must be at most {} MB",
            max_bytes / (1024 * 1024)
        )));
    }
    Ok(content_type)
}

/// Last path segment with anything outside `[A-Za-z0-9._-]` replaced by `_`.
pub fn sanitize_file_name(file_name: &str) -> String {
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        "image".to_string()
    } else {
        cleaned
    }
}

/// `community-images/{unix_millis}_{file_name}`
pub fn object_key(now: DateTime<Utc>, file_name: &str) -> String {
    format!(
        "{IMAGE_PREFIX}/{}_{}",
        now.timestamp_millis(),
        sanitize_file_name(file_name)
    )
}

pub struct UploadService {
    store: Arc<dyn MediaStore>,
    clock: Arc<dyn Clock>,
    max_bytes: usize,
}

impl UploadService {
    pub fn new(store: Arc<dyn MediaStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            max_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Uploads an image and returns its public URL.
    ///
    /// On failure progress is reset to 0; nothing is retried.
    #[tracing::instrument(skip(self, upload, progress), fields(file_name = %upload.file_name, size = upload.data.len()))]
    pub async fn upload(
        &self,
        user_id: &str,
        upload: ImageUpload,
        progress: ProgressFn,
    ) -> Result<String> {
        let content_type = validate(&upload, self.max_bytes)?;
        let key = object_key(self.clock.now(), &upload.file_name);

        progress(0);
        match self
            .store
            .put_object(&key, upload.data, content_type.essence_str(), progress.clone())
            .await
        {
            Ok(url) => {
                tracing::info!(%key, "image uploaded");
                Ok(url)
            }
            Err(err) => {
                tracing::error!(%key, error = %err, "image upload failed");
                progress(0);
                Err(AppError::Internal("image upload failed".to_string()))
            }
        }
    }
}
