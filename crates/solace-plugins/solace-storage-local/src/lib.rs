//! # solace-storage-local
//!
//! Local filesystem implementation of `MediaStore`. Objects live under
//! `root_path/{key}` and are served back at `url_prefix/{key}`.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use solace_core::{MediaStore, ProgressFn};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Bytes written between progress reports.
const CHUNK_SIZE: usize = 64 * 1024;

pub struct LocalMediaStore {
    /// Root directory for all uploads (e.g., "./data/media")
    root_path: PathBuf,
    /// Public URL prefix (e.g., "/media")
    url_prefix: String,
}

impl LocalMediaStore {
    pub fn new(root: impl Into<PathBuf>, url_prefix: impl Into<String>) -> Self {
        Self {
            root_path: root.into(),
            url_prefix: url_prefix.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root_path
    }

    /// Maps a key onto the filesystem, refusing anything that could escape the root.
    fn object_path(&self, key: &str) -> anyhow::Result<PathBuf> {
        let relative = Path::new(key);
        let clean = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !clean {
            anyhow::bail!("invalid object key {key:?}");
        }
        Ok(self.root_path.join(relative))
    }

    pub fn url_for(&self, key: &str) -> String {
        format!("{}/{}", self.url_prefix, key)
    }
}

#[async_trait]
impl MediaStore for LocalMediaStore {
    /// Writes the object in chunks, reporting progress after each one.
    /// The file only appears under its final name once fully written.
    async fn put_object(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
        progress: ProgressFn,
    ) -> anyhow::Result<String> {
        let target = self.object_path(key)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut partial = target.clone().into_os_string();
        partial.push(".part");
        let partial = PathBuf::from(partial);
        let mut file = fs::File::create(&partial).await?;
        let total = data.len().max(1);
        let mut written = 0usize;
        for chunk in data.chunks(CHUNK_SIZE) {
            if let Err(err) = file.write_all(chunk).await {
                drop(file);
                let _ = fs::remove_file(&partial).await;
                return Err(err.into());
            }
            written += chunk.len();
            progress((written * 100 / total) as u8);
        }
        file.flush().await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(&partial, &target).await?;

        tracing::debug!(key, content_type, bytes = data.len(), "object stored");
        Ok(self.url_for(key))
    }
}
