use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("blob write failed: {0}")]
    Write(String),

    #[error("blob store unavailable")]
    Unavailable,
}

/// Opaque image storage. Returns a URL the clients can fetch the blob from.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn store(&self, bytes: Vec<u8>, content_type: &str) -> Result<String, BlobError>;

    /// Best-effort removal of a blob that ended up unreferenced.
    async fn remove(&self, url: &str);
}

fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        "image/heic" => "heic",
        _ => "bin",
    }
}

/// Writes blobs under a local directory that is also served over HTTP.
pub struct LocalBlobStore {
    root: PathBuf,
    base_url: String,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn store(&self, bytes: Vec<u8>, content_type: &str) -> Result<String, BlobError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|err| BlobError::Write(format!("create {}: {err}", self.root.display())))?;

        let file_name = format!("{}.{}", Uuid::new_v4(), extension_for(content_type));
        let path = self.root.join(&file_name);

        tokio::fs::write(&path, bytes)
            .await
            .map_err(|err| BlobError::Write(format!("write {}: {err}", path.display())))?;

        Ok(format!("{}/{}", self.base_url, file_name))
    }

    async fn remove(&self, url: &str) {
        let Some(file_name) = url.rsplit('/').next() else {
            return;
        };
        if let Err(err) = tokio::fs::remove_file(self.root.join(file_name)).await {
            tracing::warn!(error = %err, url, "failed to remove orphaned blob");
        }
    }
}

/// In-process store, used by tests and local demos.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: DashMap<String, (String, Vec<u8>)>,
    failing: AtomicBool,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following `store` call fail until switched back.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }

    pub fn get(&self, url: &str) -> Option<(String, Vec<u8>)> {
        self.blobs.get(url).map(|entry| entry.value().clone())
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn store(&self, bytes: Vec<u8>, content_type: &str) -> Result<String, BlobError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(BlobError::Unavailable);
        }

        let url = format!(
            "memory://{}.{}",
            Uuid::new_v4(),
            extension_for(content_type)
        );
        self.blobs
            .insert(url.clone(), (content_type.to_string(), bytes));
        Ok(url)
    }

    async fn remove(&self, url: &str) {
        self.blobs.remove(url);
    }
}
