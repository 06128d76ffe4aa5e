//! Object storage for downloaded files
//! Uses Apache Arrow object_store crate

use object_store::local::LocalFileSystem;
use object_store::{ObjectStore, WriteMultipart, path::Path as StoragePath};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Object store error: {0}")]
    ObjectStoreError(#[from] object_store::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Storage result type
pub type Result<T> = std::result::Result<T, StorageError>;

/// Metadata returned after upload
#[derive(Debug, Clone)]
pub struct UploadMetadata {
    pub key: String,
    pub etag: Option<String>,
    pub size: usize,
}

/// Storage client wrapping object_store
#[derive(Clone)]
pub struct StorageClient {
    store: Arc<dyn ObjectStore>,
    /// Human-readable location, used in logs
    pub location: String,
}

impl StorageClient {
    /// Create new storage client with any object_store backend
    pub fn new(store: Arc<dyn ObjectStore>, location: String) -> Self {
        Self { store, location }
    }

    /// Files rooted at `dir` on the local filesystem (created if missing)
    pub fn local(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let store = LocalFileSystem::new_with_prefix(dir)?;
        Ok(Self {
            store: Arc::new(store),
            location: dir.display().to_string(),
        })
    }

    /// Create in-memory storage for testing/development
    pub fn in_memory() -> Self {
        Self {
            store: Arc::new(object_store::memory::InMemory::new()),
            location: "memory".to_string(),
        }
    }

    /// Upload bytes to storage in one request
    pub async fn upload(&self, key: &str, data: Vec<u8>) -> Result<UploadMetadata> {
        let path = StoragePath::from(key);
        let size = data.len();

        let put_result = self.store.put(&path, data.into()).await?;

        tracing::info!(key, size, location = %self.location, "Stored object");

        Ok(UploadMetadata {
            key: key.to_string(),
            etag: put_result.e_tag,
            size,
        })
    }

    /// Open a writer that uploads `key` in parts of `chunk_size` bytes
    pub async fn writer(&self, key: &str, chunk_size: usize) -> Result<StorageWriter> {
        let path = StoragePath::from(key);
        let upload = self.store.put_multipart(&path).await?;

        Ok(StorageWriter {
            key: key.to_string(),
            inner: WriteMultipart::new_with_chunk_size(upload, chunk_size.max(1)),
            written: 0,
        })
    }

    /// Read a whole object back
    pub async fn download(&self, key: &str) -> Result<Vec<u8>> {
        let path = StoragePath::from(key);

        let result = match self.store.get(&path).await {
            Ok(result) => result,
            Err(object_store::Error::NotFound { .. }) => {
                return Err(StorageError::NotFound(key.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let bytes = result.bytes().await?;

        tracing::debug!(key, size = bytes.len(), "Read object from storage");

        Ok(bytes.to_vec())
    }

    /// Check if key exists
    pub async fn exists(&self, key: &str) -> Result<bool> {
        let path = StoragePath::from(key);

        match self.store.head(&path).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-progress chunked upload; nothing is visible until [`finish`](Self::finish)
pub struct StorageWriter {
    key: String,
    inner: WriteMultipart,
    written: usize,
}

/// Parts allowed in flight before `write` waits
const MAX_PARTS_IN_FLIGHT: usize = 4;

impl StorageWriter {
    pub async fn write(&mut self, data: &[u8]) -> Result<()> {
        self.inner.wait_for_capacity(MAX_PARTS_IN_FLIGHT).await?;
        self.inner.write(data);
        self.written += data.len();
        Ok(())
    }

    pub async fn finish(self) -> Result<UploadMetadata> {
        let put_result = self
            .inner
            .finish()
            .await
            .map_err(|e| StorageError::UploadFailed(format!("{}: {}", self.key, e)))?;

        tracing::info!(key = %self.key, size = self.written, "Stored object");

        Ok(UploadMetadata {
            key: self.key,
            etag: put_result.e_tag,
            size: self.written,
        })
    }

    /// Drop the partial upload
    pub async fn abort(self) -> Result<()> {
        self.inner.abort().await?;
        Ok(())
    }
}
