//! Blob store adapter: opaque keys to bytes, no business rules.
//!
//! Three backends share the [`BlobStore`] trait: a local filesystem store,
//! an S3-compatible store (AWS or MinIO) and an in-memory store used by tests.

use crate::services::error::DocumentError;
use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use bytes::Bytes;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `data` under `key`. On failure nothing is left behind under `key`.
    async fn put(&self, key: &str, data: Bytes) -> Result<(), DocumentError>;

    /// Fails with [`DocumentError::StorageNotFound`] when `key` is absent.
    async fn get(&self, key: &str) -> Result<Bytes, DocumentError>;

    /// Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), DocumentError>;
}

pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub async fn new(base_path: impl Into<PathBuf>) -> Result<Self, DocumentError> {
        let base_path = base_path.into();
        if !base_path.exists() {
            fs::create_dir_all(&base_path).await.map_err(|e| {
                DocumentError::StorageWrite(anyhow::anyhow!(
                    "Failed to create storage directory {}: {}",
                    base_path.display(),
                    e
                ))
            })?;
        }
        Ok(Self { base_path })
    }

    /// Resolve `key` below the base path, rejecting absolute paths and `..`.
    fn path_for(&self, key: &str) -> Result<PathBuf, anyhow::Error> {
        let relative = Path::new(key);
        let is_plain = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !is_plain {
            anyhow::bail!("Invalid storage key: {:?}", key);
        }
        Ok(self.base_path.join(relative))
    }
}

#[async_trait]
impl BlobStore for LocalStorage {
    async fn put(&self, key: &str, data: Bytes) -> Result<(), DocumentError> {
        let path = self.path_for(key).map_err(DocumentError::StorageWrite)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| DocumentError::StorageWrite(e.into()))?;
        }

        // Write to a sibling temp file, then rename into place.
        let temp_path = path.with_extension(format!("partial-{}", Uuid::new_v4().simple()));
        let result = async {
            let mut file = fs::File::create(&temp_path).await?;
            file.write_all(&data).await?;
            file.sync_all().await?;
            fs::rename(&temp_path, &path).await
        }
        .await;

        if let Err(e) = result {
            if let Err(cleanup) = fs::remove_file(&temp_path).await {
                if cleanup.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(
                        temp_path = %temp_path.display(),
                        error = %cleanup,
                        "Failed to remove partial blob"
                    );
                }
            }
            return Err(DocumentError::StorageWrite(anyhow::anyhow!(
                "Failed to write {}: {}",
                key,
                e
            )));
        }

        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes, DocumentError> {
        let path = self.path_for(key).map_err(DocumentError::StorageRead)?;
        match fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(DocumentError::StorageNotFound(key.to_string()))
            }
            Err(e) => Err(DocumentError::StorageRead(e.into())),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), DocumentError> {
        let path = self.path_for(key).map_err(DocumentError::StorageWrite)?;
        match fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(DocumentError::StorageWrite(e.into())),
        }
    }
}

pub struct S3Storage {
    client: S3Client,
    bucket: String,
}

impl S3Storage {
    pub fn new(client: S3Client, bucket: String) -> Self {
        Self { client, bucket }
    }

    /// Build a client from the ambient AWS configuration.
    ///
    /// `endpoint` points the client at an S3-compatible server such as MinIO,
    /// which also requires path-style addressing.
    pub async fn connect(
        bucket: String,
        region: Option<String>,
        endpoint: Option<String>,
    ) -> Result<Self, DocumentError> {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(aws_config::Region::new(region));
        }
        let shared = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(endpoint) = endpoint {
            tracing::info!(endpoint = %endpoint, "Using S3-compatible endpoint");
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        let storage = Self::new(S3Client::from_conf(builder.build()), bucket);
        storage.ensure_bucket().await?;
        Ok(storage)
    }

    /// Create the bucket when it does not exist. Other lookup failures
    /// (credentials, network) are returned as they are.
    async fn ensure_bucket(&self) -> Result<(), DocumentError> {
        match self.client.head_bucket().bucket(&self.bucket).send().await {
            Ok(_) => return Ok(()),
            Err(e) if e.as_service_error().is_some_and(|se| se.is_not_found()) => {}
            Err(e) => {
                return Err(DocumentError::StorageWrite(anyhow::anyhow!(
                    "Failed to look up bucket {}: {}",
                    self.bucket,
                    e
                )));
            }
        }

        tracing::info!(bucket = %self.bucket, "Creating storage bucket");
        self.client
            .create_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| {
                DocumentError::StorageWrite(anyhow::anyhow!(
                    "Failed to create bucket {}: {}",
                    self.bucket,
                    e
                ))
            })?;
        Ok(())
    }
}

#[async_trait]
impl BlobStore for S3Storage {
    async fn put(&self, key: &str, data: Bytes) -> Result<(), DocumentError> {
        // A single PUT is atomic on S3: a failed upload never becomes visible.
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| DocumentError::StorageWrite(anyhow::anyhow!("S3 upload failed: {}", e)))?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes, DocumentError> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|se| se.is_no_such_key()) {
                    DocumentError::StorageNotFound(key.to_string())
                } else {
                    DocumentError::StorageRead(anyhow::anyhow!("S3 download failed: {}", e))
                }
            })?;

        let data = output
            .body
            .collect()
            .await
            .map_err(|e| {
                DocumentError::StorageRead(anyhow::anyhow!("S3 body collection failed: {}", e))
            })?
            .into_bytes();

        Ok(data)
    }

    async fn delete(&self, key: &str) -> Result<(), DocumentError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| DocumentError::StorageWrite(anyhow::anyhow!("S3 delete failed: {}", e)))?;
        Ok(())
    }
}

/// Blob store held in process memory, with switchable write failures.
#[derive(Default)]
pub struct InMemoryStorage {
    blobs: Mutex<HashMap<String, Bytes>>,
    fail_writes: AtomicBool,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.blobs.lock().map(|b| b.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &str) -> bool {
        self.blobs
            .lock()
            .map(|b| b.contains_key(key))
            .unwrap_or_default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Bytes>>, anyhow::Error> {
        self.blobs
            .lock()
            .map_err(|e| anyhow::anyhow!("In-memory storage mutex poisoned: {}", e))
    }
}

#[async_trait]
impl BlobStore for InMemoryStorage {
    async fn put(&self, key: &str, data: Bytes) -> Result<(), DocumentError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(DocumentError::StorageWrite(anyhow::anyhow!(
                "Injected write failure for {}",
                key
            )));
        }
        self.lock()
            .map_err(DocumentError::StorageWrite)?
            .insert(key.to_string(), data);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes, DocumentError> {
        self.lock()
            .map_err(DocumentError::StorageRead)?
            .get(key)
            .cloned()
            .ok_or_else(|| DocumentError::StorageNotFound(key.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<(), DocumentError> {
        self.lock().map_err(DocumentError::StorageWrite)?.remove(key);
        Ok(())
    }
}
