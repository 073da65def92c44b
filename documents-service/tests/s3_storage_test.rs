//! Blob store tests against a live S3-compatible server (`STORAGE_S3_ENDPOINT`,
//! default a local MinIO on port 9000 with its stock credentials).
//!
//! Run with `cargo test -- --ignored` when MinIO is available.

use bytes::Bytes;
use documents_service::services::{BlobStore, DocumentError, S3Storage};
use std::sync::Once;
use uuid::Uuid;

static ENV: Once = Once::new();

async fn connect(bucket: &str) -> S3Storage {
    ENV.call_once(|| {
        dotenvy::dotenv().ok();
        for (key, default) in [
            ("AWS_ACCESS_KEY_ID", "minioadmin"),
            ("AWS_SECRET_ACCESS_KEY", "minioadmin"),
        ] {
            if std::env::var(key).is_err() {
                std::env::set_var(key, default);
            }
        }
    });

    let endpoint = std::env::var("STORAGE_S3_ENDPOINT")
        .unwrap_or_else(|_| "http://localhost:9000".to_string());
    let region = std::env::var("STORAGE_S3_REGION").unwrap_or_else(|_| "us-east-1".to_string());

    S3Storage::connect(bucket.to_string(), Some(region), Some(endpoint))
        .await
        .expect("Failed to connect to S3 endpoint")
}

fn test_bucket() -> String {
    format!("documents-test-{}", Uuid::new_v4().simple())
}

#[tokio::test]
#[ignore = "requires a running MinIO"]
async fn connect_creates_missing_bucket_once() {
    let bucket = test_bucket();

    // First connect creates the bucket, the second finds it.
    connect(&bucket).await;
    let storage = connect(&bucket).await;

    storage
        .put("doc-1/key.txt", Bytes::from_static(b"hello"))
        .await
        .unwrap();
    storage.delete("doc-1/key.txt").await.unwrap();
}

#[tokio::test]
#[ignore = "requires a running MinIO"]
async fn put_get_delete_round_trip() {
    let storage = connect(&test_bucket()).await;
    let content = Bytes::from(vec![0x25, 0x50, 0x44, 0x46, 0x00, 0xff]);

    storage.put("doc-2/key.pdf", content.clone()).await.unwrap();
    assert_eq!(storage.get("doc-2/key.pdf").await.unwrap(), content);

    storage.delete("doc-2/key.pdf").await.unwrap();
    assert!(matches!(
        storage.get("doc-2/key.pdf").await,
        Err(DocumentError::StorageNotFound(_))
    ));
}

#[tokio::test]
#[ignore = "requires a running MinIO"]
async fn missing_key_is_storage_not_found() {
    let storage = connect(&test_bucket()).await;

    match storage.get("never/written.bin").await {
        Err(DocumentError::StorageNotFound(key)) => assert_eq!(key, "never/written.bin"),
        other => panic!("expected StorageNotFound, got {:?}", other.map(|b| b.len())),
    }

    // Deleting an absent key is not an error.
    storage.delete("never/written.bin").await.unwrap();
}
