//! Catalog tests against a live MongoDB (`MONGODB_URI`, default localhost).
//!
//! Run with `cargo test -- --ignored` when a MongoDB instance is available.

use documents_service::models::{Document, DocumentState};
use documents_service::services::{DocumentError, MetadataCatalog, MongoCatalog, MongoDb};
use std::sync::Arc;
use uuid::Uuid;

async fn setup() -> (MongoCatalog, MongoDb, String) {
    dotenvy::dotenv().ok();
    let uri =
        std::env::var("MONGODB_URI").unwrap_or_else(|_| "mongodb://localhost:27017".to_string());
    let db_name = format!("test_documents_catalog_{}", Uuid::new_v4());

    let db = MongoDb::connect(&uri, &db_name)
        .await
        .expect("Failed to connect to MongoDB");
    db.initialize_indexes()
        .await
        .expect("Failed to create indexes");

    (MongoCatalog::new(db.clone()), db, db_name)
}

async fn teardown(db: &MongoDb, db_name: &str) {
    let _ = db.client().database(db_name).drop(None).await;
}

fn record(patient_id: &str) -> Document {
    let id = Uuid::new_v4().to_string();
    let storage_key = format!("{}/{}.pdf", id, Uuid::new_v4().simple());
    Document::new(
        id,
        patient_id.to_string(),
        None,
        "a.pdf".to_string(),
        "application/pdf".to_string(),
        10,
        storage_key,
    )
}

#[tokio::test]
#[ignore = "requires a running MongoDB"]
async fn insert_get_and_list() {
    let (catalog, db, db_name) = setup().await;

    let older = record("p1");
    catalog.insert(&older).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let newer = record("p1");
    catalog.insert(&newer).await.unwrap();
    catalog.insert(&record("p2")).await.unwrap();

    let fetched = catalog.get_by_id(&older.id).await.unwrap().unwrap();
    assert_eq!(fetched, older);
    assert_eq!(fetched.state, DocumentState::Active);

    let listed = catalog.list_by_patient("p1").await.unwrap();
    assert_eq!(listed, vec![newer.clone(), older.clone()]);

    teardown(&db, &db_name).await;
}

#[tokio::test]
#[ignore = "requires a running MongoDB"]
async fn duplicate_storage_key_is_rejected() {
    let (catalog, db, db_name) = setup().await;

    let first = record("p1");
    catalog.insert(&first).await.unwrap();

    let mut clash = record("p1");
    clash.storage_key = first.storage_key.clone();
    assert!(matches!(
        catalog.insert(&clash).await,
        Err(DocumentError::CatalogWrite(_))
    ));

    teardown(&db, &db_name).await;
}

#[tokio::test]
#[ignore = "requires a running MongoDB"]
async fn concurrent_mark_deleted_has_one_winner() {
    let (catalog, db, db_name) = setup().await;
    let catalog = Arc::new(catalog);

    let doc = record("p1");
    catalog.insert(&doc).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..10 {
        let catalog = catalog.clone();
        let id = doc.id.clone();
        handles.push(tokio::spawn(async move { catalog.mark_deleted(&id).await }));
    }

    let mut successes = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(deleted) => {
                assert_eq!(deleted.state, DocumentState::Deleted);
                successes += 1;
            }
            Err(DocumentError::NotFound(_)) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(successes, 1);
    assert!(catalog.list_by_patient("p1").await.unwrap().is_empty());

    teardown(&db, &db_name).await;
}
