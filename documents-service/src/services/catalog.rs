//! Metadata catalog: the source of truth for whether a document exists.

use crate::models::{Document, DocumentState};
use crate::services::database::MongoDb;
use crate::services::error::DocumentError;
use async_trait::async_trait;
use futures::stream::TryStreamExt;
use mongodb::bson::{doc, to_bson};
use mongodb::options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

#[async_trait]
pub trait MetadataCatalog: Send + Sync {
    async fn insert(&self, document: &Document) -> Result<(), DocumentError>;

    /// Returns the record in any state; callers decide what `Deleted` means.
    async fn get_by_id(&self, id: &str) -> Result<Option<Document>, DocumentError>;

    /// Active documents only, most recently uploaded first.
    async fn list_by_patient(&self, patient_id: &str) -> Result<Vec<Document>, DocumentError>;

    /// Flip an active record to `Deleted` in one conditional update.
    ///
    /// Fails with [`DocumentError::NotFound`] when the record is absent or
    /// already deleted, so concurrent callers see exactly one success.
    async fn mark_deleted(&self, id: &str) -> Result<Document, DocumentError>;

    async fn health_check(&self) -> Result<(), DocumentError>;
}

#[derive(Clone)]
pub struct MongoCatalog {
    db: MongoDb,
}

impl MongoCatalog {
    pub fn new(db: MongoDb) -> Self {
        Self { db }
    }

    fn state_bson(state: DocumentState) -> Result<mongodb::bson::Bson, anyhow::Error> {
        to_bson(&state).map_err(|e| anyhow::anyhow!("Failed to serialize state: {}", e))
    }
}

#[async_trait]
impl MetadataCatalog for MongoCatalog {
    async fn insert(&self, document: &Document) -> Result<(), DocumentError> {
        self.db
            .documents()
            .insert_one(document, None)
            .await
            .map_err(|e| DocumentError::CatalogWrite(e.into()))?;
        Ok(())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Document>, DocumentError> {
        self.db
            .documents()
            .find_one(doc! { "_id": id }, None)
            .await
            .map_err(|e| DocumentError::CatalogRead(e.into()))
    }

    async fn list_by_patient(&self, patient_id: &str) -> Result<Vec<Document>, DocumentError> {
        let active = Self::state_bson(DocumentState::Active).map_err(DocumentError::CatalogRead)?;
        let find_options = FindOptions::builder()
            .sort(doc! { "uploaded_at": -1, "_id": -1 }) // Newest first
            .build();

        let mut cursor = self
            .db
            .documents()
            .find(doc! { "patient_id": patient_id, "state": active }, find_options)
            .await
            .map_err(|e| DocumentError::CatalogRead(e.into()))?;

        let mut documents = Vec::new();
        while let Some(document) = cursor
            .try_next()
            .await
            .map_err(|e| DocumentError::CatalogRead(e.into()))?
        {
            documents.push(document);
        }
        Ok(documents)
    }

    async fn mark_deleted(&self, id: &str) -> Result<Document, DocumentError> {
        let active =
            Self::state_bson(DocumentState::Active).map_err(DocumentError::CatalogWrite)?;
        let deleted =
            Self::state_bson(DocumentState::Deleted).map_err(DocumentError::CatalogWrite)?;
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();

        self.db
            .documents()
            .find_one_and_update(
                doc! { "_id": id, "state": active },
                doc! { "$set": { "state": deleted, "deleted_at": mongodb::bson::DateTime::now() } },
                options,
            )
            .await
            .map_err(|e| DocumentError::CatalogWrite(e.into()))?
            .ok_or_else(|| DocumentError::NotFound(id.to_string()))
    }

    async fn health_check(&self) -> Result<(), DocumentError> {
        self.db
            .health_check()
            .await
            .map_err(|e| DocumentError::CatalogRead(anyhow::anyhow!(e.to_string())))
    }
}

/// Catalog held in process memory, with switchable insert failures.
#[derive(Default)]
pub struct InMemoryCatalog {
    records: Mutex<HashMap<String, Document>>,
    fail_inserts: AtomicBool,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Document>>, anyhow::Error> {
        self.records
            .lock()
            .map_err(|e| anyhow::anyhow!("In-memory catalog mutex poisoned: {}", e))
    }
}

#[async_trait]
impl MetadataCatalog for InMemoryCatalog {
    async fn insert(&self, document: &Document) -> Result<(), DocumentError> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(DocumentError::CatalogWrite(anyhow::anyhow!(
                "Injected insert failure for {}",
                document.id
            )));
        }
        let mut records = self.lock().map_err(DocumentError::CatalogWrite)?;
        if records.contains_key(&document.id)
            || records
                .values()
                .any(|d| d.storage_key == document.storage_key)
        {
            return Err(DocumentError::CatalogWrite(anyhow::anyhow!(
                "Duplicate key for document {}",
                document.id
            )));
        }
        records.insert(document.id.clone(), document.clone());
        Ok(())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Document>, DocumentError> {
        Ok(self
            .lock()
            .map_err(DocumentError::CatalogRead)?
            .get(id)
            .cloned())
    }

    async fn list_by_patient(&self, patient_id: &str) -> Result<Vec<Document>, DocumentError> {
        let mut documents: Vec<Document> = self
            .lock()
            .map_err(DocumentError::CatalogRead)?
            .values()
            .filter(|d| d.patient_id == patient_id && d.is_active())
            .cloned()
            .collect();
        documents.sort_by(|a, b| {
            b.uploaded_at
                .cmp(&a.uploaded_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(documents)
    }

    async fn mark_deleted(&self, id: &str) -> Result<Document, DocumentError> {
        let mut records = self.lock().map_err(DocumentError::CatalogWrite)?;
        match records.get_mut(id) {
            Some(document) if document.is_active() => {
                document.state = DocumentState::Deleted;
                document.deleted_at = Some(mongodb::bson::DateTime::now());
                Ok(document.clone())
            }
            _ => Err(DocumentError::NotFound(id.to_string())),
        }
    }

    async fn health_check(&self) -> Result<(), DocumentError> {
        Ok(())
    }
}
