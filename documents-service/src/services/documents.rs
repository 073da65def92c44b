//! Document service: validation, two-phase upload, reads and soft delete.
//!
//! Uploads write the blob first and the catalog record second. The catalog
//! is the source of truth for existence, so the blob store may briefly hold
//! orphans (blob written, insert failed) but a catalog entry never points at
//! content that was not fully written.

use crate::config::UploadConfig;
use crate::models::Document;
use crate::services::catalog::MetadataCatalog;
use crate::services::error::DocumentError;
use crate::services::metrics::{
    DOCUMENTS_DELETED, DOCUMENTS_UPLOADED, DOCUMENT_UPLOAD_BYTES, INTEGRITY_ERRORS, ORPHANED_BLOBS,
};
use crate::services::storage::BlobStore;
use bytes::Bytes;
use metrics::{counter, histogram};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

/// Input for [`DocumentService::upload`].
#[derive(Debug, Clone, Validate)]
pub struct NewDocument {
    #[validate(length(max = 128, message = "must be at most 128 characters"))]
    pub patient_id: String,
    #[validate(length(max = 128, message = "must be at most 128 characters"))]
    pub medical_record_id: Option<String>,
    #[validate(length(min = 1, max = 255, message = "must be 1 to 255 characters"))]
    pub file_name: String,
    pub content_type: String,
    pub content: Bytes,
}

/// Metadata joined with the stored content.
#[derive(Debug, Clone)]
pub struct DocumentContent {
    pub document: Document,
    pub content: Bytes,
}

#[derive(Clone)]
pub struct DocumentService {
    limits: Arc<UploadConfig>,
    blobs: Arc<dyn BlobStore>,
    catalog: Arc<dyn MetadataCatalog>,
}

impl DocumentService {
    pub fn new(
        limits: UploadConfig,
        blobs: Arc<dyn BlobStore>,
        catalog: Arc<dyn MetadataCatalog>,
    ) -> Self {
        Self {
            limits: Arc::new(limits),
            blobs,
            catalog,
        }
    }

    pub fn limits(&self) -> &UploadConfig {
        &self.limits
    }

    pub fn catalog(&self) -> &Arc<dyn MetadataCatalog> {
        &self.catalog
    }

    pub async fn upload(&self, new: NewDocument) -> Result<Document, DocumentError> {
        let new = self.validate(new)?;

        let id = Uuid::new_v4().to_string();
        let storage_key = storage_key_for(&id, &new.file_name);
        let size = new.content.len();
        let document = Document::new(
            id,
            new.patient_id,
            new.medical_record_id,
            new.file_name,
            new.content_type,
            size as i64,
            storage_key,
        );

        tracing::info!(
            document_id = %document.id,
            patient_id = %document.patient_id,
            content_type = %document.content_type,
            size = size,
            "Document upload started"
        );

        // The write runs on its own task so a dropped request cannot stop it
        // between the blob write and the catalog insert.
        let blobs = Arc::clone(&self.blobs);
        let catalog = Arc::clone(&self.catalog);
        let content = new.content;
        let document_id = document.id.clone();
        let storage_key = document.storage_key.clone();
        let document = tokio::spawn(async move {
            write_then_insert(blobs.as_ref(), catalog.as_ref(), document, content).await
        })
        .await
        .map_err(|e| {
            // The blob may already be written with no catalog entry.
            counter!(ORPHANED_BLOBS).increment(1);
            tracing::error!(
                document_id = %document_id,
                orphaned_storage_key = %storage_key,
                error = %e,
                "Upload task aborted; blob may be left for reconciliation"
            );
            DocumentError::CatalogWrite(anyhow::anyhow!("Upload task aborted: {}", e))
        })??;

        counter!(DOCUMENTS_UPLOADED).increment(1);
        histogram!(DOCUMENT_UPLOAD_BYTES).record(size as f64);

        tracing::info!(
            document_id = %document.id,
            "Document upload completed successfully"
        );

        Ok(document)
    }

    pub async fn get(&self, document_id: &str) -> Result<DocumentContent, DocumentError> {
        let document = self
            .catalog
            .get_by_id(document_id)
            .await?
            .filter(Document::is_active)
            .ok_or_else(|| DocumentError::NotFound(document_id.to_string()))?;

        let content = match self.blobs.get(&document.storage_key).await {
            Ok(content) => content,
            Err(DocumentError::StorageNotFound(_)) => {
                return Err(integrity_violation(&document, "blob missing from storage"));
            }
            Err(e) => {
                tracing::error!(
                    document_id = %document.id,
                    storage_key = %document.storage_key,
                    error = %e,
                    "Failed to read document content"
                );
                return Err(e);
            }
        };

        if content.len() as i64 != document.size_bytes {
            return Err(integrity_violation(&document, "stored size differs from catalog"));
        }

        tracing::info!(
            document_id = %document.id,
            size = content.len(),
            "Document retrieved"
        );

        Ok(DocumentContent { document, content })
    }

    pub async fn list(&self, patient_id: &str) -> Result<Vec<Document>, DocumentError> {
        let patient_id = patient_id.trim();
        if patient_id.is_empty() {
            return Err(DocumentError::Validation("patient_id is required".to_string()));
        }
        self.catalog.list_by_patient(patient_id).await
    }

    /// Soft delete. The blob stays until the reclamation sweep removes it.
    pub async fn delete(&self, document_id: &str) -> Result<(), DocumentError> {
        let document = self.catalog.mark_deleted(document_id).await?;

        counter!(DOCUMENTS_DELETED).increment(1);
        tracing::info!(
            document_id = %document.id,
            storage_key = %document.storage_key,
            "Document marked deleted; blob pending reclamation"
        );
        Ok(())
    }

    /// Reject bad input before any I/O and normalise identifiers.
    fn validate(&self, mut new: NewDocument) -> Result<NewDocument, DocumentError> {
        new.patient_id = new.patient_id.trim().to_string();
        new.medical_record_id = new
            .medical_record_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty());
        new.file_name = new.file_name.trim().to_string();

        if new.patient_id.is_empty() {
            return Err(DocumentError::Validation("patient_id is required".to_string()));
        }
        new.validate()?;

        if !self.limits.allows(&new.content_type) {
            return Err(DocumentError::Validation(format!(
                "Content type {:?} is not allowed",
                new.content_type
            )));
        }
        if new.content.is_empty() {
            return Err(DocumentError::Validation("Document content is empty".to_string()));
        }
        if new.content.len() > self.limits.max_size_bytes {
            return Err(DocumentError::PayloadTooLarge {
                size: new.content.len(),
                max: self.limits.max_size_bytes,
            });
        }
        Ok(new)
    }
}

async fn write_then_insert(
    blobs: &dyn BlobStore,
    catalog: &dyn MetadataCatalog,
    document: Document,
    content: Bytes,
) -> Result<Document, DocumentError> {
    // 1. Blob first. A failed put leaves nothing behind and no metadata.
    blobs
        .put(&document.storage_key, content)
        .await
        .map_err(|e| {
            tracing::error!(
                document_id = %document.id,
                storage_key = %document.storage_key,
                error = %e,
                "Failed to write document content"
            );
            e
        })?;

    // 2. Metadata. On failure the blob is left for the reconciliation sweep.
    if let Err(e) = catalog.insert(&document).await {
        counter!(ORPHANED_BLOBS).increment(1);
        tracing::error!(
            document_id = %document.id,
            orphaned_storage_key = %document.storage_key,
            error = %e,
            "Failed to insert document metadata; blob left for reconciliation"
        );
        return Err(e);
    }

    Ok(document)
}

fn integrity_violation(document: &Document, reason: &str) -> DocumentError {
    counter!(INTEGRITY_ERRORS).increment(1);
    tracing::error!(
        document_id = %document.id,
        storage_key = %document.storage_key,
        reason = reason,
        integrity_violation = true,
        "Catalog and blob store disagree; operator attention required"
    );
    DocumentError::Integrity {
        document_id: document.id.clone(),
    }
}

/// `<document id>/<random>.<ext>`: unique per upload and never reused.
fn storage_key_for(document_id: &str, file_name: &str) -> String {
    let extension = std::path::Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| ext.len() <= 10 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_else(|| "bin".to_string());

    format!("{}/{}.{}", document_id, Uuid::new_v4().simple(), extension)
}
