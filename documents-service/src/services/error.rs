use service_core::error::AppError;
use thiserror::Error;

/// Failures raised by the blob store, the catalog and the document service.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("{0}")]
    Validation(String),

    #[error("Document exceeds the maximum size of {max} bytes")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("Document {0} not found")]
    NotFound(String),

    #[error("Blob {0} not found in storage")]
    StorageNotFound(String),

    #[error("Failed to write blob to storage: {0}")]
    StorageWrite(#[source] anyhow::Error),

    #[error("Failed to read blob from storage: {0}")]
    StorageRead(#[source] anyhow::Error),

    #[error("Failed to write document metadata: {0}")]
    CatalogWrite(#[source] anyhow::Error),

    #[error("Failed to read document metadata: {0}")]
    CatalogRead(#[source] anyhow::Error),

    #[error("Document {document_id} metadata and stored content are inconsistent")]
    Integrity { document_id: String },
}

impl From<validator::ValidationErrors> for DocumentError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<String> = errors
            .field_errors()
            .iter()
            .map(|(field, errs)| {
                let reason = errs
                    .iter()
                    .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
                    .next()
                    .unwrap_or_else(|| "is invalid".to_string());
                format!("{} {}", field, reason)
            })
            .collect();
        fields.sort();
        DocumentError::Validation(fields.join("; "))
    }
}

impl From<DocumentError> for AppError {
    fn from(err: DocumentError) -> Self {
        match err {
            DocumentError::Validation(msg) => AppError::BadRequest(anyhow::anyhow!(msg)),
            e @ DocumentError::PayloadTooLarge { .. } => {
                AppError::PayloadTooLarge(anyhow::anyhow!(e.to_string()))
            }
            e @ DocumentError::NotFound(_) => AppError::NotFound(anyhow::anyhow!(e.to_string())),
            e @ (DocumentError::StorageWrite(_)
            | DocumentError::StorageRead(_)
            | DocumentError::StorageNotFound(_)) => AppError::BadGateway(e.to_string()),
            DocumentError::CatalogWrite(e) | DocumentError::CatalogRead(e) => {
                AppError::DatabaseError(e)
            }
            e @ DocumentError::Integrity { .. } => {
                AppError::IntegrityError(anyhow::anyhow!(e.to_string()))
            }
        }
    }
}
