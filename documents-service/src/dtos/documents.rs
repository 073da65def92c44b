use crate::models::{Document, DocumentState};
use serde::{Deserialize, Serialize};

/// Client-facing document metadata. The storage key is deliberately absent.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DocumentResponse {
    pub id: String,
    pub patient_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub medical_record_id: Option<String>,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub uploaded_at: String,
    pub state: DocumentState,
}

impl From<Document> for DocumentResponse {
    fn from(doc: Document) -> Self {
        Self {
            id: doc.id,
            patient_id: doc.patient_id,
            medical_record_id: doc.medical_record_id,
            file_name: doc.file_name,
            content_type: doc.content_type,
            size_bytes: doc.size_bytes,
            uploaded_at: doc.uploaded_at.to_rfc3339(),
            state: doc.state,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentListParams {
    pub patient_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteDocumentResponse {
    pub id: String,
    pub deleted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_hides_storage_key() {
        let doc = Document::new(
            "doc-1".to_string(),
            "p1".to_string(),
            None,
            "a.pdf".to_string(),
            "application/pdf".to_string(),
            10,
            "doc-1/secret.pdf".to_string(),
        );

        let json = serde_json::to_value(DocumentResponse::from(doc)).unwrap();
        assert_eq!(json["patientId"], "p1");
        assert_eq!(json["sizeBytes"], 10);
        assert_eq!(json["state"], "active");
        assert!(json.get("storageKey").is_none());
        assert!(json.get("medicalRecordId").is_none());
        assert!(!json.to_string().contains("secret"));
    }
}
