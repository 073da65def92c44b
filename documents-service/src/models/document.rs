use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a catalog entry. `Deleted` is terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DocumentState {
    Active,
    Deleted,
}

/// Catalog record for one stored clinical document.
///
/// `storage_key` addresses the content in the blob store and is never sent
/// to clients; see [`crate::dtos::DocumentResponse`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    #[serde(rename = "_id")]
    pub id: String,
    pub patient_id: String,
    pub medical_record_id: Option<String>,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub storage_key: String,
    pub state: DocumentState,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub uploaded_at: DateTime<Utc>,
    pub deleted_at: Option<mongodb::bson::DateTime>,
}

impl Document {
    pub fn new(
        id: String,
        patient_id: String,
        medical_record_id: Option<String>,
        file_name: String,
        content_type: String,
        size_bytes: i64,
        storage_key: String,
    ) -> Self {
        Self {
            id,
            patient_id,
            medical_record_id,
            file_name,
            content_type,
            size_bytes,
            storage_key,
            state: DocumentState::Active,
            // BSON dates hold milliseconds; stored and returned values must agree.
            uploaded_at: Utc::now().trunc_subsecs(3),
            deleted_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.state == DocumentState::Active
    }
}
