use crate::dtos::{DeleteDocumentResponse, DocumentListParams, DocumentResponse};
use crate::services::{DocumentError, NewDocument};
use crate::startup::AppState;
use axum::{
    body::Body,
    extract::{
        multipart::{Field, MultipartError},
        Multipart, Path, Query, State,
    },
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::IntoResponse,
    Json,
};
use bytes::{Bytes, BytesMut};
use service_core::error::AppError;

pub const DOCUMENT_ID_HEADER: &str = "x-document-id";
pub const PATIENT_ID_HEADER: &str = "x-patient-id";
pub const MEDICAL_RECORD_ID_HEADER: &str = "x-medical-record-id";
pub const UPLOADED_AT_HEADER: &str = "x-uploaded-at";

pub async fn list_documents(
    State(state): State<AppState>,
    Query(params): Query<DocumentListParams>,
) -> Result<impl IntoResponse, AppError> {
    let patient_id = params.patient_id.unwrap_or_default();

    let documents: Vec<DocumentResponse> = state
        .documents
        .list(&patient_id)
        .await?
        .into_iter()
        .map(DocumentResponse::from)
        .collect();

    Ok(Json(documents))
}

pub async fn upload_document(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let max_size = state.documents.limits().max_size_bytes;

    let mut patient_id = None;
    let mut medical_record_id = None;
    let mut file = None;

    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("patientId") => {
                patient_id = Some(field.text().await.map_err(multipart_error)?);
            }
            Some("medicalRecordId") => {
                medical_record_id = Some(field.text().await.map_err(multipart_error)?);
            }
            Some("file") => {
                let file_name = field.file_name().unwrap_or("unnamed").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let content = read_file_field(&mut field, max_size).await?;
                file = Some((file_name, content_type, content));
            }
            other => {
                tracing::debug!(field = ?other, "Ignoring unknown multipart field");
            }
        }
    }

    let (file_name, content_type, content) =
        file.ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("No file uploaded")))?;

    let document = state
        .documents
        .upload(NewDocument {
            patient_id: patient_id.unwrap_or_default(),
            medical_record_id,
            file_name,
            content_type,
            content,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(DocumentResponse::from(document))))
}

pub async fn get_document(
    State(state): State<AppState>,
    Path(document_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let found = state.documents.get(&document_id).await?;
    let document = found.document;

    let mut headers = HeaderMap::new();
    insert_header(&mut headers, header::CONTENT_TYPE, &document.content_type);
    insert_header(
        &mut headers,
        header::CONTENT_LENGTH,
        &found.content.len().to_string(),
    );
    insert_header(
        &mut headers,
        header::CONTENT_DISPOSITION,
        &format!(
            "inline; filename=\"{}\"",
            disposition_file_name(&document.file_name)
        ),
    );
    insert_header(
        &mut headers,
        HeaderName::from_static(DOCUMENT_ID_HEADER),
        &document.id,
    );
    insert_header(
        &mut headers,
        HeaderName::from_static(PATIENT_ID_HEADER),
        &document.patient_id,
    );
    if let Some(ref medical_record_id) = document.medical_record_id {
        insert_header(
            &mut headers,
            HeaderName::from_static(MEDICAL_RECORD_ID_HEADER),
            medical_record_id,
        );
    }
    insert_header(
        &mut headers,
        HeaderName::from_static(UPLOADED_AT_HEADER),
        &document.uploaded_at.to_rfc3339(),
    );

    Ok((StatusCode::OK, headers, Body::from(found.content)))
}

pub async fn delete_document(
    State(state): State<AppState>,
    Path(document_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    state.documents.delete(&document_id).await?;

    Ok(Json(DeleteDocumentResponse {
        id: document_id,
        deleted: true,
    }))
}

/// Read the file part, stopping as soon as it passes `max_size`.
async fn read_file_field(field: &mut Field<'_>, max_size: usize) -> Result<Bytes, AppError> {
    let mut buffer = BytesMut::new();
    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        let size = buffer.len() + chunk.len();
        if size > max_size {
            return Err(DocumentError::PayloadTooLarge {
                size,
                max: max_size,
            }
            .into());
        }
        buffer.extend_from_slice(&chunk);
    }
    Ok(buffer.freeze())
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(anyhow::anyhow!(err.body_text()))
    } else {
        AppError::BadRequest(anyhow::anyhow!(
            "Failed to read multipart body: {}",
            err.body_text()
        ))
    }
}

fn insert_header(headers: &mut HeaderMap, name: HeaderName, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(value) => {
            headers.insert(name, value);
        }
        Err(_) => tracing::warn!(header = %name, "Skipping header with non-ASCII value"),
    }
}

/// Keep printable ASCII only and drop characters that would end the quoted string.
fn disposition_file_name(file_name: &str) -> String {
    file_name
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii_graphic() || c == ' ' => c,
            _ => '_',
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disposition_file_name_is_header_safe() {
        assert_eq!(disposition_file_name("a.pdf"), "a.pdf");
        assert_eq!(disposition_file_name("say \"hi\".txt"), "say _hi_.txt");
        assert_eq!(disposition_file_name("résumé.pdf"), "r_sum_.pdf");
        assert!(HeaderValue::from_str(&disposition_file_name("line\nbreak")).is_ok());
    }
}
