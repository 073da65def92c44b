#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use documents_service::config::UploadConfig;
use documents_service::services::{DocumentService, InMemoryCatalog, InMemoryStorage};
use documents_service::startup::{build_router, AppState};
use std::sync::Arc;
use tower::util::ServiceExt;

pub const BOUNDARY: &str = "----documents-test-boundary";
pub const TEST_MAX_SIZE: usize = 64;

/// Router wired to in-memory backends so tests can inspect both stores.
pub struct TestApp {
    pub router: Router,
    pub blobs: Arc<InMemoryStorage>,
    pub catalog: Arc<InMemoryCatalog>,
}

impl TestApp {
    pub fn spawn() -> Self {
        Self::with_limits(UploadConfig {
            max_size_bytes: TEST_MAX_SIZE,
            ..UploadConfig::default()
        })
    }

    pub fn with_limits(limits: UploadConfig) -> Self {
        let blobs = Arc::new(InMemoryStorage::new());
        let catalog = Arc::new(InMemoryCatalog::new());
        let documents = DocumentService::new(limits, blobs.clone(), catalog.clone());
        let router = build_router(AppState { documents });

        TestApp {
            router,
            blobs,
            catalog,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to execute request")
    }

    pub async fn get(&self, uri: &str) -> Response {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn delete(&self, uri: &str) -> Response {
        self.send(
            Request::builder()
                .method("DELETE")
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    pub async fn upload(&self, form: MultipartForm) -> Response {
        self.send(
            Request::builder()
                .method("POST")
                .uri("/documents")
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={}", BOUNDARY),
                )
                .body(Body::from(form.into_body()))
                .unwrap(),
        )
        .await
    }

    /// Upload and return the created document's JSON, asserting `201`.
    pub async fn upload_ok(&self, form: MultipartForm) -> serde_json::Value {
        let response = self.upload(form).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        body_json(response).await
    }
}

/// Hand-built `multipart/form-data` body.
#[derive(Default)]
pub struct MultipartForm {
    body: Vec<u8>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, file_name: &str, content_type: &str, data: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                BOUNDARY, file_name, content_type
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(data);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn into_body(mut self) -> Vec<u8> {
        self.body
            .extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        self.body
    }
}

pub fn pdf_form(patient_id: &str, data: &[u8]) -> MultipartForm {
    MultipartForm::new()
        .text("patientId", patient_id)
        .file("a.pdf", "application/pdf", data)
}

pub async fn body_bytes(response: Response) -> axum::body::Bytes {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body")
}

pub async fn body_json(response: Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).expect("Failed to parse JSON")
}
