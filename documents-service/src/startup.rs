use crate::config::{DocumentConfig, StorageBackend};
use crate::handlers;
use crate::services::{
    BlobStore, DocumentService, LocalStorage, MetadataCatalog, MongoCatalog, MongoDb, S3Storage,
};
use axum::{
    extract::DefaultBodyLimit,
    middleware::from_fn,
    routing::get,
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    metrics::metrics_middleware,
    tracing::{request_id_middleware, REQUEST_ID_HEADER},
};
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;

/// Room for multipart boundaries and the text fields around the file part.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub documents: DocumentService,
}

pub fn build_router(state: AppState) -> Router {
    let body_limit = state
        .documents
        .limits()
        .max_size_bytes
        .saturating_add(MULTIPART_OVERHEAD_BYTES);

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_endpoint))
        .route(
            "/documents",
            get(handlers::list_documents).post(handlers::upload_document),
        )
        .route(
            "/documents/:document_id",
            get(handlers::get_document).delete(handlers::delete_document),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(from_fn(metrics_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}

pub async fn build_blob_store(config: &DocumentConfig) -> Result<Arc<dyn BlobStore>, AppError> {
    let storage: Arc<dyn BlobStore> = match config.storage.backend {
        StorageBackend::Local => Arc::new(
            LocalStorage::new(&config.storage.local_path)
                .await
                .map_err(|e| {
                    tracing::error!(
                        "Failed to initialize local storage at {}: {}",
                        config.storage.local_path,
                        e
                    );
                    AppError::from(e)
                })?,
        ),
        StorageBackend::S3 => Arc::new(
            S3Storage::connect(
                config.storage.s3_bucket.clone(),
                config.storage.s3_region.clone(),
                config.storage.s3_endpoint.clone(),
            )
            .await
            .map_err(|e| {
                tracing::error!(
                    "Failed to initialize S3 storage for bucket {}: {}",
                    config.storage.s3_bucket,
                    e
                );
                AppError::from(e)
            })?,
        ),
    };
    Ok(storage)
}

type ServerFuture = Pin<Box<dyn Future<Output = std::io::Result<()>> + Send>>;

pub struct Application {
    port: u16,
    server: ServerFuture,
}

impl Application {
    pub async fn build(config: DocumentConfig) -> Result<Self, AppError> {
        let db = MongoDb::connect(&config.mongodb.uri, &config.mongodb.database)
            .await
            .map_err(|e| {
                tracing::error!("Failed to connect to MongoDB: {}", e);
                e
            })?;
        db.initialize_indexes().await.map_err(|e| {
            tracing::error!("Failed to initialize database indexes: {}", e);
            e
        })?;

        let blobs = build_blob_store(&config).await?;
        let catalog: Arc<dyn MetadataCatalog> = Arc::new(MongoCatalog::new(db));
        let documents = DocumentService::new(config.upload.clone(), blobs, catalog);

        let app = build_router(AppState { documents });

        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(
            port = port,
            max_upload_bytes = config.upload.max_size_bytes,
            storage_backend = ?config.storage.backend,
            "Listening"
        );

        let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal());

        Ok(Self {
            port,
            server: Box::pin(async move { server.await }),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        self.server.await
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
