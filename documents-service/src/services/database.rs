use crate::models::Document;
use mongodb::{
    bson::doc, options::IndexOptions, Client as MongoClient, Collection, Database, IndexModel,
};
use service_core::error::AppError;

#[derive(Clone)]
pub struct MongoDb {
    client: MongoClient,
    db: Database,
}

impl MongoDb {
    pub async fn connect(uri: &str, database: &str) -> Result<Self, AppError> {
        tracing::info!("Connecting to MongoDB");
        let client = MongoClient::with_uri_str(uri).await.map_err(|e| {
            tracing::error!("Failed to connect to MongoDB: {}", e);
            AppError::from(e)
        })?;
        let db = client.database(database);
        tracing::info!(database = %database, "Successfully connected to MongoDB database");
        Ok(Self { client, db })
    }

    pub async fn initialize_indexes(&self) -> Result<(), AppError> {
        tracing::info!("Creating MongoDB indexes for documents-service");

        let documents = self.documents();

        // Listing: active documents of one patient, newest first
        let patient_index = IndexModel::builder()
            .keys(doc! { "patient_id": 1, "state": 1, "uploaded_at": -1 })
            .options(
                IndexOptions::builder()
                    .name("patient_state_uploaded".to_string())
                    .build(),
            )
            .build();

        documents
            .create_index(patient_index, None)
            .await
            .map_err(|e| {
                tracing::error!(
                    "Failed to create patient index on documents collection: {}",
                    e
                );
                AppError::from(e)
            })?;
        tracing::info!("Created index on documents.(patient_id, state, uploaded_at)");

        // Two catalog entries must never share a blob
        let storage_key_index = IndexModel::builder()
            .keys(doc! { "storage_key": 1 })
            .options(
                IndexOptions::builder()
                    .name("storage_key_unique".to_string())
                    .unique(true)
                    .build(),
            )
            .build();

        documents
            .create_index(storage_key_index, None)
            .await
            .map_err(|e| {
                tracing::error!(
                    "Failed to create storage_key index on documents collection: {}",
                    e
                );
                AppError::from(e)
            })?;
        tracing::info!("Created unique index on documents.storage_key");

        Ok(())
    }

    pub async fn health_check(&self) -> Result<(), AppError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| {
                tracing::error!("MongoDB health check failed: {}", e);
                AppError::from(e)
            })?;
        Ok(())
    }

    pub fn documents(&self) -> Collection<Document> {
        self.db.collection("documents")
    }

    pub fn client(&self) -> &MongoClient {
        &self.client
    }
}
