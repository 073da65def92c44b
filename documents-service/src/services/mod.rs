pub mod catalog;
pub mod database;
pub mod documents;
pub mod error;
pub mod metrics;
pub mod storage;

pub use catalog::{InMemoryCatalog, MetadataCatalog, MongoCatalog};
pub use database::MongoDb;
pub use documents::{DocumentContent, DocumentService, NewDocument};
pub use error::DocumentError;
pub use metrics::{get_metrics, init_metrics};
pub use storage::{BlobStore, InMemoryStorage, LocalStorage, S3Storage};
