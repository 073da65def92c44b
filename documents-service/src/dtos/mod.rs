pub mod documents;

pub use documents::{DeleteDocumentResponse, DocumentListParams, DocumentResponse};
