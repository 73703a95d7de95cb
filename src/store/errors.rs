//! Storage collaborator error types.

use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Document not found
    #[error("Document not found: {collection}/{id}")]
    NotFound { collection: String, id: String },

    /// A batch precondition did not hold at commit time
    #[error("Precondition failed on {collection}/{id}: {detail}")]
    PreconditionFailed {
        collection: String,
        id: String,
        detail: String,
    },

    /// Atomic batch could not be applied; no effects were committed
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Value could not be stored as a JSON object document
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Result type for storage operations
pub type StoreResult<T> = Result<T, StoreError>;
