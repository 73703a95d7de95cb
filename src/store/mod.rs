//! Storage collaborator abstraction.
//!
//! The engine never talks to a concrete database directly. Every component
//! receives a [`DocumentStore`] handle (dependency injection, no process-wide
//! connection state) offering document reads, writes, and atomic
//! [`WriteBatch`] commits over a hierarchical collection layout:
//!
//! ```text
//! tournaments/{id}
//! tournaments/{id}/players/{id}
//! tournaments/{id}/tables/{id}
//! tournaments/{id}/rounds/{id}
//! tournaments/{id}/rounds/{id}/participants/{id}
//! ```
//!
//! Two backends are provided: [`MemoryStore`] (in-process, used by the test
//! suite and simulations) and [`PgStore`] (PostgreSQL, one JSONB row per
//! document).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use uuid::Uuid;

pub mod config;
pub mod errors;
pub mod memory;
pub mod pg;

pub use config::StoreConfig;
pub use errors::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use pg::PgStore;

/// A stored document: a flat JSON object keyed by field name.
pub type Document = serde_json::Map<String, Value>;

/// A document paired with its ID.
#[derive(Debug, Clone)]
pub struct Doc<T> {
    pub id: String,
    pub data: T,
}

/// Collection path helpers for the tournament hierarchy.
pub mod paths {
    /// Root collection of tournament documents.
    pub const TOURNAMENTS: &str = "tournaments";

    pub fn players(tournament_id: &str) -> String {
        format!("tournaments/{tournament_id}/players")
    }

    pub fn tables(tournament_id: &str) -> String {
        format!("tournaments/{tournament_id}/tables")
    }

    pub fn rounds(tournament_id: &str) -> String {
        format!("tournaments/{tournament_id}/rounds")
    }

    pub fn participants(tournament_id: &str, round_id: &str) -> String {
        format!("tournaments/{tournament_id}/rounds/{round_id}/participants")
    }
}

/// A single write inside an atomic batch.
#[derive(Debug, Clone)]
pub enum WriteOp {
    /// Create or replace a document
    Set {
        collection: String,
        id: String,
        doc: Document,
    },
    /// Merge fields into an existing document (shallow, top-level keys)
    Update {
        collection: String,
        id: String,
        fields: Document,
    },
    /// Delete a document (idempotent)
    Delete { collection: String, id: String },
    /// Atomically add to a numeric field of an existing document
    Increment {
        collection: String,
        id: String,
        field: String,
        by: f64,
    },
    /// Atomically append a value to an array field of an existing document
    ArrayAppend {
        collection: String,
        id: String,
        field: String,
        value: Value,
    },
}

/// A condition checked at commit time; a violated precondition aborts the
/// whole batch with no effects.
#[derive(Debug, Clone)]
pub enum Precondition {
    Exists { collection: String, id: String },
    FieldEquals {
        collection: String,
        id: String,
        field: String,
        expected: Value,
    },
}

/// An all-or-nothing group of writes.
///
/// Replaces ad-hoc multi-document mutation sequences: either every operation
/// commits or none do. Backends must also serialize batches touching the same
/// document, which is what makes `ArrayAppend` a safe concurrent append
/// primitive for per-player score ledgers.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    preconditions: Vec<Precondition>,
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn preconditions(&self) -> &[Precondition] {
        &self.preconditions
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn set(&mut self, collection: impl Into<String>, id: impl Into<String>, doc: Document) {
        self.ops.push(WriteOp::Set {
            collection: collection.into(),
            id: id.into(),
            doc,
        });
    }

    pub fn update(
        &mut self,
        collection: impl Into<String>,
        id: impl Into<String>,
        fields: Document,
    ) {
        self.ops.push(WriteOp::Update {
            collection: collection.into(),
            id: id.into(),
            fields,
        });
    }

    pub fn delete(&mut self, collection: impl Into<String>, id: impl Into<String>) {
        self.ops.push(WriteOp::Delete {
            collection: collection.into(),
            id: id.into(),
        });
    }

    pub fn increment(
        &mut self,
        collection: impl Into<String>,
        id: impl Into<String>,
        field: impl Into<String>,
        by: f64,
    ) {
        self.ops.push(WriteOp::Increment {
            collection: collection.into(),
            id: id.into(),
            field: field.into(),
            by,
        });
    }

    pub fn array_append(
        &mut self,
        collection: impl Into<String>,
        id: impl Into<String>,
        field: impl Into<String>,
        value: Value,
    ) {
        self.ops.push(WriteOp::ArrayAppend {
            collection: collection.into(),
            id: id.into(),
            field: field.into(),
            value,
        });
    }

    pub fn require_exists(&mut self, collection: impl Into<String>, id: impl Into<String>) {
        self.preconditions.push(Precondition::Exists {
            collection: collection.into(),
            id: id.into(),
        });
    }

    pub fn require_field(
        &mut self,
        collection: impl Into<String>,
        id: impl Into<String>,
        field: impl Into<String>,
        expected: Value,
    ) {
        self.preconditions.push(Precondition::FieldEquals {
            collection: collection.into(),
            id: id.into(),
            field: field.into(),
            expected,
        });
    }
}

/// Trait for document storage backends
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch a document, `None` if absent
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>>;

    /// Create or replace a document
    async fn set(&self, collection: &str, id: &str, doc: Document) -> StoreResult<()>;

    /// Merge fields into an existing document
    async fn update(&self, collection: &str, id: &str, fields: Document) -> StoreResult<()>;

    /// Delete a document
    async fn delete(&self, collection: &str, id: &str) -> StoreResult<()>;

    /// Enumerate a collection (unordered)
    async fn list(&self, collection: &str) -> StoreResult<Vec<(String, Document)>>;

    /// Apply a batch atomically: all writes commit or none do
    async fn commit(&self, batch: WriteBatch) -> StoreResult<()>;

    /// Write-time timestamp marker resolved by the store
    fn server_timestamp(&self) -> DateTime<Utc> {
        Utc::now()
    }

    /// Mint a fresh document ID
    fn new_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

/// Serialize a value into a [`Document`].
pub fn to_document<T: Serialize>(value: &T) -> StoreResult<Document> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::InvalidDocument(format!(
            "expected a JSON object, got {other}"
        ))),
    }
}

/// Deserialize a [`Document`] into a typed record.
pub fn from_document<T: DeserializeOwned>(doc: Document) -> StoreResult<T> {
    Ok(serde_json::from_value(Value::Object(doc))?)
}

/// Fetch and deserialize a document.
pub async fn get_as<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    collection: &str,
    id: &str,
) -> StoreResult<Option<Doc<T>>> {
    match store.get(collection, id).await? {
        Some(doc) => Ok(Some(Doc {
            id: id.to_string(),
            data: from_document(doc)?,
        })),
        None => Ok(None),
    }
}

/// Enumerate and deserialize a collection.
pub async fn list_as<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    collection: &str,
) -> StoreResult<Vec<Doc<T>>> {
    let mut out = Vec::new();
    for (id, doc) in store.list(collection).await? {
        out.push(Doc {
            id,
            data: from_document(doc)?,
        });
    }
    Ok(out)
}
