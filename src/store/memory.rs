//! In-memory document store.
//!
//! A single mutex over all collections gives the same guarantees the engine
//! expects from a real backend: batches commit all-or-nothing, and writes
//! touching one document are serialized. Used by the test suite and by
//! offline simulations.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use super::errors::{StoreError, StoreResult};
use super::{Document, DocumentStore, Precondition, WriteBatch, WriteOp};

type Collections = HashMap<String, BTreeMap<String, Document>>;

/// In-process [`DocumentStore`] backend
#[derive(Default)]
pub struct MemoryStore {
    collections: Mutex<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Render a computed numeric field without a spurious fractional part, so
/// integer counters (e.g. `wins`) stay deserializable as integers.
fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        Value::from(n as i64)
    } else {
        Value::from(n)
    }
}

fn field_as_f64(doc: &Document, field: &str) -> StoreResult<f64> {
    match doc.get(field) {
        None | Some(Value::Null) => Ok(0.0),
        Some(v) => v.as_f64().ok_or_else(|| {
            StoreError::TransactionFailed(format!("field '{field}' is not numeric"))
        }),
    }
}

fn check_precondition(collections: &Collections, pre: &Precondition) -> StoreResult<()> {
    match pre {
        Precondition::Exists { collection, id } => {
            if collections
                .get(collection)
                .and_then(|c| c.get(id))
                .is_none()
            {
                return Err(StoreError::PreconditionFailed {
                    collection: collection.clone(),
                    id: id.clone(),
                    detail: "document does not exist".to_string(),
                });
            }
            Ok(())
        }
        Precondition::FieldEquals {
            collection,
            id,
            field,
            expected,
        } => {
            let actual = collections
                .get(collection)
                .and_then(|c| c.get(id))
                .and_then(|doc| doc.get(field))
                .cloned()
                .unwrap_or(Value::Null);
            if &actual != expected {
                return Err(StoreError::PreconditionFailed {
                    collection: collection.clone(),
                    id: id.clone(),
                    detail: format!("field '{field}' is {actual}, expected {expected}"),
                });
            }
            Ok(())
        }
    }
}

fn apply_op(collections: &mut Collections, op: &WriteOp) -> StoreResult<()> {
    match op {
        WriteOp::Set { collection, id, doc } => {
            collections
                .entry(collection.clone())
                .or_default()
                .insert(id.clone(), doc.clone());
            Ok(())
        }
        WriteOp::Update {
            collection,
            id,
            fields,
        } => {
            let doc = existing_mut(collections, collection, id)?;
            for (k, v) in fields {
                doc.insert(k.clone(), v.clone());
            }
            Ok(())
        }
        WriteOp::Delete { collection, id } => {
            if let Some(col) = collections.get_mut(collection) {
                col.remove(id);
            }
            Ok(())
        }
        WriteOp::Increment {
            collection,
            id,
            field,
            by,
        } => {
            let doc = existing_mut(collections, collection, id)?;
            let next = field_as_f64(doc, field)? + by;
            doc.insert(field.clone(), number_value(next));
            Ok(())
        }
        WriteOp::ArrayAppend {
            collection,
            id,
            field,
            value,
        } => {
            let doc = existing_mut(collections, collection, id)?;
            match doc.entry(field.clone()).or_insert_with(|| Value::Array(vec![])) {
                Value::Array(items) => {
                    items.push(value.clone());
                    Ok(())
                }
                _ => Err(StoreError::TransactionFailed(format!(
                    "field '{field}' is not an array"
                ))),
            }
        }
    }
}

fn existing_mut<'a>(
    collections: &'a mut Collections,
    collection: &str,
    id: &str,
) -> StoreResult<&'a mut Document> {
    collections
        .get_mut(collection)
        .and_then(|c| c.get_mut(id))
        .ok_or_else(|| StoreError::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        })
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        let collections = self.collections.lock().unwrap();
        Ok(collections
            .get(collection)
            .and_then(|c| c.get(id))
            .cloned())
    }

    async fn set(&self, collection: &str, id: &str, doc: Document) -> StoreResult<()> {
        let mut collections = self.collections.lock().unwrap();
        collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), doc);
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, fields: Document) -> StoreResult<()> {
        let mut collections = self.collections.lock().unwrap();
        let doc = existing_mut(&mut collections, collection, id)?;
        for (k, v) in fields {
            doc.insert(k, v);
        }
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<()> {
        let mut collections = self.collections.lock().unwrap();
        if let Some(col) = collections.get_mut(collection) {
            col.remove(id);
        }
        Ok(())
    }

    async fn list(&self, collection: &str) -> StoreResult<Vec<(String, Document)>> {
        let collections = self.collections.lock().unwrap();
        Ok(collections
            .get(collection)
            .map(|c| c.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default())
    }

    async fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        let mut collections = self.collections.lock().unwrap();

        // Validate and apply against a scratch copy; swap only on full
        // success so a failed batch leaves no partial state.
        let mut scratch = collections.clone();
        for pre in batch.preconditions() {
            check_precondition(&scratch, pre)?;
        }
        for op in batch.ops() {
            apply_op(&mut scratch, op)?;
        }

        *collections = scratch;
        Ok(())
    }
}
