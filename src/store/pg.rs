//! PostgreSQL document store.
//!
//! Documents live in a single `documents` table keyed by `(collection, id)`
//! with the body in a JSONB column. A [`WriteBatch`] maps onto one SQL
//! transaction; preconditions take row locks (`SELECT ... FOR UPDATE`) before
//! being checked, so concurrent batches against the same documents serialize.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::Row;
use sqlx::postgres::{PgPool, PgPoolOptions};

use super::config::StoreConfig;
use super::errors::{StoreError, StoreResult};
use super::{Document, DocumentStore, Precondition, WriteBatch, WriteOp};

/// PostgreSQL-backed [`DocumentStore`]
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect a new store using the given configuration
    pub async fn new(config: &StoreConfig) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .connect(&config.database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Create the backing table if it does not exist
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                doc JSONB NOT NULL,
                PRIMARY KEY (collection, id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Check if the database connection is healthy
    pub async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Close the connection pool
    pub async fn close(self) {
        self.pool.close().await;
    }
}

async fn check_precondition(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    pre: &Precondition,
) -> StoreResult<()> {
    match pre {
        Precondition::Exists { collection, id } => {
            let row =
                sqlx::query("SELECT 1 FROM documents WHERE collection = $1 AND id = $2 FOR UPDATE")
                    .bind(collection)
                    .bind(id)
                    .fetch_optional(&mut **tx)
                    .await?;
            if row.is_none() {
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
            let row = sqlx::query(
                "SELECT doc -> $3 AS val FROM documents WHERE collection = $1 AND id = $2 FOR UPDATE",
            )
            .bind(collection)
            .bind(id)
            .bind(field)
            .fetch_optional(&mut **tx)
            .await?;

            let actual = row
                .and_then(|r| r.get::<Option<Value>, _>("val"))
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

async fn apply_op(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    op: &WriteOp,
) -> StoreResult<()> {
    match op {
        WriteOp::Set { collection, id, doc } => {
            sqlx::query(
                r#"
                INSERT INTO documents (collection, id, doc) VALUES ($1, $2, $3)
                ON CONFLICT (collection, id) DO UPDATE SET doc = EXCLUDED.doc
                "#,
            )
            .bind(collection)
            .bind(id)
            .bind(Value::Object(doc.clone()))
            .execute(&mut **tx)
            .await?;
            Ok(())
        }
        WriteOp::Update {
            collection,
            id,
            fields,
        } => {
            let result = sqlx::query(
                "UPDATE documents SET doc = doc || $3 WHERE collection = $1 AND id = $2",
            )
            .bind(collection)
            .bind(id)
            .bind(Value::Object(fields.clone()))
            .execute(&mut **tx)
            .await?;
            require_row(result.rows_affected(), collection, id)
        }
        WriteOp::Delete { collection, id } => {
            sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
                .bind(collection)
                .bind(id)
                .execute(&mut **tx)
                .await?;
            Ok(())
        }
        WriteOp::Increment {
            collection,
            id,
            field,
            by,
        } => {
            // Integral results are stored as JSON integers so counters stay
            // deserializable as integers.
            let result = sqlx::query(
                r#"
                UPDATE documents SET doc = jsonb_set(doc, ARRAY[$3], (
                    SELECT CASE WHEN v = trunc(v) AND abs(v) < 9007199254740992
                                THEN to_jsonb(v::bigint)
                                ELSE to_jsonb(v) END
                    FROM (SELECT COALESCE((doc ->> $3)::double precision, 0) + $4 AS v) s
                ))
                WHERE collection = $1 AND id = $2
                "#,
            )
            .bind(collection)
            .bind(id)
            .bind(field)
            .bind(by)
            .execute(&mut **tx)
            .await?;
            require_row(result.rows_affected(), collection, id)
        }
        WriteOp::ArrayAppend {
            collection,
            id,
            field,
            value,
        } => {
            let result = sqlx::query(
                r#"
                UPDATE documents
                SET doc = jsonb_set(
                    doc, ARRAY[$3],
                    COALESCE(doc -> $3, '[]'::jsonb) || jsonb_build_array($4)
                )
                WHERE collection = $1 AND id = $2
                "#,
            )
            .bind(collection)
            .bind(id)
            .bind(field)
            .bind(value)
            .execute(&mut **tx)
            .await?;
            require_row(result.rows_affected(), collection, id)
        }
    }
}

fn require_row(rows_affected: u64, collection: &str, id: &str) -> StoreResult<()> {
    if rows_affected == 0 {
        return Err(StoreError::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        });
    }
    Ok(())
}

#[async_trait]
impl DocumentStore for PgStore {
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        let row = sqlx::query("SELECT doc FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(r) => match r.get::<Value, _>("doc") {
                Value::Object(map) => Ok(Some(map)),
                other => Err(StoreError::InvalidDocument(format!(
                    "stored document is not an object: {other}"
                ))),
            },
            None => Ok(None),
        }
    }

    async fn set(&self, collection: &str, id: &str, doc: Document) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO documents (collection, id, doc) VALUES ($1, $2, $3)
            ON CONFLICT (collection, id) DO UPDATE SET doc = EXCLUDED.doc
            "#,
        )
        .bind(collection)
        .bind(id)
        .bind(Value::Object(doc))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, fields: Document) -> StoreResult<()> {
        let result =
            sqlx::query("UPDATE documents SET doc = doc || $3 WHERE collection = $1 AND id = $2")
                .bind(collection)
                .bind(id)
                .bind(Value::Object(fields))
                .execute(&self.pool)
                .await?;
        require_row(result.rows_affected(), collection, id)
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<()> {
        sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list(&self, collection: &str) -> StoreResult<Vec<(String, Document)>> {
        let rows = sqlx::query("SELECT id, doc FROM documents WHERE collection = $1")
            .bind(collection)
            .fetch_all(&self.pool)
            .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let id: String = row.get("id");
            match row.get::<Value, _>("doc") {
                Value::Object(map) => out.push((id, map)),
                other => {
                    return Err(StoreError::InvalidDocument(format!(
                        "stored document is not an object: {other}"
                    )));
                }
            }
        }
        Ok(out)
    }

    async fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        // An early return drops the transaction, rolling everything back.
        for pre in batch.preconditions() {
            check_precondition(&mut tx, pre).await?;
        }
        for op in batch.ops() {
            apply_op(&mut tx, op).await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
