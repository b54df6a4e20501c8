//! PostgreSQL JSONB document store.
//!
//! All collections share one `documents` table; `seq` preserves insertion order.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use super::{Document, DocumentBody, DocumentId, DocumentStore, Filter};
use crate::{Error, Result};

const CREATE_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    id UUID PRIMARY KEY,
    collection TEXT NOT NULL,
    body JSONB NOT NULL,
    seq BIGSERIAL NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
)
"#;

const CREATE_INDEX_SQL: &str =
    "CREATE INDEX IF NOT EXISTS documents_collection_seq_idx ON documents (collection, seq)";

/// Document store over a Postgres connection pool.
pub struct PgDocumentStore {
    pool: PgPool,
    name: String,
}

impl PgDocumentStore {
    /// Wrap a pool and make sure the `documents` table exists.
    pub async fn new(pool: PgPool, name: impl Into<String>) -> Result<Self> {
        sqlx::query(CREATE_TABLE_SQL).execute(&pool).await?;
        sqlx::query(CREATE_INDEX_SQL).execute(&pool).await?;

        Ok(Self {
            pool,
            name: name.into(),
        })
    }
}

fn into_document((id, body): (Uuid, Value)) -> Result<Document> {
    match body {
        Value::Object(body) => Ok(Document { id, body }),
        other => Err(Error::StoreUnavailable(format!(
            "document {} is not an object: {}",
            id, other
        ))),
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn insert(&self, collection: &str, document: DocumentBody) -> Result<DocumentId> {
        let id = Uuid::new_v4();

        sqlx::query("INSERT INTO documents (id, collection, body) VALUES ($1, $2, $3)")
            .bind(id)
            .bind(collection)
            .bind(Value::Object(document))
            .execute(&self.pool)
            .await?;

        Ok(id)
    }

    async fn find(&self, collection: &str, filter: &Filter, limit: usize) -> Result<Vec<Document>> {
        // LIMIT NULL means no limit in Postgres.
        let limit = (limit > 0).then(|| i64::try_from(limit).unwrap_or(i64::MAX));

        let rows: Vec<(Uuid, Value)> = sqlx::query_as(
            r#"
            SELECT id, body
            FROM documents
            WHERE collection = $1 AND body @> $2
            ORDER BY seq
            LIMIT $3
            "#,
        )
        .bind(collection)
        .bind(Value::Object(filter.clone()))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(into_document).collect()
    }

    async fn find_one(&self, collection: &str, id: DocumentId) -> Result<Option<Document>> {
        let row: Option<(Uuid, Value)> =
            sqlx::query_as("SELECT id, body FROM documents WHERE collection = $1 AND id = $2")
                .bind(collection)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(into_document).transpose()
    }

    async fn set_fields(&self, collection: &str, id: DocumentId, fields: DocumentBody) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE documents
            SET body = body || $3, updated_at = now()
            WHERE collection = $1 AND id = $2
            "#,
        )
        .bind(collection)
        .bind(id)
        .bind(Value::Object(fields))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn collection_names(&self) -> Result<Vec<String>> {
        let names: Vec<String> =
            sqlx::query_scalar("SELECT DISTINCT collection FROM documents ORDER BY collection")
                .fetch_all(&self.pool)
                .await?;

        Ok(names)
    }
}
