use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;
use tourbook_core::{Collection, Document, DocumentStore, StoreError, StoreResult};

/// Document store backed by a single JSONB table.
#[derive(Clone)]
pub struct PgDocumentStore {
    pub pool: Pool<Postgres>,
}

#[derive(sqlx::FromRow)]
struct DocumentRow {
    id: Uuid,
    body: Value,
    created_at: DateTime<Utc>,
}

impl From<DocumentRow> for Document {
    fn from(row: DocumentRow) -> Self {
        Document {
            id: row.id,
            body: row.body,
            created_at: row.created_at,
        }
    }
}

fn backend(e: sqlx::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

fn insert_error(collection: Collection, e: sqlx::Error) -> StoreError {
    let unique = e
        .as_database_error()
        .is_some_and(|db| db.is_unique_violation());
    match collection.unique_key() {
        Some(field) if unique => StoreError::Duplicate { collection, field },
        _ => backend(e),
    }
}

impl PgDocumentStore {
    pub async fn connect(connection_string: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(connection_string)
            .await?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("../migrations").run(&self.pool).await?;
        info!("Migrations completed successfully.");
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn insert(&self, collection: Collection, body: Value) -> StoreResult<Uuid> {
        if !body.is_object() {
            return Err(StoreError::InvalidDocument);
        }
        let id = Uuid::new_v4();
        sqlx::query("INSERT INTO documents (collection, id, body) VALUES ($1, $2, $3)")
            .bind(collection.as_str())
            .bind(id)
            .bind(&body)
            .execute(&self.pool)
            .await
            .map_err(|e| insert_error(collection, e))?;
        Ok(id)
    }

    async fn get(&self, collection: Collection, id: Uuid) -> StoreResult<Option<Document>> {
        let row = sqlx::query_as::<_, DocumentRow>(
            "SELECT id, body, created_at FROM documents WHERE collection = $1 AND id = $2",
        )
        .bind(collection.as_str())
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;
        Ok(row.map(Document::from))
    }

    async fn list(&self, collection: Collection) -> StoreResult<Vec<Document>> {
        let rows = sqlx::query_as::<_, DocumentRow>(
            "SELECT id, body, created_at FROM documents WHERE collection = $1 ORDER BY seq",
        )
        .bind(collection.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        Ok(rows.into_iter().map(Document::from).collect())
    }

    async fn find_eq(
        &self,
        collection: Collection,
        field: &str,
        value: &Value,
    ) -> StoreResult<Vec<Document>> {
        let rows = sqlx::query_as::<_, DocumentRow>(
            "SELECT id, body, created_at FROM documents \
             WHERE collection = $1 AND body -> $2 = $3 ORDER BY seq",
        )
        .bind(collection.as_str())
        .bind(field)
        .bind(value)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;
        Ok(rows.into_iter().map(Document::from).collect())
    }

    async fn update(&self, collection: Collection, id: Uuid, patch: Value) -> StoreResult<()> {
        if !patch.is_object() {
            return Err(StoreError::InvalidDocument);
        }
        let result = sqlx::query(
            "UPDATE documents SET body = body || $3, updated_at = NOW() \
             WHERE collection = $1 AND id = $2",
        )
        .bind(collection.as_str())
        .bind(id)
        .bind(&patch)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound { collection, id });
        }
        Ok(())
    }

    async fn replace(&self, collection: Collection, id: Uuid, body: Value) -> StoreResult<()> {
        if !body.is_object() {
            return Err(StoreError::InvalidDocument);
        }
        let result = sqlx::query(
            "UPDATE documents SET body = $3, updated_at = NOW() WHERE collection = $1 AND id = $2",
        )
        .bind(collection.as_str())
        .bind(id)
        .bind(&body)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound { collection, id });
        }
        Ok(())
    }

    async fn delete(&self, collection: Collection, id: Uuid) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection.as_str())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound { collection, id });
        }
        Ok(())
    }
}
