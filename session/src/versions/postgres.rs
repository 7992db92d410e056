//! PostgreSQL version store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quill_engine::{NewVersion, TriggerType};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::{VersionRecord, VersionStore};
use crate::error::Result;

/// Type alias for the database pool.
pub type Pool = PgPool;

/// Create a new database connection pool.
pub async fn create_pool(database_url: &str) -> std::result::Result<Pool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
}

/// Run database migrations.
pub async fn run_migrations(pool: &Pool) -> std::result::Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

/// A row of the `product_versions` table.
#[derive(Debug)]
struct StoredVersion {
    id: Uuid,
    product_id: String,
    form_snapshot: serde_json::Value,
    trigger_type: TriggerType,
    created_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, PgRow> for StoredVersion {
    fn from_row(row: &'r PgRow) -> std::result::Result<Self, sqlx::Error> {
        let trigger: String = row.try_get("trigger_type")?;
        let trigger_type = TriggerType::parse(&trigger)
            .ok_or_else(|| sqlx::Error::Decode(format!("unknown trigger type: {trigger}").into()))?;

        Ok(StoredVersion {
            id: row.try_get("id")?,
            product_id: row.try_get("product_id")?,
            form_snapshot: row.try_get("form_snapshot")?,
            trigger_type,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl From<StoredVersion> for VersionRecord {
    fn from(row: StoredVersion) -> Self {
        VersionRecord {
            id: row.id,
            product_id: row.product_id,
            form_snapshot: row.form_snapshot,
            trigger_type: row.trigger_type,
            created_at: row.created_at,
        }
    }
}

/// Versions stored in PostgreSQL.
#[derive(Debug, Clone)]
pub struct PgVersionStore {
    pool: Pool,
}

impl PgVersionStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Connect and bring the schema up to date.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = create_pool(database_url).await?;
        tracing::info!("Running database migrations...");
        run_migrations(&pool).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }
}

#[async_trait]
impl VersionStore for PgVersionStore {
    async fn create_version(&self, version: NewVersion) -> Result<VersionRecord> {
        let record = VersionRecord::from_new(version)?;

        sqlx::query(
            r#"
            INSERT INTO product_versions (id, product_id, form_snapshot, trigger_type, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(record.id)
        .bind(&record.product_id)
        .bind(&record.form_snapshot)
        .bind(record.trigger_type.as_str())
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        tracing::debug!(version_id = %record.id, product_id = %record.product_id, "Version stored");
        Ok(record)
    }

    async fn list_versions(&self, product_id: &str) -> Result<Vec<VersionRecord>> {
        let rows = sqlx::query_as::<_, StoredVersion>(
            r#"
            SELECT id, product_id, form_snapshot, trigger_type, created_at
            FROM product_versions
            WHERE product_id = $1
            ORDER BY created_at DESC, id
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(VersionRecord::from).collect())
    }

    async fn get_version(&self, id: Uuid) -> Result<Option<VersionRecord>> {
        let row = sqlx::query_as::<_, StoredVersion>(
            r#"
            SELECT id, product_id, form_snapshot, trigger_type, created_at
            FROM product_versions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(VersionRecord::from))
    }
}
