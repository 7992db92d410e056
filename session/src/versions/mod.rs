//! Version history storage.
//!
//! Every manual save and every accepted draft proposal records an immutable
//! snapshot of the form. Stores are append-only; recording happens in the
//! background so a slow or failing store never blocks the editor.

mod manager;
mod memory;
mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quill_engine::{NewVersion, ProductId, TriggerType};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::error::Result;

pub use manager::VersionManager;
pub use memory::MemoryVersionStore;
pub use postgres::{create_pool, run_migrations, PgVersionStore, Pool};

/// A stored version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionRecord {
    pub id: Uuid,
    pub product_id: ProductId,
    /// Serialized `FormSnapshot`
    pub form_snapshot: serde_json::Value,
    pub trigger_type: TriggerType,
    pub created_at: DateTime<Utc>,
}

impl VersionRecord {
    /// Assign an id and creation time to a new version.
    pub fn from_new(version: NewVersion) -> Result<Self> {
        Ok(Self {
            id: Uuid::new_v4(),
            form_snapshot: version.form_snapshot.to_value()?,
            product_id: version.product_id,
            trigger_type: version.trigger_type,
            created_at: Utc::now(),
        })
    }
}

/// Append-only storage for versions.
#[async_trait]
pub trait VersionStore: Send + Sync {
    /// Persist a new version.
    async fn create_version(&self, version: NewVersion) -> Result<VersionRecord>;

    /// All versions of a product, newest first.
    async fn list_versions(&self, product_id: &str) -> Result<Vec<VersionRecord>>;

    async fn get_version(&self, id: Uuid) -> Result<Option<VersionRecord>>;
}

/// Open the store the configuration asks for.
///
/// With a `database_url` this connects to PostgreSQL and runs migrations;
/// otherwise versions are kept in memory.
pub async fn open_store(config: &SessionConfig) -> Result<Arc<dyn VersionStore>> {
    match &config.database_url {
        Some(url) => {
            tracing::info!("Connecting version store to PostgreSQL");
            let store = PgVersionStore::connect(url).await?;
            Ok(Arc::new(store))
        }
        None => {
            tracing::info!("Using in-memory version store");
            Ok(MemoryVersionStore::new_shared())
        }
    }
}
