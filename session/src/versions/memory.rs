//! In-memory version store.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use quill_engine::{NewVersion, ProductId};
use uuid::Uuid;

use super::{VersionRecord, VersionStore};
use crate::error::Result;

/// Keeps versions in process memory, keyed by product.
///
/// Thread-safe and can be shared across sessions via `Arc`.
#[derive(Debug, Default)]
pub struct MemoryVersionStore {
    /// Versions per product, oldest first.
    by_product: DashMap<ProductId, Vec<VersionRecord>>,
}

impl MemoryVersionStore {
    pub fn new() -> Self {
        Self {
            by_product: DashMap::new(),
        }
    }

    /// Create a new store wrapped in Arc for sharing.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Total number of stored versions.
    pub fn len(&self) -> usize {
        self.by_product.iter().map(|entry| entry.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl VersionStore for MemoryVersionStore {
    async fn create_version(&self, version: NewVersion) -> Result<VersionRecord> {
        let record = VersionRecord::from_new(version)?;
        self.by_product
            .entry(record.product_id.clone())
            .or_default()
            .push(record.clone());

        tracing::debug!(version_id = %record.id, product_id = %record.product_id, "Version stored");
        Ok(record)
    }

    async fn list_versions(&self, product_id: &str) -> Result<Vec<VersionRecord>> {
        Ok(self
            .by_product
            .get(product_id)
            .map(|versions| versions.iter().rev().cloned().collect())
            .unwrap_or_default())
    }

    async fn get_version(&self, id: Uuid) -> Result<Option<VersionRecord>> {
        Ok(self
            .by_product
            .iter()
            .find_map(|entry| entry.value().iter().find(|v| v.id == id).cloned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_engine::{FormValues, TriggerType};
    use serde_json::json;

    fn values(title: &str) -> FormValues {
        let mut values = FormValues::new();
        values.set("title", json!(title));
        values
    }

    #[tokio::test]
    async fn test_list_is_newest_first_and_per_product() {
        let store = MemoryVersionStore::new();
        store
            .create_version(NewVersion::manual_save("p-1", values("First")))
            .await
            .unwrap();
        store
            .create_version(NewVersion::ai_approval("p-1", values("Second")))
            .await
            .unwrap();
        store
            .create_version(NewVersion::manual_save("p-2", values("Other")))
            .await
            .unwrap();

        let versions = store.list_versions("p-1").await.unwrap();
        assert_eq!(versions.len(), 2);
        assert_eq!(versions[0].trigger_type, TriggerType::AiApproval);
        assert_eq!(versions[1].trigger_type, TriggerType::ManualSave);
        assert_eq!(store.len(), 3);
        assert!(store.list_versions("p-3").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_version_by_id() {
        let store = MemoryVersionStore::new();
        let created = store
            .create_version(NewVersion::manual_save("p-1", values("Mug")))
            .await
            .unwrap();

        let fetched = store.get_version(created.id).await.unwrap().unwrap();
        assert_eq!(fetched, created);
        assert_eq!(fetched.form_snapshot["values"]["title"], json!("Mug"));
        assert!(store.get_version(Uuid::new_v4()).await.unwrap().is_none());
    }
}
