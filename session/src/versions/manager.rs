//! Background recording and lookup of versions.

use std::sync::Arc;

use quill_engine::{FormSnapshot, NewVersion};
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::{VersionRecord, VersionStore};
use crate::error::{Result, SessionError};

/// Front for a [`VersionStore`] used by sessions.
#[derive(Clone)]
pub struct VersionManager {
    store: Arc<dyn VersionStore>,
}

impl VersionManager {
    pub fn new(store: Arc<dyn VersionStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn VersionStore> {
        &self.store
    }

    /// Record a version without waiting for the store.
    ///
    /// Failures are logged and never reach the caller.
    pub fn record(&self, version: NewVersion) -> JoinHandle<()> {
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            let product_id = version.product_id.clone();
            let trigger = version.trigger_type;
            match store.create_version(version).await {
                Ok(record) => {
                    tracing::info!(
                        product_id = %product_id,
                        version_id = %record.id,
                        trigger = %trigger,
                        "Version recorded"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        product_id = %product_id,
                        trigger = %trigger,
                        error = %e,
                        "Failed to record version"
                    );
                }
            }
        })
    }

    /// Versions of a product, newest first.
    pub async fn list(&self, product_id: &str) -> Result<Vec<VersionRecord>> {
        self.store.list_versions(product_id).await
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<VersionRecord>> {
        self.store.get_version(id).await
    }

    /// Load a version's snapshot for restoring into `product_id`'s form.
    pub async fn load_snapshot(&self, product_id: &str, id: Uuid) -> Result<FormSnapshot> {
        let record = self
            .get(id)
            .await?
            .filter(|record| record.product_id == product_id)
            .ok_or(SessionError::VersionNotFound(id))?;
        Ok(FormSnapshot::from_value(record.form_snapshot)?)
    }
}

impl std::fmt::Debug for VersionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionManager").finish_non_exhaustive()
    }
}
