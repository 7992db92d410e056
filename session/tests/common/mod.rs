//! In-memory collaborators for session tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use quill_engine::{ContentBuffer, FormValues, ProductContent, ProductRecord};
use quill_session::{
    ApiError, MemoryVersionStore, ProductApi, Session, SessionConfig, SubRecordSaver,
    VersionManager,
};
use serde_json::{json, Value};
use tokio::sync::Mutex;

pub const PRODUCT_ID: &str = "prod-42";

pub fn content(value: Value) -> ProductContent {
    ProductContent::from_value(value).unwrap()
}

pub fn mug_content() -> ProductContent {
    content(json!({
        "title": "Mug",
        "description": "<p>Hand thrown.</p>",
        "sku": "MUG-1",
        "regular_price": "12.00",
        "categories": [{"id": 3, "name": "Kitchen"}],
        "seo": {"title": "Mug", "description": "A mug"}
    }))
}

/// A platform that keeps one product in memory.
pub struct FakeApi {
    pub record: Mutex<ProductRecord>,
    pub buffer: Mutex<Option<ContentBuffer>>,
    pub remote: Mutex<ProductContent>,
    pub saved: Mutex<Vec<FormValues>>,
    pub save_error: Mutex<Option<ApiError>>,
    pub remote_error: Mutex<Option<ApiError>>,
    pub save_calls: AtomicU64,
    pub remote_calls: AtomicU64,
    pub save_delay: Duration,
}

impl FakeApi {
    pub fn new(record: ProductRecord) -> Self {
        Self {
            remote: Mutex::new(record.working_content.clone()),
            record: Mutex::new(record),
            buffer: Mutex::new(None),
            saved: Mutex::new(Vec::new()),
            save_error: Mutex::new(None),
            remote_error: Mutex::new(None),
            save_calls: AtomicU64::new(0),
            remote_calls: AtomicU64::new(0),
            save_delay: Duration::ZERO,
        }
    }

    pub fn mug() -> Self {
        Self::new(ProductRecord::new(PRODUCT_ID, mug_content()).synced_at(1))
    }

    pub fn with_save_delay(mut self, delay: Duration) -> Self {
        self.save_delay = delay;
        self
    }

    /// Someone else changed a field on the platform.
    pub async fn edit_remote(&self, key: &str, value: Value) {
        self.remote.lock().await.set(key, value);
    }

    /// The backend re-synchronized the record without content changes.
    pub async fn bump_sync(&self) {
        let mut record = self.record.lock().await;
        record.last_synced_at = Some(record.last_synced_at.unwrap_or(0) + 1);
    }

    pub fn save_calls(&self) -> u64 {
        self.save_calls.load(Ordering::Relaxed)
    }

    pub fn remote_calls(&self) -> u64 {
        self.remote_calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ProductApi for FakeApi {
    async fn fetch_product(&self, product_id: &str) -> Result<ProductRecord, ApiError> {
        let record = self.record.lock().await;
        if record.id != product_id {
            return Err(ApiError::NotFound(product_id.to_string()));
        }
        Ok(record.clone())
    }

    async fn fetch_content_buffer(
        &self,
        _product_id: &str,
    ) -> Result<Option<ContentBuffer>, ApiError> {
        Ok(self.buffer.lock().await.clone())
    }

    async fn fetch_remote_content(&self, _product_id: &str) -> Result<ProductContent, ApiError> {
        self.remote_calls.fetch_add(1, Ordering::Relaxed);
        if let Some(err) = self.remote_error.lock().await.clone() {
            return Err(err);
        }
        Ok(self.remote.lock().await.clone())
    }

    async fn save_product(&self, _product_id: &str, values: &FormValues) -> Result<(), ApiError> {
        self.save_calls.fetch_add(1, Ordering::Relaxed);
        if !self.save_delay.is_zero() {
            tokio::time::sleep(self.save_delay).await;
        }
        if let Some(err) = self.save_error.lock().await.clone() {
            return Err(err);
        }

        let mut remote = self.remote.lock().await;
        *remote = values.to_content(&remote);
        let mut record = self.record.lock().await;
        record.working_content = remote.clone();
        record.last_synced_at = Some(record.last_synced_at.unwrap_or(0) + 1);
        self.saved.lock().await.push(values.clone());
        Ok(())
    }
}

/// Records which sub-records it was asked to save.
#[derive(Default)]
pub struct FakeSaver {
    pub fail: bool,
    pub delay: Option<Duration>,
    pub calls: Mutex<Vec<Vec<String>>>,
}

impl FakeSaver {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }
}

#[async_trait]
impl SubRecordSaver for FakeSaver {
    async fn save_sub_records(&self, _product_id: &str, ids: &[String]) -> Result<(), ApiError> {
        self.calls.lock().await.push(ids.to_vec());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(ApiError::Rejected {
                status: 422,
                message: "variation price missing".to_string(),
            });
        }
        Ok(())
    }
}

pub struct Harness {
    pub api: Arc<FakeApi>,
    pub store: Arc<MemoryVersionStore>,
    pub session: Session,
}

/// Open a session and let the freshly loaded form settle.
pub async fn open(api: FakeApi) -> Harness {
    let api = Arc::new(api);
    let store = MemoryVersionStore::new_shared();
    let session = Session::open(
        PRODUCT_ID,
        api.clone(),
        VersionManager::new(store.clone()),
        SessionConfig::default(),
    )
    .await
    .unwrap();
    settle().await;
    Harness {
        api,
        store,
        session,
    }
}

/// Let every pending timer fire.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1000)).await;
}

/// Let spawned background tasks run without crossing any session deadline.
pub async fn yield_briefly() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}
