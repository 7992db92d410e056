//! Product record and content buffer types.

use crate::{dirty, ContentPath, ProductContent, ProductId, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Identity of one synchronization of a record.
///
/// The form is re-projected only when this changes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncKey {
    pub product_id: ProductId,
    pub last_synced_at: Option<Timestamp>,
}

/// The platform's copy of a product as last synchronized.
///
/// Owned by the backend; the client only holds a cached copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRecord {
    /// Unique identifier for this product
    pub id: ProductId,
    /// The editable content
    pub working_content: ProductContent,
    /// Content proposed by the generator, if any
    #[serde(default)]
    pub draft_generated_content: Option<ProductContent>,
    /// Field paths the backend considers dirty
    #[serde(default)]
    pub dirty_fields_content: Vec<ContentPath>,
    /// When the record was last synchronized with the platform
    #[serde(default)]
    pub last_synced_at: Option<Timestamp>,
    /// Legacy platform metadata (second projection priority)
    #[serde(default)]
    pub legacy_meta: Map<String, Value>,
}

impl ProductRecord {
    /// Create a new record.
    pub fn new(id: impl Into<ProductId>, working_content: ProductContent) -> Self {
        Self {
            id: id.into(),
            working_content,
            draft_generated_content: None,
            dirty_fields_content: Vec::new(),
            last_synced_at: None,
            legacy_meta: Map::new(),
        }
    }

    /// Attach a generated draft.
    pub fn with_draft(mut self, draft: ProductContent) -> Self {
        self.draft_generated_content = Some(draft);
        self
    }

    /// Attach legacy metadata.
    pub fn with_legacy_meta(mut self, legacy_meta: Map<String, Value>) -> Self {
        self.legacy_meta = legacy_meta;
        self
    }

    /// Set the synchronization timestamp.
    pub fn synced_at(mut self, timestamp: Timestamp) -> Self {
        self.last_synced_at = Some(timestamp);
        self
    }

    /// The key identifying this synchronization.
    pub fn sync_key(&self) -> SyncKey {
        SyncKey {
            product_id: self.id.clone(),
            last_synced_at: self.last_synced_at,
        }
    }
}

/// Timestamps carried by a content buffer (milliseconds since epoch).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BufferTimestamps {
    pub snapshot_at: Option<Timestamp>,
    pub working_updated_at: Option<Timestamp>,
    pub draft_generated_at: Option<Timestamp>,
}

/// The three views of a product's content held by the backend.
///
/// `dirty_fields_content` is a stored derivation: it must be a subset of the
/// paths that actually differ between working and snapshot content. Use
/// [`ContentBuffer::verified_dirty_fields`] instead of trusting it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentBuffer {
    pub product_id: ProductId,
    /// Last known platform content (comparison baseline)
    pub store_snapshot_content: ProductContent,
    pub working_content: ProductContent,
    #[serde(default)]
    pub draft_generated_content: Option<ProductContent>,
    #[serde(default)]
    pub dirty_fields_content: Vec<ContentPath>,
    #[serde(default)]
    pub timestamps: BufferTimestamps,
}

impl ContentBuffer {
    /// Create a buffer, deriving its dirty fields.
    pub fn new(
        product_id: impl Into<ProductId>,
        store_snapshot_content: ProductContent,
        working_content: ProductContent,
    ) -> Self {
        let mut buffer = Self {
            product_id: product_id.into(),
            store_snapshot_content,
            working_content,
            draft_generated_content: None,
            dirty_fields_content: Vec::new(),
            timestamps: BufferTimestamps::default(),
        };
        buffer.recompute_dirty_fields();
        buffer
    }

    /// A clean buffer whose snapshot equals the record's working content.
    pub fn from_record(record: &ProductRecord) -> Self {
        let mut buffer = Self::new(
            record.id.clone(),
            record.working_content.clone(),
            record.working_content.clone(),
        );
        buffer.draft_generated_content = record.draft_generated_content.clone();
        buffer.timestamps.snapshot_at = record.last_synced_at;
        buffer
    }

    /// Attach a generated draft.
    pub fn with_draft(mut self, draft: ProductContent, generated_at: Timestamp) -> Self {
        self.draft_generated_content = Some(draft);
        self.timestamps.draft_generated_at = Some(generated_at);
        self
    }

    /// Dirty fields derived from the current contents.
    pub fn verified_dirty_fields(&self) -> Vec<ContentPath> {
        dirty::dirty_fields(&self.working_content, &self.store_snapshot_content, 0)
    }

    /// Whether the stored dirty list satisfies the subset invariant.
    pub fn is_consistent(&self) -> bool {
        let verified = self.verified_dirty_fields();
        self.dirty_fields_content
            .iter()
            .all(|path| verified.contains(path))
    }

    /// Replace the stored dirty list with a fresh derivation.
    pub fn recompute_dirty_fields(&mut self) {
        self.dirty_fields_content = self.verified_dirty_fields();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn content(value: Value) -> ProductContent {
        ProductContent::from_value(value).unwrap()
    }

    #[test]
    fn create_record() {
        let record = ProductRecord::new("p-1", content(json!({"title": "Mug"}))).synced_at(1000);

        assert_eq!(record.id, "p-1");
        assert_eq!(record.last_synced_at, Some(1000));
        assert!(record.draft_generated_content.is_none());
        assert_eq!(
            record.sync_key(),
            SyncKey {
                product_id: "p-1".into(),
                last_synced_at: Some(1000)
            }
        );
    }

    #[test]
    fn buffer_derives_dirty_fields() {
        let buffer = ContentBuffer::new(
            "p-1",
            content(json!({"title": "Mug", "sku": "M-1"})),
            content(json!({"title": "Big mug", "sku": "M-1"})),
        );
        assert_eq!(buffer.dirty_fields_content, vec!["title"]);
        assert!(buffer.is_consistent());
    }

    #[test]
    fn stale_dirty_list_detected() {
        let mut buffer = ContentBuffer::new(
            "p-1",
            content(json!({"title": "Mug"})),
            content(json!({"title": "Mug"})),
        );
        buffer.dirty_fields_content = vec!["title".into()];
        assert!(!buffer.is_consistent());
        assert!(buffer.verified_dirty_fields().is_empty());

        buffer.recompute_dirty_fields();
        assert!(buffer.is_consistent());
    }

    #[test]
    fn from_record_is_clean() {
        let record = ProductRecord::new("p-1", content(json!({"title": "Mug"})))
            .with_draft(content(json!({"title": "Great mug"})))
            .synced_at(5);
        let buffer = ContentBuffer::from_record(&record);
        assert!(buffer.dirty_fields_content.is_empty());
        assert_eq!(buffer.timestamps.snapshot_at, Some(5));
        assert!(buffer.draft_generated_content.is_some());
    }

    #[test]
    fn serialization_roundtrip() {
        let record = ProductRecord::new("p-1", content(json!({"title": "Mug"}))).synced_at(1);
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("workingContent")); // camelCase
        let parsed: ProductRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(record, parsed);
    }
}
