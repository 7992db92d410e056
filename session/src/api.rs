//! Collaborators the session talks to.
//!
//! Implementations live with the host (an HTTP client, a platform SDK, test
//! fakes). The traits are object safe so sessions can hold them as
//! `Arc<dyn ..>`.

use async_trait::async_trait;
use quill_engine::{ContentBuffer, FormValues, ProductContent, ProductRecord};

/// Errors reported by collaborators.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Not found: {0}")]
    NotFound(String),
}

/// Product content on the platform and in the content buffer.
#[async_trait]
pub trait ProductApi: Send + Sync {
    /// Load the cached product record.
    async fn fetch_product(&self, product_id: &str) -> Result<ProductRecord, ApiError>;

    /// Load the content buffer, if the product has one.
    async fn fetch_content_buffer(
        &self,
        product_id: &str,
    ) -> Result<Option<ContentBuffer>, ApiError>;

    /// Fetch the product's current content straight from the platform.
    async fn fetch_remote_content(&self, product_id: &str) -> Result<ProductContent, ApiError>;

    /// Persist the form values to the platform.
    async fn save_product(&self, product_id: &str, values: &FormValues) -> Result<(), ApiError>;
}

/// Saves nested sub-records (variations) edited outside the main form.
#[async_trait]
pub trait SubRecordSaver: Send + Sync {
    async fn save_sub_records(&self, product_id: &str, ids: &[String]) -> Result<(), ApiError>;
}
