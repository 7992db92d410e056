//! Structured product content.
//!
//! Content is kept as a JSON object, the same shape the storefront platform
//! exchanges, with helpers for dotted paths such as `seo.title`.

use crate::{error::Result, Error};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Rich-text documents the editor widgets treat as empty.
const EMPTY_RICH_TEXT: [&str; 3] = ["<p></p>", "<p><br></p>", "<p><br/></p>"];

/// The editable content object of a product.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductContent(Map<String, Value>);

impl ProductContent {
    /// Create empty content.
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Build content from a JSON value, which must be an object.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(Error::InvalidContent(format!(
                "content must be an object, got {}",
                crate::schema::json_type_name(&other)
            ))),
        }
    }

    /// Get a top-level value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Set a top-level value.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    /// Get a value by dotted path.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.0.get(first)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    /// Set a value by dotted path, creating intermediate objects.
    ///
    /// Non-object intermediates are replaced by objects.
    pub fn set_path(&mut self, path: &str, value: Value) {
        let mut segments = path.split('.').peekable();
        let mut current = &mut self.0;
        while let Some(segment) = segments.next() {
            if segments.peek().is_none() {
                current.insert(segment.to_string(), value);
                return;
            }
            let slot = current
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            current = match slot {
                Value::Object(map) => map,
                _ => return,
            };
        }
    }

    /// Top-level keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    /// Number of top-level keys.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if there are no top-level keys.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrow the underlying object.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Convert into a JSON value.
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for ProductContent {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Whether a value carries no content.
///
/// `null`, empty strings, empty collections and empty rich-text documents
/// are all blank; they compare equal to each other and to a missing value.
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => {
            let trimmed = s.trim();
            trimmed.is_empty() || EMPTY_RICH_TEXT.contains(&trimmed)
        }
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.values().all(is_blank),
        Value::Bool(_) | Value::Number(_) => false,
    }
}
