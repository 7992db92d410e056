//! Version records.
//!
//! The engine only decides *when* a version should be written and *what* it
//! contains; persistence belongs to the session's version store, which assigns
//! ids and creation times.

use crate::{error::Result, Error, FormValues, ProductId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Version of the stored form snapshot format.
pub const FORM_SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// What caused a version to be written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    ManualSave,
    AiApproval,
}

impl TriggerType {
    /// Wire name, as stored.
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerType::ManualSave => "manual_save",
            TriggerType::AiApproval => "ai_approval",
        }
    }

    /// Parse a stored wire name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "manual_save" => Some(TriggerType::ManualSave),
            "ai_approval" => Some(TriggerType::AiApproval),
            _ => None,
        }
    }
}

impl std::fmt::Display for TriggerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Full form values as persisted in a version record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormSnapshot {
    pub format_version: u32,
    pub values: FormValues,
}

impl FormSnapshot {
    pub fn new(values: FormValues) -> Self {
        Self {
            format_version: FORM_SNAPSHOT_FORMAT_VERSION,
            values,
        }
    }

    /// Serialize to a JSON value.
    pub fn to_value(&self) -> Result<Value> {
        serde_json::to_value(self).map_err(|e| Error::InvalidSnapshot(e.to_string()))
    }

    /// Deserialize a stored snapshot.
    ///
    /// Bare form-value objects (no format header) are accepted as format 0.
    pub fn from_value(value: Value) -> Result<Self> {
        let is_versioned = value
            .as_object()
            .is_some_and(|map| map.contains_key("formatVersion") && map.contains_key("values"));
        if !is_versioned {
            return Ok(Self {
                format_version: 0,
                values: FormValues::from_json(value)?,
            });
        }

        let snapshot: Self =
            serde_json::from_value(value).map_err(|e| Error::InvalidSnapshot(e.to_string()))?;
        if snapshot.format_version > FORM_SNAPSHOT_FORMAT_VERSION {
            return Err(Error::InvalidSnapshot(format!(
                "unsupported snapshot format version: {} (max supported: {})",
                snapshot.format_version, FORM_SNAPSHOT_FORMAT_VERSION
            )));
        }
        Ok(snapshot)
    }
}

/// A version the engine wants persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewVersion {
    pub product_id: ProductId,
    pub form_snapshot: FormSnapshot,
    pub trigger_type: TriggerType,
}

impl NewVersion {
    /// A version written by a successful save.
    pub fn manual_save(product_id: impl Into<ProductId>, values: FormValues) -> Self {
        Self {
            product_id: product_id.into(),
            form_snapshot: FormSnapshot::new(values),
            trigger_type: TriggerType::ManualSave,
        }
    }

    /// A version written when a draft proposal is accepted.
    pub fn ai_approval(product_id: impl Into<ProductId>, values: FormValues) -> Self {
        Self {
            product_id: product_id.into(),
            form_snapshot: FormSnapshot::new(values),
            trigger_type: TriggerType::AiApproval,
        }
    }
}
