//! Conflict detection between local edits and the platform.
//!
//! A conflict is a dirty field whose platform value also moved since the
//! snapshot the user's edits were based on. Detection is a pure function of
//! (dirty fields, synced snapshot, freshly fetched remote, working content).

use crate::{dirty, ContentPath, ProductContent};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How the user settles a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Resolution {
    /// Keep the working value; the remote value becomes the new baseline
    KeepLocal,
    /// Replace the working value with the remote value
    TakeRemote,
}

/// One conflicting field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldConflict {
    /// Top-level content path
    pub field: ContentPath,
    /// Working copy value
    pub local_value: Value,
    /// Current platform value
    pub remote_value: Value,
}

/// Result of a conflict check.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictSet {
    pub has_conflict: bool,
    pub conflicts: Vec<FieldConflict>,
}

impl ConflictSet {
    /// A set with no conflicts.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a set from detected conflicts.
    pub fn from_conflicts(conflicts: Vec<FieldConflict>) -> Self {
        Self {
            has_conflict: !conflicts.is_empty(),
            conflicts,
        }
    }

    pub fn len(&self) -> usize {
        self.conflicts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conflicts.is_empty()
    }

    /// Get the conflict for a field.
    pub fn get(&self, field: &str) -> Option<&FieldConflict> {
        self.conflicts.iter().find(|c| c.field == field)
    }

    /// Whether a field is in conflict.
    pub fn contains(&self, field: &str) -> bool {
        self.get(field).is_some()
    }

    /// Remove a field's conflict, keeping `has_conflict` in step.
    pub fn remove(&mut self, field: &str) -> Option<FieldConflict> {
        let index = self.conflicts.iter().position(|c| c.field == field)?;
        let conflict = self.conflicts.remove(index);
        self.has_conflict = !self.conflicts.is_empty();
        Some(conflict)
    }

    /// Conflicting field paths.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.conflicts.iter().map(|c| c.field.as_str())
    }
}

/// Detect conflicts for the given dirty fields.
///
/// A field conflicts when `remote` no longer matches `synced` for it. The
/// synthetic variations path never conflicts; sub-records are saved separately.
pub fn detect_conflicts(
    dirty_fields: &[ContentPath],
    synced: &ProductContent,
    remote: &ProductContent,
    working: &ProductContent,
) -> ConflictSet {
    let conflicts = dirty_fields
        .iter()
        .filter(|field| field.as_str() != dirty::VARIATIONS_PATH)
        .filter(|field| !dirty::values_equivalent(field, synced.get(field), remote.get(field)))
        .map(|field| FieldConflict {
            field: field.clone(),
            local_value: working.get(field).cloned().unwrap_or(Value::Null),
            remote_value: remote.get(field).cloned().unwrap_or(Value::Null),
        })
        .collect();
    ConflictSet::from_conflicts(conflicts)
}
