//! Form state holder.
//!
//! [`FormState`] owns the live editable values of one product, the baseline
//! they are compared against, and the dirty/touched bookkeeping. It is the
//! single mutable resource of the editor: every other component reads it or
//! goes through one of its setters.

use crate::{
    content::ProductContent, error::Result, Error, FieldKey, FormSchema, ProductField,
    ProductRecord,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, BTreeSet};

/// Canonical empty document written by rich-text widgets.
pub const EMPTY_RICH_TEXT_DOCUMENT: &str = "<p></p>";

/// Live form values keyed by flat form key.
///
/// Uses BTreeMap for deterministic serialization order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormValues(BTreeMap<FieldKey, Value>);

impl FormValues {
    /// Create empty values.
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Every known field at its default value.
    pub fn defaults() -> Self {
        Self(
            ProductField::ALL
                .into_iter()
                .map(|f| (f.form_key().to_string(), f.default_value()))
                .collect(),
        )
    }

    /// Project a record into form values.
    ///
    /// Each field takes the first non-null value of: working content,
    /// legacy metadata, field default.
    pub fn project(record: &ProductRecord) -> Self {
        Self::project_content(&record.working_content, &record.legacy_meta)
    }

    /// [`project`](Self::project) from loose parts.
    pub fn project_content(content: &ProductContent, legacy_meta: &Map<String, Value>) -> Self {
        let values = ProductField::ALL
            .into_iter()
            .map(|field| {
                let from_content = field
                    .content_path()
                    .and_then(|path| content.get_path(path))
                    .filter(|v| !v.is_null());
                let from_legacy = field
                    .legacy_meta_key()
                    .and_then(|key| legacy_meta.get(key))
                    .filter(|v| !v.is_null());
                let value = from_content
                    .or(from_legacy)
                    .cloned()
                    .unwrap_or_else(|| field.default_value());
                (field.form_key().to_string(), value)
            })
            .collect();
        Self(values)
    }

    /// Get a value by form key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Get a value by field.
    pub fn field(&self, field: ProductField) -> Option<&Value> {
        self.0.get(field.form_key())
    }

    /// Set a value by form key.
    pub fn set(&mut self, key: impl Into<FieldKey>, value: Value) {
        self.0.insert(key.into(), value);
    }

    /// Iterate over `(key, value)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&FieldKey, &Value)> {
        self.0.iter()
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if there are no keys.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Write every content-backed field into `content`.
    pub fn apply_to(&self, content: &mut ProductContent) {
        for field in ProductField::ALL {
            let (Some(path), Some(value)) = (field.content_path(), self.field(field)) else {
                continue;
            };
            content.set_path(path, value.clone());
        }
    }

    /// Content equal to `base` overlaid with these values.
    pub fn to_content(&self, base: &ProductContent) -> ProductContent {
        let mut content = base.clone();
        self.apply_to(&mut content);
        content
    }

    /// `base` with every known field present here written over it.
    ///
    /// Keys that name no [`ProductField`] are dropped, so a partial or stale
    /// snapshot never removes fields or adds foreign ones.
    pub fn overlay_onto(&self, base: &FormValues) -> FormValues {
        let mut merged = base.clone();
        for (key, value) in &self.0 {
            if ProductField::from_form_key(key).is_some() {
                merged.set(key.clone(), value.clone());
            }
        }
        merged
    }

    /// Serialize to a JSON object.
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.0
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    /// Deserialize from a JSON object.
    pub fn from_json(value: Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| Error::InvalidSnapshot(e.to_string()))
    }
}

impl FromIterator<(FieldKey, Value)> for FormValues {
    fn from_iter<I: IntoIterator<Item = (FieldKey, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// How a single `set_value` call affects bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SetOptions {
    /// Recompute the field's dirty flag against the baseline
    pub should_dirty: bool,
    /// Record the field as touched by the user
    pub should_touch: bool,
}

impl SetOptions {
    /// Options for an edit made by the user.
    pub fn user() -> Self {
        Self {
            should_dirty: true,
            should_touch: true,
        }
    }

    /// Options for a programmatic write that leaves bookkeeping alone.
    pub fn silent() -> Self {
        Self::default()
    }
}

/// The live form for one product.
#[derive(Debug, Clone, Default)]
pub struct FormState {
    values: FormValues,
    defaults: FormValues,
    dirty: BTreeSet<FieldKey>,
    touched: BTreeSet<FieldKey>,
    pending_normalization: bool,
    revision: u64,
    reset_generation: u64,
}

impl FormState {
    /// Create an empty form.
    pub fn new() -> Self {
        Self::default()
    }

    /// Full reset: values and baseline are both replaced.
    pub fn reset(&mut self, values: FormValues) {
        self.defaults = values.clone();
        self.values = values;
        self.dirty.clear();
        self.touched.clear();
        self.pending_normalization = true;
        self.revision += 1;
        self.reset_generation += 1;
    }

    /// Replace the baseline only; values stay as they are.
    ///
    /// Fields still differing from the new baseline stay dirty and touched.
    pub fn reset_baseline(&mut self, baseline: FormValues) {
        self.defaults = baseline;
        self.dirty = self.differing_keys();
        self.touched.retain(|key| self.dirty.contains(key));
        self.revision += 1;
        self.reset_generation += 1;
    }

    /// Replace every value, keeping the baseline.
    ///
    /// Used by restores: the whole state is swapped in, never patched. The
    /// widgets rebind, so normalization is queued again.
    pub fn replace_values(&mut self, values: FormValues) {
        self.values = values;
        self.dirty = self.differing_keys();
        self.touched = self.dirty.clone();
        self.pending_normalization = true;
        self.revision += 1;
    }

    /// Set one value. Returns whether the stored value changed.
    pub fn set_value(&mut self, key: &str, value: Value, options: SetOptions) -> bool {
        let changed = self.values.get(key) != Some(&value);
        self.values.set(key, value);

        if options.should_dirty {
            if self.values.get(key) == self.defaults.get(key) {
                self.dirty.remove(key);
            } else {
                self.dirty.insert(key.to_string());
            }
        }
        if options.should_touch {
            self.touched.insert(key.to_string());
        }
        if changed {
            self.revision += 1;
        }
        changed
    }

    /// Set one value and move its baseline with it.
    ///
    /// The field ends clean and untouched. Returns whether the stored value
    /// changed.
    pub fn adopt_value(&mut self, key: &str, value: Value) -> bool {
        let changed = self.values.get(key) != Some(&value);
        self.defaults.set(key, value.clone());
        self.values.set(key, value);
        self.dirty.remove(key);
        self.touched.remove(key);
        if changed {
            self.revision += 1;
        }
        changed
    }

    /// Whether a normalization pass is queued after the last reset.
    pub fn needs_normalization(&self) -> bool {
        self.pending_normalization
    }

    /// Run the binding layer's normalization pass.
    ///
    /// Empty rich-text values are rewritten into the canonical empty
    /// document, and the rewrite is flagged dirty exactly like an edit.
    /// Returns the rewritten keys.
    pub fn run_normalization(&mut self) -> Vec<FieldKey> {
        self.pending_normalization = false;
        let mut rewritten = Vec::new();
        for field in ProductField::ALL.into_iter().filter(|f| f.is_rich_text()) {
            let key = field.form_key();
            let needs_rewrite = match self.values.get(key) {
                Some(Value::String(s)) => s.trim().is_empty(),
                Some(Value::Null) => true,
                _ => false,
            };
            if needs_rewrite {
                let options = SetOptions {
                    should_dirty: true,
                    should_touch: false,
                };
                self.set_value(key, json!(EMPTY_RICH_TEXT_DOCUMENT), options);
                rewritten.push(key.to_string());
            }
        }
        rewritten
    }

    /// Fold untouched dirty fields into the baseline.
    ///
    /// Called once the form has settled: anything dirty that the user never
    /// touched came from normalization. Returns the number of fields absorbed.
    pub fn absorb_normalization(&mut self) -> usize {
        let artifacts: Vec<FieldKey> = self
            .dirty
            .iter()
            .filter(|key| !self.touched.contains(*key))
            .cloned()
            .collect();
        for key in &artifacts {
            if let Some(value) = self.values.get(key).cloned() {
                self.defaults.set(key.clone(), value);
            }
            self.dirty.remove(key);
        }
        artifacts.len()
    }

    /// Get a value by key.
    pub fn value(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// All live values.
    pub fn values(&self) -> &FormValues {
        &self.values
    }

    /// The baseline values are compared against.
    pub fn defaults(&self) -> &FormValues {
        &self.defaults
    }

    /// Whether any field is dirty, as the binding layer reports it.
    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Dirty keys in key order.
    pub fn dirty_fields(&self) -> &BTreeSet<FieldKey> {
        &self.dirty
    }

    /// Whether the user touched a field since the last reset.
    pub fn is_touched(&self, key: &str) -> bool {
        self.touched.contains(key)
    }

    /// Incremented on every value change.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Incremented on every reset of the baseline.
    pub fn reset_generation(&self) -> u64 {
        self.reset_generation
    }

    /// Validate live values against a schema.
    pub fn validate(&self, schema: &FormSchema) -> Result<()> {
        schema.validate(&self.values)
    }

    fn differing_keys(&self) -> BTreeSet<FieldKey> {
        self.values
            .iter()
            .map(|(k, _)| k)
            .chain(self.defaults.iter().map(|(k, _)| k))
            .filter(|key| self.values.get(key) != self.defaults.get(key))
            .cloned()
            .collect()
    }
}
