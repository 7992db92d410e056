//! Editor - the per-product editing state container.
//!
//! The Editor composes the form, draft, history and guards for one product
//! and routes every mutation through them in the right order. Like the rest
//! of the engine it performs no IO and reads no clock: callers pass `now`,
//! and drive deadlines by calling [`Editor::tick`] at [`Editor::next_deadline`].

use crate::{
    conflict::{self, ConflictSet, Resolution},
    dirty,
    draft::{AcceptOutcome, DraftReconciler},
    error::Result,
    guard::{self, FormStability, GuardConfig, SaveGuard},
    history::{FormHistory, HistoryConfig, INITIAL_LABEL, VERSION_RESTORED_LABEL},
    ContentBuffer, ContentPath, Error, FieldKey, FormSchema, FormState, FormValues, NewVersion,
    ProductContent, ProductField, ProductId, ProductRecord, SetOptions, SnapshotId, SyncKey,
    Timestamp,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Editor tuning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorConfig {
    pub history: HistoryConfig,
    pub guard: GuardConfig,
}

/// Why an external update did not reset the form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SuppressReason {
    /// A save is in flight or its refetches are still settling
    SaveInFlight,
    /// A restore is being applied
    Restoring,
}

/// Outcome of [`Editor::apply_external`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "reason", rename_all = "camelCase")]
pub enum ExternalUpdate {
    /// The form was reset from the new record
    Applied,
    /// Same synchronization as the one already applied
    Unchanged,
    /// A new synchronization arrived while a reset was not allowed
    Suppressed(SuppressReason),
}

/// What a call to [`Editor::tick`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Keys rewritten by the normalization pass
    pub normalized: Vec<FieldKey>,
    /// Snapshot captured by the history debounce
    pub captured: Option<SnapshotId>,
    /// The form just became stable
    pub stabilized: bool,
    /// Normalization artifacts folded into the baseline on stabilizing
    pub absorbed: usize,
    /// The post-save guard just disarmed
    pub guard_released: bool,
}

impl TickReport {
    /// Whether nothing happened.
    pub fn is_empty(&self) -> bool {
        self == &TickReport::default()
    }
}

/// Editing state for one product.
#[derive(Debug, Clone)]
pub struct Editor {
    config: EditorConfig,
    schema: FormSchema,
    record: Option<ProductRecord>,
    /// Comparison baseline for dirty fields and conflicts
    store_snapshot: ProductContent,
    form: FormState,
    drafts: DraftReconciler,
    history: FormHistory,
    stability: FormStability,
    save_guard: SaveGuard,
    sub_records: BTreeSet<String>,
    applied_sync_key: Option<SyncKey>,
    conflicts: ConflictSet,
    conflict_revision: u64,
    normalize_due: Option<Timestamp>,
}

impl Default for Editor {
    fn default() -> Self {
        Self::new(EditorConfig::default())
    }
}

impl Editor {
    /// Create an editor with the product schema and nothing loaded.
    pub fn new(config: EditorConfig) -> Self {
        Self::with_schema(config, FormSchema::product())
    }

    /// Create an editor validating against a custom schema.
    pub fn with_schema(config: EditorConfig, schema: FormSchema) -> Self {
        Self {
            config,
            schema,
            record: None,
            store_snapshot: ProductContent::new(),
            form: FormState::new(),
            drafts: DraftReconciler::new(),
            history: FormHistory::new(config.history),
            stability: FormStability::default(),
            save_guard: SaveGuard::default(),
            sub_records: BTreeSet::new(),
            applied_sync_key: None,
            conflicts: ConflictSet::empty(),
            conflict_revision: 0,
            normalize_due: None,
        }
    }

    // ------------------------------------------------------------------
    // Loading and external updates
    // ------------------------------------------------------------------

    /// Load a product.
    ///
    /// The store snapshot comes from `buffer` when given, else from the
    /// record's working content. Everything from a previous product is
    /// dropped.
    pub fn load(
        &mut self,
        record: ProductRecord,
        buffer: Option<ContentBuffer>,
        now: Timestamp,
    ) -> Result<()> {
        check_buffer(&record, buffer.as_ref())?;
        self.sub_records.clear();
        self.save_guard.disarm();
        self.reset_from(record, buffer, now);
        Ok(())
    }

    /// Apply a refetched record.
    ///
    /// The form is reset only when the record's sync key changed and neither
    /// a save nor a restore is in progress. Suppressed updates still become
    /// the cached record and the applied sync key, so they never trigger a
    /// late reset once the guard clears.
    pub fn apply_external(
        &mut self,
        record: ProductRecord,
        buffer: Option<ContentBuffer>,
        now: Timestamp,
    ) -> Result<ExternalUpdate> {
        check_buffer(&record, buffer.as_ref())?;
        let key = record.sync_key();

        let suppress = if self.applied_sync_key.as_ref() == Some(&key) {
            None
        } else if self.save_guard.is_armed() {
            Some(SuppressReason::SaveInFlight)
        } else if self.history.is_restoring() {
            Some(SuppressReason::Restoring)
        } else {
            if self.product_id() != Some(record.id.as_str()) {
                self.sub_records.clear();
            }
            self.reset_from(record, buffer, now);
            return Ok(ExternalUpdate::Applied);
        };

        self.adopt_draft(incoming_draft(&record, buffer.as_ref()));
        self.applied_sync_key = Some(key);
        self.record = Some(record);
        Ok(match suppress {
            Some(reason) => ExternalUpdate::Suppressed(reason),
            None => ExternalUpdate::Unchanged,
        })
    }

    fn reset_from(&mut self, record: ProductRecord, buffer: Option<ContentBuffer>, now: Timestamp) {
        let values = FormValues::project(&record);
        self.form.reset(values.clone());
        self.normalize_due = Some(now);

        self.history.reset();
        self.history.capture(values, INITIAL_LABEL, now);
        self.history.mark_as_saved();

        self.drafts.set_draft(incoming_draft(&record, buffer.as_ref()));
        self.store_snapshot = match buffer {
            Some(buffer) => buffer.store_snapshot_content,
            None => record.working_content.clone(),
        };

        self.conflicts = ConflictSet::empty();
        self.conflict_revision += 1;
        self.stability.on_reset(now, &self.config.guard);
        self.applied_sync_key = Some(record.sync_key());
        self.record = Some(record);
    }

    fn adopt_draft(&mut self, draft: Option<ProductContent>) {
        if draft.as_ref() != self.drafts.draft() {
            self.drafts.set_draft(draft);
        }
    }

    /// Install a freshly generated draft.
    pub fn set_draft(&mut self, draft: Option<ProductContent>) {
        self.drafts.set_draft(draft);
    }

    // ------------------------------------------------------------------
    // Editing
    // ------------------------------------------------------------------

    /// A user edit. Returns whether the value changed.
    pub fn set_value(&mut self, key: &str, value: Value, now: Timestamp) -> Result<bool> {
        self.require_loaded()?;
        ProductField::parse_form_key(key)?;
        let changed = self.form.set_value(key, value, SetOptions::user());
        if changed {
            self.history.note_change(now);
        }
        Ok(changed)
    }

    /// Accept a draft proposal.
    ///
    /// Returns the `ai_approval` version to persist, or `None` when there
    /// was nothing to accept.
    pub fn accept_field(
        &mut self,
        field: ProductField,
        override_value: Option<Value>,
        now: Timestamp,
    ) -> Result<Option<NewVersion>> {
        let product_id = self.require_loaded()?.to_string();
        match self.drafts.accept_field(field, override_value, &mut self.form) {
            AcceptOutcome::Applied { .. } => {
                self.history.note_change(now);
                Ok(Some(NewVersion::ai_approval(
                    product_id,
                    self.form.values().clone(),
                )))
            }
            AcceptOutcome::NoOp => Ok(None),
        }
    }

    /// [`accept_field`](Self::accept_field) by content path.
    pub fn accept_path(
        &mut self,
        path: &str,
        override_value: Option<Value>,
        now: Timestamp,
    ) -> Result<Option<NewVersion>> {
        let field = ProductField::parse_content_path(path)?;
        self.accept_field(field, override_value, now)
    }

    /// Reject a draft proposal. Returns whether it was open.
    pub fn reject_field(&mut self, field: ProductField) -> bool {
        self.drafts.reject_field(field)
    }

    /// [`reject_field`](Self::reject_field) by content path.
    pub fn reject_path(&mut self, path: &str) -> Result<bool> {
        self.drafts.reject_path(path)
    }

    // ------------------------------------------------------------------
    // History
    // ------------------------------------------------------------------

    /// Undo. Returns false at the oldest entry.
    ///
    /// On success the editor is Restoring until [`finish_restore`](Self::finish_restore).
    pub fn undo(&mut self, now: Timestamp) -> bool {
        self.history.flush_pending(self.form.values(), now);
        match self.history.undo() {
            Some(values) => {
                self.form.replace_values(values);
                true
            }
            None => false,
        }
    }

    /// Redo. Returns false at the newest entry.
    pub fn redo(&mut self, now: Timestamp) -> bool {
        self.history.flush_pending(self.form.values(), now);
        match self.history.redo() {
            Some(values) => {
                self.form.replace_values(values);
                true
            }
            None => false,
        }
    }

    /// Restore values from a persisted version through the Restoring path.
    ///
    /// The snapshot is laid over the current values: fields it lacks keep
    /// their current value and unknown keys are ignored.
    pub fn restore_version(&mut self, values: FormValues, now: Timestamp) -> Result<()> {
        self.require_loaded()?;
        self.history.flush_pending(self.form.values(), now);
        let restored = values.overlay_onto(self.form.values());
        self.history
            .begin_restore(Some(VERSION_RESTORED_LABEL.to_string()));
        self.form.replace_values(restored);
        Ok(())
    }

    /// Leave Restoring once the restored values have propagated.
    ///
    /// The normalization pass queued by the restore runs first, so its
    /// rewrites are never captured as an edit.
    pub fn finish_restore(&mut self, now: Timestamp) -> bool {
        if !self.history.is_restoring() {
            return false;
        }
        if self.form.needs_normalization() {
            self.form.run_normalization();
            self.normalize_due = None;
        }
        self.history.finish_restore(self.form.values(), now)
    }

    /// Capture a labelled snapshot now.
    pub fn capture_snapshot(&mut self, label: &str, now: Timestamp) -> Option<SnapshotId> {
        self.history.capture(self.form.values().clone(), label, now)
    }

    /// Mark the current history entry as saved.
    pub fn mark_as_saved(&mut self) {
        self.history.mark_as_saved();
    }

    // ------------------------------------------------------------------
    // Timers
    // ------------------------------------------------------------------

    /// Run everything due at `now`.
    pub fn tick(&mut self, now: Timestamp) -> TickReport {
        let mut report = TickReport::default();

        let normalize = self.normalize_due.is_some_and(|due| due <= now);
        if normalize && !self.history.is_restoring() {
            self.normalize_due = None;
            if self.form.needs_normalization() {
                report.normalized = self.form.run_normalization();
            }
        }

        report.captured = self.history.flush_due(now, self.form.values());

        if self.stability.tick(now) {
            report.stabilized = true;
            report.absorbed = self.form.absorb_normalization();
        }

        report.guard_released = self.save_guard.tick(now);
        report
    }

    /// The earliest pending deadline.
    ///
    /// Normalization waits for a restore to finish, so it is not reported
    /// while one is in progress.
    pub fn next_deadline(&self) -> Option<Timestamp> {
        [
            self.normalize_due.filter(|_| !self.history.is_restoring()),
            self.history.next_deadline(),
            self.stability.deadline(),
            self.save_guard.deadline(),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    /// Cancel every pending deadline.
    pub fn teardown(&mut self) {
        self.history.cancel_pending();
        self.stability.cancel();
        self.save_guard.disarm();
        self.normalize_due = None;
    }

    // ------------------------------------------------------------------
    // Derived state
    // ------------------------------------------------------------------

    /// The record's content overlaid with the live form values.
    pub fn working_content(&self) -> ProductContent {
        let base = self
            .record
            .as_ref()
            .map(|r| &r.working_content)
            .unwrap_or(&self.store_snapshot);
        self.form.values().to_content(base)
    }

    /// The store snapshot as the form would see it: every form-backed
    /// field present, with legacy metadata and defaults filled in.
    fn baseline_content(&self) -> ProductContent {
        let values = match &self.record {
            Some(record) => FormValues::project_content(&self.store_snapshot, &record.legacy_meta),
            None => FormValues::project_content(&self.store_snapshot, &Map::new()),
        };
        values.to_content(&self.store_snapshot)
    }

    /// Top-level paths differing from the store snapshot, plus the
    /// variations path when sub-records are dirty.
    pub fn dirty_fields(&self) -> Vec<ContentPath> {
        dirty::dirty_fields(
            &self.working_content(),
            &self.baseline_content(),
            self.sub_records.len(),
        )
    }

    /// Dirty flag shown to the user; false until the form is stable.
    pub fn reported_dirty(&self) -> bool {
        guard::reported_dirty(&self.stability, self.form.is_dirty())
    }

    /// Whether saving would persist anything.
    ///
    /// Dirty sub-records count even with no dirty top-level field.
    pub fn has_unsaved_changes(&self) -> bool {
        self.reported_dirty() || !self.sub_records.is_empty()
    }

    /// Open draft proposals.
    pub fn remaining_proposals(&self) -> Vec<ProductField> {
        self.drafts.remaining_proposals()
    }

    // ------------------------------------------------------------------
    // Sub-records
    // ------------------------------------------------------------------

    /// Record a modified sub-record. Returns whether it was new.
    pub fn mark_sub_record_dirty(&mut self, id: impl Into<String>) -> bool {
        self.sub_records.insert(id.into())
    }

    pub fn clear_sub_records(&mut self) {
        self.sub_records.clear();
    }

    pub fn dirty_sub_records(&self) -> Vec<String> {
        self.sub_records.iter().cloned().collect()
    }

    // ------------------------------------------------------------------
    // Conflicts
    // ------------------------------------------------------------------

    /// Compare freshly fetched platform content against the store snapshot.
    pub fn detect_conflicts(&mut self, remote: &ProductContent) -> &ConflictSet {
        let working = self.working_content();
        let dirty = self.dirty_fields();
        self.conflicts =
            conflict::detect_conflicts(&dirty, &self.store_snapshot, remote, &working);
        self.conflict_revision += 1;
        &self.conflicts
    }

    /// Settle one conflict. Returns false if the field was not in conflict.
    ///
    /// Either way the remote value becomes the field's baseline, so the same
    /// remote change is not reported again.
    pub fn resolve_conflict(
        &mut self,
        field: &str,
        resolution: Resolution,
        now: Timestamp,
    ) -> Result<bool> {
        let Some(conflict) = self.conflicts.remove(field) else {
            return Ok(false);
        };
        self.conflict_revision += 1;

        if resolution == Resolution::TakeRemote {
            let mut remote = ProductContent::new();
            remote.set(conflict.field.clone(), conflict.remote_value.clone());
            let mut changed = false;
            for product_field in ProductField::under_top_level(&conflict.field) {
                let Some(path) = product_field.content_path() else {
                    continue;
                };
                let value = remote
                    .get_path(path)
                    .cloned()
                    .unwrap_or_else(|| product_field.default_value());
                changed |= self.form.adopt_value(product_field.form_key(), value);
            }
            if changed {
                self.history.note_change(now);
            }
        }

        self.store_snapshot.set(conflict.field, conflict.remote_value);
        Ok(true)
    }

    /// Conflicts still awaiting a decision.
    pub fn unresolved_conflicts(&self) -> &ConflictSet {
        &self.conflicts
    }

    /// Drop the conflict set, e.g. when a conflict check failed.
    pub fn clear_conflicts(&mut self) {
        self.conflicts = ConflictSet::empty();
        self.conflict_revision += 1;
    }

    // ------------------------------------------------------------------
    // Saving
    // ------------------------------------------------------------------

    /// Validate and arm the post-save guard. Returns the values to persist.
    ///
    /// Validation failures leave the guard disarmed.
    pub fn begin_save(&mut self, now: Timestamp) -> Result<FormValues> {
        self.require_loaded()?;
        self.form.validate(&self.schema)?;
        self.history.flush_pending(self.form.values(), now);
        self.save_guard.arm();
        Ok(self.form.values().clone())
    }

    /// Post-process a successful save of `saved`.
    ///
    /// Re-baselines the form to the saved values (edits made while the save
    /// was in flight stay dirty), marks history saved and starts the guard's
    /// release. Sub-records are cleared only if they were saved too.
    pub fn complete_save(
        &mut self,
        saved: FormValues,
        sub_records_saved: bool,
        now: Timestamp,
    ) -> Result<NewVersion> {
        let product_id = self.require_loaded()?.to_string();

        self.form.reset_baseline(saved.clone());
        let saved_content = saved.to_content(&self.store_snapshot);
        if let Some(record) = self.record.as_mut() {
            record.working_content = saved_content.clone();
        }
        self.store_snapshot = saved_content;
        if sub_records_saved {
            self.sub_records.clear();
        }
        self.conflicts = ConflictSet::empty();
        self.conflict_revision += 1;

        self.history.mark_as_saved();
        self.save_guard
            .release_after_success(now, &self.config.guard);
        Ok(NewVersion::manual_save(product_id, saved))
    }

    /// Disarm after a failed save. The form stays dirty.
    pub fn abort_save(&mut self) {
        self.save_guard.disarm();
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn schema(&self) -> &FormSchema {
        &self.schema
    }

    pub fn is_loaded(&self) -> bool {
        self.record.is_some()
    }

    pub fn product_id(&self) -> Option<&str> {
        self.record.as_ref().map(|r| r.id.as_str())
    }

    pub fn record(&self) -> Option<&ProductRecord> {
        self.record.as_ref()
    }

    pub fn store_snapshot(&self) -> &ProductContent {
        &self.store_snapshot
    }

    pub fn form(&self) -> &FormState {
        &self.form
    }

    pub fn values(&self) -> &FormValues {
        self.form.values()
    }

    pub fn drafts(&self) -> &DraftReconciler {
        &self.drafts
    }

    pub fn history(&self) -> &FormHistory {
        &self.history
    }

    pub fn stability(&self) -> &FormStability {
        &self.stability
    }

    pub fn save_guard(&self) -> &SaveGuard {
        &self.save_guard
    }

    pub fn applied_sync_key(&self) -> Option<&SyncKey> {
        self.applied_sync_key.as_ref()
    }

    /// Incremented whenever the conflict set changes.
    pub fn conflict_revision(&self) -> u64 {
        self.conflict_revision
    }

    fn require_loaded(&self) -> Result<&ProductId> {
        self.record.as_ref().map(|r| &r.id).ok_or(Error::NotLoaded)
    }
}

fn check_buffer(record: &ProductRecord, buffer: Option<&ContentBuffer>) -> Result<()> {
    match buffer {
        Some(buffer) if buffer.product_id != record.id => Err(Error::InvalidContent(format!(
            "content buffer for {} does not belong to product {}",
            buffer.product_id, record.id
        ))),
        _ => Ok(()),
    }
}

fn incoming_draft(
    record: &ProductRecord,
    buffer: Option<&ContentBuffer>,
) -> Option<ProductContent> {
    buffer
        .and_then(|b| b.draft_generated_content.clone())
        .or_else(|| record.draft_generated_content.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TriggerType;
    use serde_json::json;

    fn content(value: Value) -> ProductContent {
        ProductContent::from_value(value).unwrap()
    }

    fn record(synced_at: Timestamp) -> ProductRecord {
        ProductRecord::new(
            "p-1",
            content(json!({
                "title": "Mug",
                "description": "",
                "regular_price": "12.00",
                "seo": {"title": "Mug", "description": ""},
            })),
        )
        .synced_at(synced_at)
    }

    fn loaded() -> Editor {
        let mut editor = Editor::default();
        editor.load(record(1), None, 0).unwrap();
        editor
    }

    fn settled() -> Editor {
        let mut editor = loaded();
        editor.tick(0);
        editor.tick(500);
        editor
    }

    #[test]
    fn operations_require_a_loaded_product() {
        let mut editor = Editor::default();
        assert_eq!(
            editor.set_value("title", json!("x"), 0),
            Err(Error::NotLoaded)
        );
        assert_eq!(editor.begin_save(0), Err(Error::NotLoaded));
    }

    #[test]
    fn load_captures_initial_saved_snapshot() {
        let editor = loaded();
        assert_eq!(editor.history().len(), 1);
        assert_eq!(editor.history().current().unwrap().label, INITIAL_LABEL);
        assert!(editor.history().is_at_saved_state());
        assert!(!editor.stability().is_stable());
        assert_eq!(editor.next_deadline(), Some(0));
    }

    #[test]
    fn load_rejects_foreign_buffer() {
        let mut editor = Editor::default();
        let buffer = ContentBuffer::new("p-2", ProductContent::new(), ProductContent::new());
        assert!(matches!(
            editor.load(record(1), Some(buffer), 0),
            Err(Error::InvalidContent(_))
        ));
    }

    #[test]
    fn normalization_is_never_reported_dirty() {
        let mut editor = loaded();

        let report = editor.tick(0);
        assert_eq!(report.normalized, vec!["description", "shortDescription"]);
        assert!(editor.form().is_dirty());
        assert!(!editor.reported_dirty());

        let report = editor.tick(500);
        assert!(report.stabilized);
        assert_eq!(report.absorbed, 2);
        assert!(!editor.form().is_dirty());
        assert!(!editor.reported_dirty());
        assert!(editor.dirty_fields().is_empty());
        assert_eq!(editor.history().len(), 1);
    }

    #[test]
    fn edits_are_dirty_and_debounced_into_history() {
        let mut editor = settled();
        editor.set_value("title", json!("Big"), 1000).unwrap();
        editor.set_value("title", json!("Big mug"), 1100).unwrap();
        assert!(editor.reported_dirty());
        assert_eq!(editor.dirty_fields(), vec!["title"]);

        assert_eq!(editor.next_deadline(), Some(1400));
        assert!(editor.tick(1400).captured.is_some());
        assert_eq!(editor.history().len(), 2);
        assert!(!editor.history().is_at_saved_state());
    }

    #[test]
    fn unknown_form_key_is_an_error() {
        let mut editor = settled();
        assert_eq!(
            editor.set_value("color", json!("red"), 0),
            Err(Error::UnknownFormKey("color".into()))
        );
    }

    #[test]
    fn undo_flushes_pending_edit_and_restores_initial() {
        let mut editor = settled();
        editor.set_value("title", json!("Big mug"), 1000).unwrap();

        assert!(editor.undo(1010));
        assert_eq!(editor.history().len(), 2);
        assert_eq!(editor.values().get("title"), Some(&json!("Mug")));

        // Edits while restoring are not captured
        assert!(editor.finish_restore(1011));
        assert!(!editor.reported_dirty());
        assert!(editor.history().is_at_saved_state());

        assert!(editor.redo(1020));
        editor.finish_restore(1021);
        assert_eq!(editor.values().get("title"), Some(&json!("Big mug")));
    }

    #[test]
    fn undo_at_first_entry_changes_nothing() {
        let mut editor = settled();
        let before = editor.values().clone();
        assert!(!editor.undo(1000));
        assert!(!editor.history().can_undo());
        assert!(!editor.history().is_restoring());
        assert_eq!(editor.values(), &before);
    }

    #[test]
    fn accept_returns_ai_approval_version() {
        let mut editor = settled();
        editor.set_draft(Some(content(json!({"seo": {"title": "A"}}))));

        let version = editor.accept_path("seo.title", None, 1000).unwrap().unwrap();
        assert_eq!(version.trigger_type, TriggerType::AiApproval);
        assert_eq!(version.form_snapshot.values.get("metaTitle"), Some(&json!("A")));
        assert_eq!(editor.values().get("metaTitle"), Some(&json!("A")));
        assert!(editor.remaining_proposals().is_empty());

        assert_eq!(editor.accept_path("seo.title", None, 1001).unwrap(), None);
    }

    #[test]
    fn refetch_during_save_is_suppressed() {
        let mut editor = settled();
        editor.set_value("title", json!("Big mug"), 1000).unwrap();
        let generation = editor.form().reset_generation();

        let saved = editor.begin_save(1000).unwrap();
        let mut refetched = record(2);
        refetched.working_content.set("title", json!("Big mug"));
        assert_eq!(
            editor.apply_external(refetched.clone(), None, 1050).unwrap(),
            ExternalUpdate::Suppressed(SuppressReason::SaveInFlight)
        );
        assert_eq!(editor.values().get("title"), Some(&json!("Big mug")));

        editor.complete_save(saved, true, 1100).unwrap();
        assert_eq!(editor.form().reset_generation(), generation + 1);
        assert!(!editor.reported_dirty());

        // The suppressed key was adopted; the same record never resets later
        editor.tick(1600);
        assert!(!editor.save_guard().is_armed());
        assert_eq!(
            editor.apply_external(refetched, None, 1700).unwrap(),
            ExternalUpdate::Unchanged
        );
        assert_eq!(editor.form().reset_generation(), generation + 1);
    }

    #[test]
    fn external_update_resets_when_idle() {
        let mut editor = settled();
        let mut refetched = record(2);
        refetched.working_content.set("title", json!("Coffee mug"));

        assert_eq!(
            editor.apply_external(refetched, None, 2000).unwrap(),
            ExternalUpdate::Applied
        );
        assert_eq!(editor.values().get("title"), Some(&json!("Coffee mug")));
        assert!(!editor.stability().is_stable());
    }

    #[test]
    fn external_update_suppressed_while_restoring() {
        let mut editor = settled();
        editor.set_value("title", json!("Big mug"), 1000).unwrap();
        editor.undo(1010);

        assert_eq!(
            editor.apply_external(record(2), None, 1011).unwrap(),
            ExternalUpdate::Suppressed(SuppressReason::Restoring)
        );
    }

    #[test]
    fn save_keeps_edits_made_in_flight() {
        let mut editor = settled();
        editor.set_value("title", json!("Big mug"), 1000).unwrap();
        let saved = editor.begin_save(1000).unwrap();
        editor.set_value("sku", json!("MUG-1"), 1010).unwrap();

        let version = editor.complete_save(saved, true, 1020).unwrap();
        assert_eq!(version.trigger_type, TriggerType::ManualSave);
        assert_eq!(editor.dirty_fields(), vec!["sku"]);
        assert!(editor.reported_dirty());
    }

    #[test]
    fn failed_validation_leaves_guard_disarmed() {
        let mut editor = settled();
        editor.set_value("title", json!(""), 1000).unwrap();
        assert!(matches!(editor.begin_save(1000), Err(Error::Validation(_))));
        assert!(!editor.save_guard().is_armed());
    }

    #[test]
    fn abort_disarms_and_keeps_dirty() {
        let mut editor = settled();
        editor.set_value("title", json!("Big mug"), 1000).unwrap();
        editor.begin_save(1000).unwrap();
        editor.abort_save();
        assert!(!editor.save_guard().is_armed());
        assert!(editor.reported_dirty());
    }

    #[test]
    fn sub_records_count_as_unsaved() {
        let mut editor = settled();
        assert!(!editor.has_unsaved_changes());
        editor.mark_sub_record_dirty("v-1");
        assert!(editor.has_unsaved_changes());
        assert_eq!(editor.dirty_fields(), vec![dirty::VARIATIONS_PATH]);

        let saved = editor.begin_save(1000).unwrap();
        editor.complete_save(saved, false, 1000).unwrap();
        assert_eq!(editor.dirty_sub_records(), vec!["v-1"]);
    }

    #[test]
    fn resolve_take_remote_writes_nested_fields() {
        let mut editor = settled();
        editor.set_value("metaTitle", json!("Local"), 1000).unwrap();
        let remote = content(json!({
            "title": "Mug",
            "regular_price": "12.00",
            "seo": {"title": "Remote", "description": "Remote description"},
        }));

        let set = editor.detect_conflicts(&remote);
        assert_eq!(set.fields().collect::<Vec<_>>(), vec!["seo"]);

        assert!(editor.resolve_conflict("seo", Resolution::TakeRemote, 1100).unwrap());
        assert_eq!(editor.values().get("metaTitle"), Some(&json!("Remote")));
        assert_eq!(
            editor.values().get("metaDescription"),
            Some(&json!("Remote description"))
        );
        assert!(!editor.unresolved_conflicts().has_conflict);
        assert!(editor.dirty_fields().is_empty());
        assert!(!editor.resolve_conflict("seo", Resolution::TakeRemote, 1200).unwrap());
    }

    #[test]
    fn resolve_keep_local_rebaselines_snapshot() {
        let mut editor = settled();
        editor.set_value("title", json!("Local"), 1000).unwrap();
        let mut remote = record(1).working_content;
        remote.set("title", json!("Remote"));

        editor.detect_conflicts(&remote);
        editor.resolve_conflict("title", Resolution::KeepLocal, 1100).unwrap();

        assert_eq!(editor.values().get("title"), Some(&json!("Local")));
        assert_eq!(editor.store_snapshot().get("title"), Some(&json!("Remote")));
        assert!(editor.detect_conflicts(&remote).is_empty());
    }

    #[test]
    fn version_restore_captures_label() {
        let mut editor = settled();
        let mut values = editor.values().clone();
        values.set("title", json!("From version"));

        editor.restore_version(values, 1000).unwrap();
        assert!(editor.history().is_restoring());
        editor.finish_restore(1001);

        let current = editor.history().current().unwrap();
        assert_eq!(current.label, VERSION_RESTORED_LABEL);
        assert_eq!(editor.values().get("title"), Some(&json!("From version")));
        assert!(editor.reported_dirty());
    }

    #[test]
    fn normalization_deadline_hidden_while_restoring() {
        let mut editor = loaded();
        assert_eq!(editor.next_deadline(), Some(0));

        let values = editor.values().clone();
        editor.restore_version(values, 10).unwrap();
        assert_eq!(editor.next_deadline(), Some(500));

        editor.finish_restore(26);
        assert_eq!(editor.next_deadline(), Some(500));
    }

    #[test]
    fn teardown_cancels_deadlines() {
        let mut editor = loaded();
        editor.set_value("title", json!("x"), 0).unwrap();
        editor.teardown();
        assert_eq!(editor.next_deadline(), None);
    }
}
