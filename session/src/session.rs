//! One editing session for one product.
//!
//! A [`Session`] owns an [`Editor`] behind an async mutex and a scheduler
//! task that fires the editor's deadlines. The lock is never held across a
//! collaborator call: every network step reads what it needs, releases the
//! lock, awaits, then re-locks to apply the result.

use std::sync::Arc;

use async_trait::async_trait;
use quill_engine::{
    ConflictSet, Editor, ExternalUpdate, FormValues, ProductContent, ProductField, ProductId,
    Resolution, SnapshotId, Timestamp,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{Mutex, Notify};
use uuid::Uuid;

use crate::api::{ProductApi, SubRecordSaver};
use crate::config::SessionConfig;
use crate::context::{ConflictState, ContextCache, EditorContext, SaveStatus};
use crate::error::{Result, SessionError};
use crate::timers::{Scheduler, SessionClock, Timed};
use crate::versions::{VersionManager, VersionRecord};

/// Delay between applying restored values and leaving the Restoring phase,
/// so bound widgets see the new values before history listens again.
pub const RESTORE_FRAME_MS: Timestamp = 16;

/// Keyboard shortcuts the session handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Shortcut {
    Undo,
    Redo,
}

/// Outcome of a save that reached the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SaveReport {
    /// Product and sub-records were saved
    Saved,
    /// The product was saved but sub-records were not
    #[serde(rename_all = "camelCase")]
    PartiallySaved {
        failed_sub_records: Vec<String>,
        message: String,
    },
}

/// Mutable session state, guarded by the session mutex.
struct SessionState {
    editor: Editor,
    status: SaveStatus,
    /// When a saved/error status reverts to idle
    status_until: Option<Timestamp>,
    /// When the current restore leaves the Restoring phase
    restore_due: Option<Timestamp>,
    conflict_check: ConflictState,
    sub_record_saver: Option<Arc<dyn SubRecordSaver>>,
    context: ContextCache,
}

impl SessionState {
    fn next_deadline(&self) -> Option<Timestamp> {
        [
            self.editor.next_deadline(),
            self.restore_due,
            self.status_until,
        ]
        .into_iter()
        .flatten()
        .min()
    }

    fn show_status(&mut self, status: SaveStatus, now: Timestamp, display_ms: u64) {
        self.status = status;
        self.status_until = match status {
            SaveStatus::Saved | SaveStatus::Error => Some(now + display_ms),
            SaveStatus::Idle | SaveStatus::Saving => None,
        };
    }

    fn abort_save(&mut self) {
        self.editor.abort_save();
        if self.status == SaveStatus::Saving {
            self.status = SaveStatus::Idle;
        }
    }

    fn context(&mut self) -> Arc<EditorContext> {
        self.context
            .get(&self.editor, self.status, &self.conflict_check)
    }
}

struct Shared {
    product_id: ProductId,
    api: Arc<dyn ProductApi>,
    versions: VersionManager,
    config: SessionConfig,
    clock: SessionClock,
    state: Mutex<SessionState>,
}

#[async_trait]
impl Timed for Shared {
    async fn next_deadline(&self) -> Option<Timestamp> {
        self.state.lock().await.next_deadline()
    }

    async fn fire(&self, now: Timestamp) {
        let mut state = self.state.lock().await;

        if state.restore_due.is_some_and(|due| due <= now) {
            state.restore_due = None;
            state.editor.finish_restore(now);
            tracing::debug!(product_id = %self.product_id, "Restore finished");
        }

        let report = state.editor.tick(now);
        if !report.is_empty() {
            tracing::debug!(
                product_id = %self.product_id,
                normalized = report.normalized.len(),
                captured = ?report.captured,
                stabilized = report.stabilized,
                absorbed = report.absorbed,
                guard_released = report.guard_released,
                "Editor tick"
            );
        }

        if state.status_until.is_some_and(|until| until <= now) {
            state.status_until = None;
            state.status = SaveStatus::Idle;
        }
    }
}

impl Shared {
    /// Settle a save whose future was dropped.
    ///
    /// Once the product itself reached the platform the save completes
    /// without sub-records; otherwise the guard is simply disarmed.
    fn settle_abandoned(&self, state: &mut SessionState, core_saved: Option<FormValues>) {
        let Some(values) = core_saved else {
            state.abort_save();
            return;
        };
        match state.editor.complete_save(values, false, self.clock.now()) {
            Ok(version) => {
                self.versions.record(version);
                if state.status == SaveStatus::Saving {
                    state.status = SaveStatus::Idle;
                }
            }
            Err(e) => {
                tracing::warn!(
                    product_id = %self.product_id,
                    error = %e,
                    "Abandoned save not completed"
                );
                state.abort_save();
            }
        }
    }
}

/// Settles the save guard if a save future is dropped before it settles.
struct InFlightSave {
    shared: Arc<Shared>,
    wake: Arc<Notify>,
    settled: bool,
    /// Values the platform accepted, once the product save returned
    core_saved: Option<FormValues>,
}

impl InFlightSave {
    fn new(shared: Arc<Shared>, wake: Arc<Notify>) -> Self {
        Self {
            shared,
            wake,
            settled: false,
            core_saved: None,
        }
    }

    fn core_saved(&mut self, values: FormValues) {
        self.core_saved = Some(values);
    }

    fn settle(&mut self) {
        self.settled = true;
    }
}

impl Drop for InFlightSave {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let core_saved = self.core_saved.take();
        tracing::warn!(
            product_id = %self.shared.product_id,
            core_saved = core_saved.is_some(),
            "Save abandoned mid-flight"
        );
        if let Ok(mut state) = self.shared.state.try_lock() {
            self.shared.settle_abandoned(&mut state, core_saved);
            drop(state);
            self.wake.notify_one();
            return;
        }
        let shared = Arc::clone(&self.shared);
        let wake = Arc::clone(&self.wake);
        tokio::spawn(async move {
            let mut state = shared.state.lock().await;
            shared.settle_abandoned(&mut state, core_saved);
            drop(state);
            wake.notify_one();
        });
    }
}

/// An editing session.
///
/// Dropping the session stops its scheduler.
pub struct Session {
    shared: Arc<Shared>,
    scheduler: Scheduler,
}

impl Session {
    /// Fetch a product and its content buffer and start editing it.
    pub async fn open(
        product_id: impl Into<ProductId>,
        api: Arc<dyn ProductApi>,
        versions: VersionManager,
        config: SessionConfig,
    ) -> Result<Self> {
        let product_id = product_id.into();
        let (record, buffer) = futures::try_join!(
            api.fetch_product(&product_id),
            api.fetch_content_buffer(&product_id)
        )?;

        let clock = SessionClock::start();
        let mut editor = Editor::new(config.editor_config());
        editor.load(record, buffer, clock.now())?;

        let shared = Arc::new(Shared {
            product_id,
            api,
            versions,
            config,
            clock,
            state: Mutex::new(SessionState {
                editor,
                status: SaveStatus::Idle,
                status_until: None,
                restore_due: None,
                conflict_check: ConflictState::Unchecked,
                sub_record_saver: None,
                context: ContextCache::new(),
            }),
        });
        let scheduler = Scheduler::spawn(Arc::clone(&shared) as Arc<dyn Timed>, clock);
        let session = Self { shared, scheduler };

        tracing::info!(product_id = %session.shared.product_id, "Editing session opened");
        if let Err(e) = session.check_conflicts().await {
            tracing::debug!(error = %e, "Initial conflict check failed");
        }
        Ok(session)
    }

    pub fn product_id(&self) -> &str {
        &self.shared.product_id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.shared.config
    }

    pub fn versions(&self) -> &VersionManager {
        &self.shared.versions
    }

    /// Milliseconds since the session opened.
    pub fn now(&self) -> Timestamp {
        self.shared.clock.now()
    }

    /// Run `f` against the editor with the lock held.
    pub async fn inspect<R>(&self, f: impl FnOnce(&Editor) -> R) -> R {
        let state = self.shared.state.lock().await;
        f(&state.editor)
    }

    /// The memoized UI context.
    pub async fn context(&self) -> Arc<EditorContext> {
        self.shared.state.lock().await.context()
    }

    pub async fn status(&self) -> SaveStatus {
        self.shared.state.lock().await.status
    }

    pub async fn conflict_state(&self) -> ConflictState {
        self.shared.state.lock().await.conflict_check.clone()
    }

    pub async fn values(&self) -> FormValues {
        self.shared.state.lock().await.editor.values().clone()
    }

    // ------------------------------------------------------------------
    // Editing
    // ------------------------------------------------------------------

    /// A user edit by form key.
    pub async fn set_value(&self, key: &str, value: Value) -> Result<bool> {
        let changed = {
            let mut state = self.shared.state.lock().await;
            state.editor.set_value(key, value, self.now())?
        };
        self.scheduler.reschedule();
        Ok(changed)
    }

    /// Accept a draft proposal by content path, optionally with an edited
    /// value. Records an `ai_approval` version when something was applied.
    pub async fn accept_proposal(&self, path: &str, override_value: Option<Value>) -> Result<bool> {
        let version = {
            let mut state = self.shared.state.lock().await;
            state.editor.accept_path(path, override_value, self.now())?
        };
        self.scheduler.reschedule();

        match version {
            Some(version) => {
                tracing::info!(product_id = %self.shared.product_id, path, "Proposal accepted");
                self.shared.versions.record(version);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Reject a draft proposal by content path.
    pub async fn reject_proposal(&self, path: &str) -> Result<bool> {
        let mut state = self.shared.state.lock().await;
        Ok(state.editor.reject_path(path)?)
    }

    /// Replace the draft, e.g. after the generator produced a new one.
    pub async fn set_draft(&self, draft: Option<ProductContent>) {
        self.shared.state.lock().await.editor.set_draft(draft);
    }

    /// Open proposals.
    pub async fn remaining_proposals(&self) -> Vec<ProductField> {
        self.shared.state.lock().await.editor.remaining_proposals()
    }

    pub async fn mark_sub_record_dirty(&self, id: impl Into<String>) -> bool {
        self.shared
            .state
            .lock()
            .await
            .editor
            .mark_sub_record_dirty(id)
    }

    /// Install the saver for sub-records. Only one saver is registered at a
    /// time; a new registration replaces the previous one.
    pub async fn register_sub_record_saver(&self, saver: Arc<dyn SubRecordSaver>) {
        self.shared.state.lock().await.sub_record_saver = Some(saver);
    }

    // ------------------------------------------------------------------
    // History
    // ------------------------------------------------------------------

    pub async fn undo(&self) -> bool {
        self.step_history(Shortcut::Undo).await
    }

    pub async fn redo(&self) -> bool {
        self.step_history(Shortcut::Redo).await
    }

    /// Handle an undo/redo shortcut. Ignored while a save is in flight.
    pub async fn handle_shortcut(&self, shortcut: Shortcut) -> bool {
        if self.status().await == SaveStatus::Saving {
            tracing::debug!(?shortcut, "Shortcut ignored while saving");
            return false;
        }
        self.step_history(shortcut).await
    }

    async fn step_history(&self, direction: Shortcut) -> bool {
        let moved = {
            let mut state = self.shared.state.lock().await;
            let now = self.now();
            let moved = match direction {
                Shortcut::Undo => state.editor.undo(now),
                Shortcut::Redo => state.editor.redo(now),
            };
            if moved {
                state.restore_due = Some(now + RESTORE_FRAME_MS);
            }
            moved
        };
        if moved {
            self.scheduler.reschedule();
        }
        moved
    }

    /// Capture a labelled history entry now.
    pub async fn capture_snapshot(&self, label: &str) -> Option<SnapshotId> {
        let mut state = self.shared.state.lock().await;
        state.editor.capture_snapshot(label, self.now())
    }

    pub async fn mark_as_saved(&self) {
        self.shared.state.lock().await.editor.mark_as_saved();
    }

    /// Versions of this product, newest first.
    pub async fn list_versions(&self) -> Result<Vec<VersionRecord>> {
        self.shared.versions.list(&self.shared.product_id).await
    }

    /// Load a stored version into the form.
    ///
    /// The restore itself is one undoable history entry.
    pub async fn restore_version(&self, version_id: Uuid) -> Result<()> {
        let snapshot = self
            .shared
            .versions
            .load_snapshot(&self.shared.product_id, version_id)
            .await?;
        {
            let mut state = self.shared.state.lock().await;
            let now = self.now();
            state.editor.restore_version(snapshot.values, now)?;
            state.restore_due = Some(now + RESTORE_FRAME_MS);
        }
        self.scheduler.reschedule();

        tracing::info!(
            product_id = %self.shared.product_id,
            version_id = %version_id,
            format_version = snapshot.format_version,
            "Version restored"
        );
        Ok(())
    }

    // ------------------------------------------------------------------
    // Platform sync
    // ------------------------------------------------------------------

    /// Refetch the product and its buffer and apply them.
    ///
    /// The form is reset only when the record really changed and no save or
    /// restore is in flight.
    pub async fn refresh(&self) -> Result<ExternalUpdate> {
        let id = &self.shared.product_id;
        let (record, buffer) = futures::try_join!(
            self.shared.api.fetch_product(id),
            self.shared.api.fetch_content_buffer(id)
        )?;

        let update = {
            let mut state = self.shared.state.lock().await;
            state.editor.apply_external(record, buffer, self.now())?
        };
        self.scheduler.reschedule();

        match update {
            ExternalUpdate::Applied => tracing::info!(product_id = %id, "Form reset from refetched product"),
            ExternalUpdate::Suppressed(reason) => {
                tracing::debug!(product_id = %id, ?reason, "Refetched product not applied")
            }
            ExternalUpdate::Unchanged => {}
        }
        Ok(update)
    }

    /// Compare the platform's current content against the store snapshot.
    ///
    /// A failed fetch is recorded in the conflict state and returned; it
    /// never blocks saving.
    pub async fn check_conflicts(&self) -> Result<ConflictSet> {
        let id = &self.shared.product_id;
        match self.shared.api.fetch_remote_content(id).await {
            Ok(remote) => {
                let mut state = self.shared.state.lock().await;
                let conflicts = state.editor.detect_conflicts(&remote).clone();
                state.conflict_check = ConflictState::Checked;
                if conflicts.has_conflict {
                    tracing::info!(
                        product_id = %id,
                        conflicts = conflicts.len(),
                        "Platform changed fields that are edited locally"
                    );
                }
                Ok(conflicts)
            }
            Err(e) => {
                tracing::warn!(product_id = %id, error = %e, "Conflict check failed");
                let mut state = self.shared.state.lock().await;
                state.conflict_check = ConflictState::Failed {
                    message: e.to_string(),
                };
                Err(SessionError::ConflictCheckFailed(e))
            }
        }
    }

    /// Settle one conflicting top-level field.
    pub async fn resolve_conflict(&self, field: &str, resolution: Resolution) -> Result<bool> {
        let resolved = {
            let mut state = self.shared.state.lock().await;
            state.editor.resolve_conflict(field, resolution, self.now())?
        };
        self.scheduler.reschedule();
        Ok(resolved)
    }

    // ------------------------------------------------------------------
    // Saving
    // ------------------------------------------------------------------

    /// Save the product, then any dirty sub-records.
    ///
    /// Validation runs before any network call. A pre-save conflict check
    /// blocks on new conflicts but not on a failed fetch. Sub-record failures
    /// after a successful product save are reported as
    /// [`SaveReport::PartiallySaved`].
    pub async fn save(&self) -> Result<SaveReport> {
        let shared = &self.shared;
        let id = &shared.product_id;

        {
            let state = shared.state.lock().await;
            if state.status == SaveStatus::Saving {
                return Err(SessionError::SaveInProgress);
            }
            let unresolved = state.editor.unresolved_conflicts().len();
            if unresolved > 0 {
                return Err(SessionError::UnresolvedConflicts(unresolved));
            }
            state.editor.form().validate(state.editor.schema())?;
        }

        match self.check_conflicts().await {
            Ok(conflicts) if conflicts.has_conflict => {
                return Err(SessionError::UnresolvedConflicts(conflicts.len()));
            }
            Ok(_) | Err(SessionError::ConflictCheckFailed(_)) => {}
            Err(e) => return Err(e),
        }

        let (values, saver, sub_records) = {
            let mut state = shared.state.lock().await;
            if state.status == SaveStatus::Saving {
                return Err(SessionError::SaveInProgress);
            }
            let values = state.editor.begin_save(self.now())?;
            state.show_status(SaveStatus::Saving, self.now(), shared.config.status_display_ms);
            (
                values,
                state.sub_record_saver.clone(),
                state.editor.dirty_sub_records(),
            )
        };
        let mut in_flight = InFlightSave::new(Arc::clone(shared), self.scheduler.waker());
        tracing::info!(product_id = %id, sub_records = sub_records.len(), "Saving product");

        if let Err(e) = shared.api.save_product(id, &values).await {
            in_flight.settle();
            {
                let mut state = shared.state.lock().await;
                state.abort_save();
                state.show_status(SaveStatus::Error, self.now(), shared.config.status_display_ms);
            }
            self.scheduler.reschedule();
            tracing::warn!(product_id = %id, error = %e, "Save failed");
            return Err(SessionError::SaveFailed(e));
        }
        in_flight.core_saved(values.clone());

        let sub_result = match &saver {
            _ if sub_records.is_empty() => Ok(true),
            Some(saver) => saver
                .save_sub_records(id, &sub_records)
                .await
                .map(|()| true),
            None => {
                tracing::debug!(product_id = %id, "No sub-record saver registered");
                Ok(false)
            }
        };

        let report = {
            let mut state = shared.state.lock().await;
            in_flight.settle();
            let now = self.now();

            let (sub_records_saved, partial) = match sub_result {
                Ok(saved) => (saved, None),
                Err(e) => {
                    tracing::warn!(product_id = %id, error = %e, "Sub-record save failed");
                    (false, Some(e))
                }
            };

            let version = match state.editor.complete_save(values, sub_records_saved, now) {
                Ok(version) => version,
                Err(e) => {
                    state.abort_save();
                    state.show_status(SaveStatus::Error, now, shared.config.status_display_ms);
                    drop(state);
                    self.scheduler.reschedule();
                    return Err(e.into());
                }
            };
            shared.versions.record(version);

            match partial {
                None => {
                    state.show_status(SaveStatus::Saved, now, shared.config.status_display_ms);
                    SaveReport::Saved
                }
                Some(e) => {
                    state.show_status(SaveStatus::Error, now, shared.config.status_display_ms);
                    SaveReport::PartiallySaved {
                        failed_sub_records: sub_records,
                        message: e.to_string(),
                    }
                }
            }
        };
        self.scheduler.reschedule();

        tracing::info!(product_id = %id, report = ?report, "Save finished");
        Ok(report)
    }

    /// Stop the scheduler and cancel every pending deadline.
    pub async fn shutdown(&self) {
        {
            let mut state = self.shared.state.lock().await;
            state.editor.teardown();
            state.restore_due = None;
            state.status_until = None;
        }
        self.scheduler.cancel();
        tracing::info!(product_id = %self.shared.product_id, "Editing session closed");
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("product_id", &self.shared.product_id)
            .finish_non_exhaustive()
    }
}
