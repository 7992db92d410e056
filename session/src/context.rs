//! Read-only editor context for UI consumers.
//!
//! Building a context walks the whole form, so it is memoized: the cache key
//! is made of revision counters that move whenever something visible changes,
//! and an unchanged key hands back the same `Arc`.

use std::sync::Arc;

use quill_engine::{ConflictSet, ContentPath, Editor, FormValues, ProductField, ProductId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Save button state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveStatus {
    #[default]
    Idle,
    Saving,
    Saved,
    Error,
}

/// Outcome of the latest conflict check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum ConflictState {
    #[default]
    Unchecked,
    Checked,
    /// The remote fetch failed; the user decides whether to save anyway
    Failed { message: String },
}

/// One dirty content path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirtyField {
    pub path: ContentPath,
    pub has_conflict: bool,
}

/// An open draft proposal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proposal {
    pub field: ProductField,
    pub path: Option<String>,
    pub proposed_value: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistorySummary {
    pub can_undo: bool,
    pub can_redo: bool,
    pub is_at_saved_state: bool,
    pub depth: usize,
    pub cursor: Option<usize>,
}

/// Everything a UI needs to render the editor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorContext {
    pub product_id: Option<ProductId>,
    pub values: FormValues,
    pub is_dirty: bool,
    pub has_unsaved_changes: bool,
    pub dirty_fields: Vec<DirtyField>,
    pub save_status: SaveStatus,
    pub save_enabled: bool,
    pub conflicts: ConflictSet,
    pub conflict_check: ConflictState,
    pub proposals: Vec<Proposal>,
    pub history: HistorySummary,
    pub form_stable: bool,
}

impl EditorContext {
    pub fn build(editor: &Editor, save_status: SaveStatus, conflict_check: &ConflictState) -> Self {
        let conflicts = editor.unresolved_conflicts().clone();
        let dirty_fields = editor
            .dirty_fields()
            .into_iter()
            .map(|path| DirtyField {
                has_conflict: conflicts.contains(&path),
                path,
            })
            .collect();
        let proposals = editor
            .remaining_proposals()
            .into_iter()
            .filter_map(|field| {
                let proposed_value = editor.drafts().proposed_value(field)?.clone();
                Some(Proposal {
                    field,
                    path: field.content_path().map(str::to_string),
                    proposed_value,
                })
            })
            .collect();
        let history = editor.history();
        let has_unsaved_changes = editor.has_unsaved_changes();

        Self {
            product_id: editor.product_id().map(str::to_string),
            values: editor.values().clone(),
            is_dirty: editor.reported_dirty(),
            has_unsaved_changes,
            dirty_fields,
            save_status,
            save_enabled: has_unsaved_changes
                && save_status != SaveStatus::Saving
                && conflicts.is_empty(),
            conflicts,
            conflict_check: conflict_check.clone(),
            proposals,
            history: HistorySummary {
                can_undo: history.can_undo(),
                can_redo: history.can_redo(),
                is_at_saved_state: history.is_at_saved_state(),
                depth: history.len(),
                cursor: history.cursor(),
            },
            form_stable: editor.stability().is_stable(),
        }
    }
}

/// Inputs that determine an [`EditorContext`].
#[derive(Debug, Clone, PartialEq, Eq)]
struct ContextKey {
    form_revision: u64,
    form_resets: u64,
    history_revision: u64,
    history_restoring: bool,
    draft_revision: u64,
    conflict_revision: u64,
    sub_records: usize,
    stable: bool,
    save_status: SaveStatus,
    conflict_check: ConflictState,
}

impl ContextKey {
    fn of(editor: &Editor, save_status: SaveStatus, conflict_check: &ConflictState) -> Self {
        Self {
            form_revision: editor.form().revision(),
            form_resets: editor.form().reset_generation(),
            history_revision: editor.history().revision(),
            history_restoring: editor.history().is_restoring(),
            draft_revision: editor.drafts().revision(),
            conflict_revision: editor.conflict_revision(),
            sub_records: editor.dirty_sub_records().len(),
            stable: editor.stability().is_stable(),
            save_status,
            conflict_check: conflict_check.clone(),
        }
    }
}

/// Memoizes the latest context.
#[derive(Debug, Default)]
pub struct ContextCache {
    entry: Option<(ContextKey, Arc<EditorContext>)>,
    builds: u64,
}

impl ContextCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The context for the current state, rebuilt only if an input moved.
    pub fn get(
        &mut self,
        editor: &Editor,
        save_status: SaveStatus,
        conflict_check: &ConflictState,
    ) -> Arc<EditorContext> {
        let key = ContextKey::of(editor, save_status, conflict_check);
        if let Some((cached_key, context)) = &self.entry {
            if *cached_key == key {
                return Arc::clone(context);
            }
        }

        let context = Arc::new(EditorContext::build(editor, save_status, conflict_check));
        self.entry = Some((key, Arc::clone(&context)));
        self.builds += 1;
        context
    }

    /// Number of times a context was built.
    pub fn builds(&self) -> u64 {
        self.builds
    }
}
