//! Form history (undo/redo).
//!
//! Snapshots of the full form are captured on a debounce after edits, or
//! explicitly with a label. History is linear: capturing after an undo drops
//! the redo branch. The stack is bounded; the oldest entries are evicted first.
//!
//! # Phases
//!
//! ```text
//!   Idle ──note_change──▶ Capturing{due_at} ──flush_due──▶ Idle
//!    │                        │
//!    └──undo/redo/restore─────┴──▶ Restoring ──finish_restore──▶ Idle
//! ```
//!
//! Nothing is captured while Restoring. A restore replaces the form values,
//! which fires the same change notifications as an edit; without the guard
//! every restore would push a new snapshot and destroy the redo branch.

use crate::{FormValues, SnapshotId, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Label of the snapshot captured when a product is loaded.
pub const INITIAL_LABEL: &str = "Initial";
/// Label of debounced edit snapshots.
pub const EDIT_LABEL: &str = "Edit";
/// Label captured after a persisted version is restored.
pub const VERSION_RESTORED_LABEL: &str = "Version restored";

/// History tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryConfig {
    /// Quiet period before a burst of edits becomes one snapshot
    pub debounce_ms: u64,
    /// Maximum number of snapshots kept
    pub max_depth: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 300,
            max_depth: 50,
        }
    }
}

/// A captured copy of the whole form. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistorySnapshot {
    pub id: SnapshotId,
    pub values: FormValues,
    pub label: String,
    pub timestamp: Timestamp,
}

/// What the history engine is doing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum HistoryPhase {
    #[default]
    Idle,
    /// An edit burst is pending; a snapshot is due at `due_at`
    Capturing { due_at: Timestamp },
    /// Values are being restored; captures are suppressed until finished
    Restoring { pending_label: Option<String> },
}

/// Bounded linear undo/redo history.
#[derive(Debug, Clone)]
pub struct FormHistory {
    config: HistoryConfig,
    stack: VecDeque<HistorySnapshot>,
    /// `None` only while the stack is empty
    cursor: Option<usize>,
    saved_cursor: Option<usize>,
    phase: HistoryPhase,
    next_id: SnapshotId,
    revision: u64,
}

impl Default for FormHistory {
    fn default() -> Self {
        Self::new(HistoryConfig::default())
    }
}

impl FormHistory {
    /// Create an empty history.
    pub fn new(config: HistoryConfig) -> Self {
        Self {
            config,
            stack: VecDeque::new(),
            cursor: None,
            saved_cursor: None,
            phase: HistoryPhase::Idle,
            next_id: 1,
            revision: 0,
        }
    }

    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    pub fn phase(&self) -> &HistoryPhase {
        &self.phase
    }

    /// Whether a restore is in progress.
    pub fn is_restoring(&self) -> bool {
        matches!(self.phase, HistoryPhase::Restoring { .. })
    }

    /// Record that the form changed at `now`.
    ///
    /// Starts (or pushes back) the debounce deadline. Ignored while restoring.
    pub fn note_change(&mut self, now: Timestamp) {
        if self.is_restoring() {
            return;
        }
        self.phase = HistoryPhase::Capturing {
            due_at: now + self.config.debounce_ms,
        };
    }

    /// Capture the pending edit burst if its deadline has passed.
    pub fn flush_due(&mut self, now: Timestamp, values: &FormValues) -> Option<SnapshotId> {
        match self.phase {
            HistoryPhase::Capturing { due_at } if due_at <= now => self.flush_pending(values, now),
            _ => None,
        }
    }

    /// Capture the pending edit burst immediately, if there is one.
    ///
    /// Bursts that leave the form where the current snapshot already is
    /// are dropped.
    pub fn flush_pending(&mut self, values: &FormValues, now: Timestamp) -> Option<SnapshotId> {
        if !matches!(self.phase, HistoryPhase::Capturing { .. }) {
            return None;
        }
        self.phase = HistoryPhase::Idle;
        if self.current().is_some_and(|s| &s.values == values) {
            return None;
        }
        Some(self.push(values.clone(), EDIT_LABEL.to_string(), now))
    }

    /// Capture a labelled snapshot now. Suppressed while restoring.
    pub fn capture(
        &mut self,
        values: FormValues,
        label: impl Into<String>,
        now: Timestamp,
    ) -> Option<SnapshotId> {
        if self.is_restoring() {
            return None;
        }
        self.phase = HistoryPhase::Idle;
        Some(self.push(values, label.into(), now))
    }

    fn push(&mut self, values: FormValues, label: String, now: Timestamp) -> SnapshotId {
        // Linear history: anything after the cursor is a dead redo branch.
        let keep = self.cursor.map_or(0, |c| c + 1);
        self.stack.truncate(keep);
        if self.saved_cursor.is_some_and(|s| s >= keep) {
            self.saved_cursor = None;
        }

        let id = self.next_id;
        self.next_id += 1;
        self.stack.push_back(HistorySnapshot {
            id,
            values,
            label,
            timestamp: now,
        });

        while self.stack.len() > self.config.max_depth.max(1) {
            self.stack.pop_front();
            self.saved_cursor = self.saved_cursor.and_then(|s| s.checked_sub(1));
        }
        self.cursor = Some(self.stack.len() - 1);
        self.revision += 1;
        id
    }

    /// Step back. Returns the values to restore, or `None` at the oldest entry.
    ///
    /// On success the engine enters Restoring; call
    /// [`finish_restore`](Self::finish_restore) once the values are applied.
    pub fn undo(&mut self) -> Option<FormValues> {
        let target = self.cursor?.checked_sub(1)?;
        Some(self.move_to(target))
    }

    /// Step forward. Returns the values to restore, or `None` at the newest entry.
    pub fn redo(&mut self) -> Option<FormValues> {
        let target = self.cursor? + 1;
        if target >= self.stack.len() {
            return None;
        }
        Some(self.move_to(target))
    }

    fn move_to(&mut self, target: usize) -> FormValues {
        self.cursor = Some(target);
        self.phase = HistoryPhase::Restoring {
            pending_label: None,
        };
        self.revision += 1;
        self.stack[target].values.clone()
    }

    /// Enter Restoring for a restore that does not come from the stack.
    ///
    /// `label`, if given, is captured when the restore finishes.
    pub fn begin_restore(&mut self, label: Option<String>) {
        self.phase = HistoryPhase::Restoring {
            pending_label: label,
        };
    }

    /// Leave Restoring, capturing the pending label (if any) with `values`.
    ///
    /// Returns false if no restore was in progress.
    pub fn finish_restore(&mut self, values: &FormValues, now: Timestamp) -> bool {
        let HistoryPhase::Restoring { pending_label } = std::mem::take(&mut self.phase) else {
            return false;
        };
        if let Some(label) = pending_label {
            self.push(values.clone(), label, now);
        }
        true
    }

    /// Drop a pending debounced capture.
    pub fn cancel_pending(&mut self) {
        if matches!(self.phase, HistoryPhase::Capturing { .. }) {
            self.phase = HistoryPhase::Idle;
        }
    }

    /// When the pending capture is due, if any.
    pub fn next_deadline(&self) -> Option<Timestamp> {
        match self.phase {
            HistoryPhase::Capturing { due_at } => Some(due_at),
            _ => None,
        }
    }

    /// Remember the current entry as the saved state.
    pub fn mark_as_saved(&mut self) {
        self.saved_cursor = self.cursor;
        self.revision += 1;
    }

    /// Whether the current entry is the saved one.
    pub fn is_at_saved_state(&self) -> bool {
        self.cursor == self.saved_cursor
    }

    pub fn can_undo(&self) -> bool {
        self.cursor.is_some_and(|c| c > 0)
    }

    pub fn can_redo(&self) -> bool {
        self.cursor.is_some_and(|c| c + 1 < self.stack.len())
    }

    /// Forget everything.
    pub fn reset(&mut self) {
        self.stack.clear();
        self.cursor = None;
        self.saved_cursor = None;
        self.phase = HistoryPhase::Idle;
        self.revision += 1;
    }

    /// The entry at the cursor.
    pub fn current(&self) -> Option<&HistorySnapshot> {
        self.stack.get(self.cursor?)
    }

    /// All entries, oldest first.
    pub fn snapshots(&self) -> impl Iterator<Item = &HistorySnapshot> {
        self.stack.iter()
    }

    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn saved_cursor(&self) -> Option<usize> {
        self.saved_cursor
    }

    /// Incremented whenever the stack, cursor or saved marker changes.
    pub fn revision(&self) -> u64 {
        self.revision
    }
}
