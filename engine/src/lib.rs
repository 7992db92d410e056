//! # Quill Engine
//!
//! A deterministic reconciliation core for editing e-commerce product content.
//!
//! A product being edited has three concurrent views of its content: the
//! platform's last-synchronized copy (the *store snapshot*), the user's
//! working copy (the *form*), and a generated *draft*. This crate keeps them
//! apart and reconciles them: it derives dirty fields, detects conflicts with
//! the platform, merges draft proposals field by field, and keeps a bounded
//! undo/redo history that asynchronous effects cannot corrupt.
//!
//! ## Design Principles
//!
//! - **No IO**: the engine never fetches, saves or logs
//! - **No clocks**: every time-dependent call takes an explicit `now`
//! - **Deterministic**: same inputs, same outputs, same serialization
//! - **Explicit state machines**: guards and history phases are enums, not flags
//!
//! ## Core Concepts
//!
//! ### Fields
//!
//! [`ProductField`] is the fixed table mapping nested content paths
//! (`seo.title`) to flat form keys (`metaTitle`). Nothing is matched by ad hoc
//! string manipulation.
//!
//! ### Form
//!
//! [`FormState`] holds the live values, the baseline they are compared
//! against, and dirty/touched bookkeeping. After a reset the rich-text
//! widgets normalize empty values; [`FormStability`] hides the resulting
//! dirty flags until the form has settled.
//!
//! ### History
//!
//! [`FormHistory`] captures debounced snapshots of the whole form. Captures
//! are suppressed while a restore is being applied.
//!
//! ### Editor
//!
//! [`Editor`] composes all of the above for one product. Callers feed it
//! records, user edits and the current time; it returns what to persist.
//!
//! ## Quick Start
//!
//! ```rust
//! use quill_engine::{Editor, EditorConfig, ProductContent, ProductRecord};
//! use serde_json::json;
//!
//! let content = ProductContent::from_value(json!({"title": "Mug"})).unwrap();
//! let record = ProductRecord::new("p-1", content).synced_at(1706745600000);
//!
//! let mut editor = Editor::new(EditorConfig::default());
//! editor.load(record, None, 0).unwrap();
//!
//! // Let the form settle
//! editor.tick(0);
//! editor.tick(500);
//!
//! editor.set_value("title", json!("Stoneware mug"), 1000).unwrap();
//! assert_eq!(editor.dirty_fields(), vec!["title"]);
//!
//! let saved = editor.begin_save(1000).unwrap();
//! let version = editor.complete_save(saved, true, 1200).unwrap();
//! assert_eq!(version.trigger_type.as_str(), "manual_save");
//! assert!(editor.dirty_fields().is_empty());
//! ```

pub mod conflict;
pub mod content;
pub mod dirty;
pub mod draft;
pub mod editor;
pub mod error;
pub mod field;
pub mod form;
pub mod guard;
pub mod history;
pub mod record;
pub mod schema;
pub mod version;

// Re-export main types at crate root
pub use conflict::{detect_conflicts, ConflictSet, FieldConflict, Resolution};
pub use content::ProductContent;
pub use dirty::{dirty_fields, VARIATIONS_PATH};
pub use draft::{AcceptOutcome, DraftReconciler};
pub use editor::{Editor, EditorConfig, ExternalUpdate, SuppressReason, TickReport};
pub use error::{Error, FieldError};
pub use field::ProductField;
pub use form::{FormState, FormValues, SetOptions, EMPTY_RICH_TEXT_DOCUMENT};
pub use guard::{FormStability, GuardConfig, SaveGuard};
pub use history::{FormHistory, HistoryConfig, HistoryPhase, HistorySnapshot};
pub use record::{BufferTimestamps, ContentBuffer, ProductRecord, SyncKey};
pub use schema::{FieldDef, FieldType, FormSchema};
pub use version::{FormSnapshot, NewVersion, TriggerType, FORM_SNAPSHOT_FORMAT_VERSION};

/// Type aliases for clarity
pub type ProductId = String;
pub type Timestamp = u64;
pub type SnapshotId = u64;
pub type FieldKey = String;
pub type ContentPath = String;
