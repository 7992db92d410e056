//! Quill Session - async editing sessions on top of `quill-engine`.
//!
//! The engine is a pure state machine driven by explicit timestamps. This
//! crate gives it a runtime: a per-session scheduler that fires the engine's
//! deadlines, the save pipeline (validation, product save, sub-record save,
//! version recording), conflict checks against the platform, and a memoized
//! read-only context for UI consumers.
//!
//! Collaborators (the product API, sub-record savers and the version store)
//! are object-safe async traits so hosts can plug in HTTP clients, fakes or
//! the bundled PostgreSQL store.

pub mod api;
pub mod config;
pub mod context;
pub mod error;
pub mod session;
pub mod timers;
pub mod versions;

pub use api::{ApiError, ProductApi, SubRecordSaver};
pub use config::{ConfigError, SessionConfig};
pub use context::{ConflictState, EditorContext, SaveStatus};
pub use error::{Result, SessionError};
pub use session::{SaveReport, Session, Shortcut};
pub use versions::{MemoryVersionStore, PgVersionStore, VersionManager, VersionRecord, VersionStore};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the default tracing subscriber.
///
/// Honors `RUST_LOG`; a subscriber that is already installed is left alone.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quill_session=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
