//! Session configuration loaded from environment variables.

use std::env;

use quill_engine::{EditorConfig, GuardConfig, HistoryConfig};

/// Tunables for an editing session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Quiet period before an edit burst becomes a history entry
    pub history_debounce_ms: u64,
    /// Maximum number of history entries
    pub history_max_depth: usize,
    /// How long after a reset dirty flags stay hidden
    pub settle_ms: u64,
    /// How long "saved" / "error" stay visible before reverting to idle
    pub status_display_ms: u64,
    /// PostgreSQL URL for the version store; in-memory when absent
    pub database_url: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            history_debounce_ms: 300,
            history_max_depth: 50,
            settle_ms: 500,
            status_display_ms: 3000,
            database_url: None,
        }
    }
}

impl SessionConfig {
    /// Load configuration from the environment (and a `.env` file, if any).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        Ok(Self {
            history_debounce_ms: parse_var(
                "QUILL_HISTORY_DEBOUNCE_MS",
                defaults.history_debounce_ms,
            )?,
            history_max_depth: parse_var("QUILL_HISTORY_MAX_DEPTH", defaults.history_max_depth)?,
            settle_ms: parse_var("QUILL_SETTLE_MS", defaults.settle_ms)?,
            status_display_ms: parse_var("QUILL_STATUS_DISPLAY_MS", defaults.status_display_ms)?,
            database_url: env::var("DATABASE_URL").ok().filter(|url| !url.is_empty()),
        })
    }

    /// The engine-level part of the configuration.
    pub fn editor_config(&self) -> EditorConfig {
        EditorConfig {
            history: HistoryConfig {
                debounce_ms: self.history_debounce_ms,
                max_depth: self.history_max_depth,
            },
            guard: GuardConfig {
                settle_ms: self.settle_ms,
            },
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidNumber {
            var: name,
            value: raw,
        }),
        Err(_) => Ok(default),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value:?}")]
    InvalidNumber { var: &'static str, value: String },
}
