//! Stabilization guards.
//!
//! [`FormStability`] hides dirty state until the form has settled after a
//! reset, so normalization rewrites are never reported as edits.
//! [`SaveGuard`] keeps refetches that race a save from resetting the form.

use crate::Timestamp;
use serde::{Deserialize, Serialize};

/// Guard tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuardConfig {
    /// Delay after a reset (or a successful save) before the form is trusted
    pub settle_ms: u64,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self { settle_ms: 500 }
    }
}

/// Whether the form has settled since its last reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum FormStability {
    Settling {
        until: Timestamp,
    },
    #[default]
    Stable,
}

impl FormStability {
    /// A reset happened at `now`. Supersedes any earlier settle deadline.
    pub fn on_reset(&mut self, now: Timestamp, config: &GuardConfig) {
        *self = FormStability::Settling {
            until: now + config.settle_ms,
        };
    }

    /// Advance to `now`. Returns true if the form just became stable.
    pub fn tick(&mut self, now: Timestamp) -> bool {
        match *self {
            FormStability::Settling { until } if until <= now => {
                *self = FormStability::Stable;
                true
            }
            _ => false,
        }
    }

    /// Drop the pending settle deadline. Returns whether one was pending.
    ///
    /// Only for teardown: the absorb step that normally follows settling
    /// does not run.
    pub fn cancel(&mut self) -> bool {
        let pending = matches!(self, FormStability::Settling { .. });
        *self = FormStability::Stable;
        pending
    }

    pub fn is_stable(&self) -> bool {
        matches!(self, FormStability::Stable)
    }

    pub fn deadline(&self) -> Option<Timestamp> {
        match *self {
            FormStability::Settling { until } => Some(until),
            FormStability::Stable => None,
        }
    }
}

/// Post-save guard.
///
/// ```text
///   Disarmed ──arm──▶ Armed ──release_after_success──▶ Releasing{until} ──tick──▶ Disarmed
///                       │
///                       └──disarm (failure)──▶ Disarmed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum SaveGuard {
    #[default]
    Disarmed,
    /// A save request is in flight
    Armed,
    /// The save succeeded; its refetches are still settling
    Releasing { until: Timestamp },
}

impl SaveGuard {
    /// Arm before issuing a save request.
    pub fn arm(&mut self) {
        *self = SaveGuard::Armed;
    }

    /// The save succeeded at `now`; disarm once the settle delay passes.
    pub fn release_after_success(&mut self, now: Timestamp, config: &GuardConfig) {
        *self = SaveGuard::Releasing {
            until: now + config.settle_ms,
        };
    }

    /// Disarm immediately. Used on every failure path.
    pub fn disarm(&mut self) {
        *self = SaveGuard::Disarmed;
    }

    /// Advance to `now`. Returns true if the guard just disarmed.
    pub fn tick(&mut self, now: Timestamp) -> bool {
        match *self {
            SaveGuard::Releasing { until } if until <= now => {
                *self = SaveGuard::Disarmed;
                true
            }
            _ => false,
        }
    }

    /// Whether external updates must be held off.
    pub fn is_armed(&self) -> bool {
        !matches!(self, SaveGuard::Disarmed)
    }

    pub fn deadline(&self) -> Option<Timestamp> {
        match *self {
            SaveGuard::Releasing { until } => Some(until),
            _ => None,
        }
    }
}

/// The dirty flag shown to the user: suppressed until the form is stable.
pub fn reported_dirty(stability: &FormStability, form_dirty: bool) -> bool {
    stability.is_stable() && form_dirty
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: GuardConfig = GuardConfig { settle_ms: 500 };

    #[test]
    fn stability_settles_after_delay() {
        let mut stability = FormStability::default();
        assert!(stability.is_stable());

        stability.on_reset(1000, &CONFIG);
        assert!(!stability.is_stable());
        assert_eq!(stability.deadline(), Some(1500));

        assert!(!stability.tick(1499));
        assert!(stability.tick(1500));
        assert!(stability.is_stable());
        assert!(!stability.tick(2000));
    }

    #[test]
    fn newer_reset_supersedes() {
        let mut stability = FormStability::default();
        stability.on_reset(0, &CONFIG);
        stability.on_reset(400, &CONFIG);

        assert!(!stability.tick(500));
        assert!(stability.tick(900));
    }

    #[test]
    fn dirty_suppressed_until_stable() {
        let mut stability = FormStability::default();
        stability.on_reset(0, &CONFIG);
        assert!(!reported_dirty(&stability, true));

        stability.tick(500);
        assert!(reported_dirty(&stability, true));
        assert!(!reported_dirty(&stability, false));
    }

    #[test]
    fn save_guard_success_path() {
        let mut guard = SaveGuard::default();
        assert!(!guard.is_armed());

        guard.arm();
        assert!(guard.is_armed());
        assert_eq!(guard.deadline(), None);
        assert!(!guard.tick(10_000));

        guard.release_after_success(100, &CONFIG);
        assert!(guard.is_armed());
        assert!(!guard.tick(599));
        assert!(guard.tick(600));
        assert!(!guard.is_armed());
    }

    #[test]
    fn save_guard_failure_disarms_immediately() {
        let mut guard = SaveGuard::default();
        guard.arm();
        guard.disarm();
        assert_eq!(guard, SaveGuard::Disarmed);
    }

    #[test]
    fn serialization_format() {
        let json = serde_json::to_string(&SaveGuard::Releasing { until: 5 }).unwrap();
        assert_eq!(json, r#"{"state":"releasing","until":5}"#);
    }
}
