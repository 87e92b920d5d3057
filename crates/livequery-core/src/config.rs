//! Centralized configuration for livequery.
//!
//! Constants for watcher timing plus the per-binding settings consumers pass
//! when they create a live binding.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Revision watcher configuration.
pub struct WatchConfig;

impl WatchConfig {
    /// Batching window applied when a binding does not choose one.
    pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);
}

/// How a live query decides that a re-executed result is new.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChangeDetection {
    /// Any movement of the index revision counts as a change; object sets
    /// are only compared when the revision is the same.
    Revision,
    /// Object sets are compared whenever the result is not older than the
    /// stored one, so unrelated index mutations keep the old handle.
    #[default]
    ObjectSet,
}

/// Per-binding watch settings.
///
/// `debounce` is in milliseconds. Absent means the default batching window;
/// an explicit `0` disables batching so every index update is observed
/// immediately.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debounce: Option<u64>,
    #[serde(default)]
    pub change_detection: ChangeDetection,
}

impl WatchSettings {
    /// Settings with an explicit debounce window in milliseconds.
    pub fn with_debounce_ms(debounce: u64) -> Self {
        Self {
            debounce: Some(debounce),
            ..Self::default()
        }
    }

    pub fn with_change_detection(mut self, change_detection: ChangeDetection) -> Self {
        self.change_detection = change_detection;
        self
    }

    /// Settings that observe every update without batching.
    pub fn immediate() -> Self {
        Self::with_debounce_ms(0)
    }

    /// Effective debounce window.
    pub fn debounce_duration(&self) -> Duration {
        match self.debounce {
            Some(ms) => Duration::from_millis(ms),
            None => WatchConfig::DEFAULT_DEBOUNCE,
        }
    }

    /// Whether updates bypass the debounce timer entirely.
    pub fn is_immediate(&self) -> bool {
        self.debounce_duration().is_zero()
    }
}
