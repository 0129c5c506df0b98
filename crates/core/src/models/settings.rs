use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::CoreError;

/// Default number of movements fetched per kind and kept per account.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Tunables of the reactive pipeline.
///
/// Debouncing is off by default; when set, bursts of collection changes
/// inside the window collapse into a single pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReactiveSettings {
    /// Page size of every paged movement fetch, and the per-account cap
    /// of the Movements feed.
    pub page_size: usize,

    /// Debounce window of the movement aggregator triggers, in milliseconds.
    pub movements_debounce_ms: Option<u64>,

    /// Debounce window of the snapshot aggregator triggers, in milliseconds.
    pub snapshots_debounce_ms: Option<u64>,
}

impl Default for ReactiveSettings {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            movements_debounce_ms: None,
            snapshots_debounce_ms: None,
        }
    }
}

impl ReactiveSettings {
    /// Parse settings from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.page_size == 0 {
            return Err(CoreError::InvalidConfig(
                "page_size must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn movements_debounce(&self) -> Option<Duration> {
        self.movements_debounce_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }

    #[must_use]
    pub fn snapshots_debounce(&self) -> Option<Duration> {
        self.snapshots_debounce_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }
}
