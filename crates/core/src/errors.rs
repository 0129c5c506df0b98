use thiserror::Error;

/// Unified error type for the entire binnaculum-core library.
/// Every public fallible function returns `Result<T, CoreError>`.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Lookups ─────────────────────────────────────────────────────
    /// The key is absent from the index AND from a full scan of the
    /// source collection. Callers treat it as a local, recoverable error.
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    // ── Aggregation ─────────────────────────────────────────────────
    #[error("Aggregation failed in {stage}: {message}")]
    AggregationFailure { stage: String, message: String },

    // ── Persistence (external collaborator) ─────────────────────────
    #[error("Persistence error: {0}")]
    Persistence(String),

    // ── Configuration ───────────────────────────────────────────────
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    // ── Runtime ─────────────────────────────────────────────────────
    #[error("No async runtime available: {0}")]
    NoRuntime(String),

    // ── Business Logic ──────────────────────────────────────────────
    #[error("Validation failed: {0}")]
    ValidationError(String),
}

impl CoreError {
    pub fn not_found(entity: &'static str, key: impl std::fmt::Display) -> Self {
        CoreError::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    pub fn aggregation(stage: impl Into<String>, message: impl Into<String>) -> Self {
        CoreError::AggregationFailure {
            stage: stage.into(),
            message: message.into(),
        }
    }

    /// True for the lookup miss signal, which callers handle locally.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, CoreError::NotFound { .. })
    }
}

// ── Conversion helpers (From impls) ─────────────────────────────────

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Deserialization(e.to_string())
    }
}

impl From<tokio::runtime::TryCurrentError> for CoreError {
    fn from(e: tokio::runtime::TryCurrentError) -> Self {
        CoreError::NoRuntime(e.to_string())
    }
}
