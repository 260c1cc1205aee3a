//! Error types for annotation, trend aggregation and storage.

use chrono::NaiveDate;
use thiserror::Error;

/// Failures of a single `analyze` call. None of these abort a batch run.
#[derive(Debug, Error)]
pub enum AnnotateError {
    /// Text was empty after normalization.
    #[error("input text is empty")]
    EmptyInput,

    /// External generator unreachable, timed out or refused the call.
    #[error("annotator unavailable: {0}")]
    Unavailable(String),

    /// Response could not be turned into an annotation. `raw` is kept for diagnosis.
    #[error("malformed annotation response: {reason}")]
    Malformed { reason: String, raw: String },
}

impl AnnotateError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    pub fn malformed(reason: impl Into<String>, raw: impl Into<String>) -> Self {
        Self::Malformed {
            reason: reason.into(),
            raw: raw.into(),
        }
    }

    /// Short label used for pending-failure rows and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            AnnotateError::EmptyInput => "empty_input",
            AnnotateError::Unavailable(_) => "unavailable",
            AnnotateError::Malformed { .. } => "malformed",
        }
    }

    /// Transient failures are retried on the next batch run.
    pub fn is_transient(&self) -> bool {
        matches!(self, AnnotateError::Unavailable(_))
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("not found: {0}")]
    NotFound(String),
}

/// Caller errors are raised before any aggregation work starts.
#[derive(Debug, Error)]
pub enum TrendError {
    #[error("invalid range: since {since} is after until {until}")]
    InvalidRange { since: NaiveDate, until: NaiveDate },

    #[error("unknown {kind} dimension: {value}")]
    UnknownDimension { kind: &'static str, value: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
