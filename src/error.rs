//! Error taxonomy for reconciliation operations

use thiserror::Error;

use crate::db::error_code;

pub type Result<T> = std::result::Result<T, ReconcileError>;

/// All failure modes surfaced by the engine.
///
/// `Validation`, `NotFound` and `MalformedId` are raised before any statement
/// is issued, so they never leave partial state behind. `Transient` is
/// retryable by the whole-operation wrapper; everything else from the backend
/// is `Fatal` and propagates immediately.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("malformed grant id {id:?}: {reason}")]
    MalformedId { id: String, reason: String },

    #[error("transient database error [{code}]: {source}")]
    Transient {
        code: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("fatal database error: {source}")]
    Fatal {
        code: Option<String>,
        #[source]
        source: sqlx::Error,
    },
}

impl ReconcileError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn malformed_id(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedId {
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// Classify a driver error into the transient/fatal taxonomy.
    ///
    /// This is the single point where SQLSTATE codes turn into retry policy;
    /// code *detection* (capability probes) goes through
    /// [`error_code::is_code`] instead and never consults this.
    pub fn from_sqlx(source: sqlx::Error) -> Self {
        match error_code::sqlstate(&source) {
            Some(code) if error_code::classify(&code) == error_code::ErrorClass::Transient => {
                Self::Transient { code, source }
            }
            code => Self::Fatal { code, source },
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    /// Rewrap a transient error as fatal once the retry budget is spent.
    pub fn into_fatal(self) -> Self {
        match self {
            Self::Transient { code, source } => Self::Fatal {
                code: Some(code),
                source,
            },
            other => other,
        }
    }
}
