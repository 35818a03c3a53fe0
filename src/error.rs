use miette::Diagnostic;
use thiserror::Error;

/// Errors surfaced by the reconciliation engine.
///
/// The first four variants are the operational taxonomy callers branch on;
/// the rest wrap lower-level failures from storage and I/O.
#[derive(Error, Debug, Diagnostic)]
pub enum EngineError {
    #[error("Validation error: {0}")]
    #[diagnostic(code(washpos::validation))]
    ValidationError(String),

    #[error("Not found: {0}")]
    #[diagnostic(code(washpos::not_found))]
    NotFoundError(String),

    #[error("Store unavailable: {0}")]
    #[diagnostic(
        code(washpos::transient_store),
        help("nothing was changed; retry the operation once the store is reachable")
    )]
    TransientStoreError(String),

    #[error("Invalid transition: cannot {action} from {from}")]
    #[diagnostic(code(washpos::invalid_transition))]
    InvalidTransitionError { from: String, action: String },

    #[error("CSV error: {0}")]
    #[diagnostic(code(washpos::csv))]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    #[diagnostic(code(washpos::io))]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    #[diagnostic(code(washpos::serialization))]
    SerializationError(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    #[diagnostic(code(washpos::internal))]
    InternalError(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl EngineError {
    /// Whether the same call can be retried without re-validating input.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::TransientStoreError(_))
    }

    pub(crate) fn invalid_transition(from: impl ToString, action: &str) -> Self {
        EngineError::InvalidTransitionError {
            from: from.to_string(),
            action: action.to_string(),
        }
    }
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for EngineError {
    fn from(err: rocksdb::Error) -> Self {
        EngineError::TransientStoreError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
