use hostwatch_storage::StoreError;

/// Errors surfaced by the evaluation engine and alert lifecycle.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The referenced rule or alert does not exist.
    #[error("Alert: {entity} not found (id={id})")]
    NotFound { entity: &'static str, id: String },

    /// The input violates a contract (blank comment text, blank title,
    /// negative cooldown).
    #[error("Alert: validation failed: {0}")]
    Validation(String),

    /// The requested transition is not legal from the current status.
    #[error("Alert: invalid state transition: {0}")]
    InvalidState(String),

    /// Storage failed for a reason other than the domain errors above.
    #[error("Alert: storage failure: {0}")]
    Store(StoreError),
}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { entity, id } => EngineError::NotFound { entity, id },
            StoreError::Validation(msg) => EngineError::Validation(msg),
            StoreError::InvalidState(msg) => EngineError::InvalidState(msg),
            other => EngineError::Store(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
