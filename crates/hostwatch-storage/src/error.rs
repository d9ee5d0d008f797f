/// Errors that can occur within the storage layer.
///
/// # Examples
///
/// ```rust
/// use hostwatch_storage::error::StoreError;
///
/// let err = StoreError::NotFound {
///     entity: "alert_rule",
///     id: "rule-99".to_string(),
/// };
/// assert!(err.to_string().contains("alert_rule"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A required record was not found in the database.
    #[error("Storage: {entity} not found (id={id})")]
    NotFound { entity: &'static str, id: String },

    /// The input violates a data-model invariant (blank metric, negative
    /// cooldown, empty comment text).
    #[error("Storage: validation failed: {0}")]
    Validation(String),

    /// The requested state transition is not legal from the alert's
    /// current status.
    #[error("Storage: invalid state transition: {0}")]
    InvalidState(String),

    /// A stored column value could not be parsed back into its domain type.
    #[error("Storage: corrupt value in column '{column}': {value}")]
    Corrupt { column: &'static str, value: String },

    /// An underlying SQLite error.
    #[error("Storage: SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// JSON serialization or deserialization failure (e.g. recipient lists).
    #[error("Storage: JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience `Result` alias for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;
