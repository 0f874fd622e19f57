/// Errors that can occur within the storage layer.
///
/// # Examples
///
/// ```rust
/// use relaymon_storage::error::StoreError;
///
/// let err = StoreError::UpsertReadback { name: "Alloc".to_string() };
/// assert!(err.to_string().contains("Alloc"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// An underlying database error, surfaced after the retry policy gave up
    /// (connection-class errors) or immediately (every other class).
    #[error("storage: database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// An upsert succeeded but returned no row, which should be unreachable.
    #[error("storage: upsert of '{name}' returned no row")]
    UpsertReadback { name: String },

    /// Reading or writing the persistence file failed.
    #[error("storage: file '{path}': {source}")]
    File {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The persisted state could not be serialized or parsed.
    #[error("storage: state serialization: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience `Result` alias for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;
