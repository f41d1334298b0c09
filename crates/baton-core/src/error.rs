//! Error taxonomy for coordination operations.

use baton_state::StorageError;

/// Errors produced by the coordination layer.
#[derive(Debug, thiserror::Error)]
pub enum BatonError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("invalid task data: {0}")]
    InvalidTaskData(String),
}

impl BatonError {
    /// True when the shared documents have not been created yet.
    pub fn is_not_initialized(&self) -> bool {
        matches!(self, BatonError::Storage(e) if e.is_not_initialized())
    }
}

/// Result type for coordination operations.
pub type Result<T> = std::result::Result<T, BatonError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_display_and_classification() {
        let err = BatonError::from(StorageError::NotInitialized {
            document: "tasks.json".to_string(),
        });
        assert!(err.to_string().contains("tasks.json"));
        assert!(err.is_not_initialized());
    }

    #[test]
    fn test_invalid_task_data_is_not_an_initialization_error() {
        let err = BatonError::InvalidTaskData("expected object".to_string());
        assert!(err.to_string().contains("invalid task data"));
        assert!(!err.is_not_initialized());
    }
}
