use crate::domain::inputs::ValidationError;

/// Failure of one backup run, classified by the step that failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackupError {
    #[error("invalid configuration: {0}")]
    Validation(#[from] ValidationError),
    #[error("credential exchange failed: {0}")]
    Auth(String),
    #[error("archive creation failed: {0}")]
    Archive(String),
    #[error("storage operation failed: {0}")]
    Storage(String),
}

impl BackupError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::Auth(_) => "auth_error",
            Self::Archive(_) => "archive_error",
            Self::Storage(_) => "storage_error",
        }
    }
}
