use thiserror::Error;

/// Infrastructure failures of a validation run. Expected data defects never
/// take this path; they become report errors instead.
#[derive(Debug, Error)]
pub enum ValidateError {
    #[error(transparent)]
    Ingest(#[from] genosub_ingest::IngestError),
    #[error(transparent)]
    Model(#[from] genosub_model::ModelError),
    #[error("validation cancelled")]
    Cancelled,
    #[error("exclusion dictionary unavailable: {0}")]
    Exclusions(String),
    #[error("flow execution failed: {0}")]
    Executor(String),
}

impl ValidateError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ValidateError::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, ValidateError>;
