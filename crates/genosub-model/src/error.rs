use thiserror::Error;

use crate::submission::SubmissionState;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("file schema {schema}: invalid filename pattern: {source}")]
    InvalidPattern {
        schema: String,
        #[source]
        source: regex::Error,
    },
    #[error("file schema {schema} does not declare field {field}")]
    UnknownField { schema: String, field: String },
    #[error("dictionary {version} is closed and immutable; clone it to a new version")]
    DictionaryClosed { version: String },
    #[error("invalid submission state transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: SubmissionState,
        to: SubmissionState,
    },
    #[error("signoff denied for project {project_key}")]
    SignoffDenied { project_key: String },
}

pub type Result<T> = std::result::Result<T, ModelError>;
