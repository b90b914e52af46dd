use crate::subject::SubjectRole;
use thiserror::Error;
use vitalis_document::DocumentError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid date/time format for {field}: {value:?}")]
    InvalidDateFormat { field: String, value: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("unknown subject role code: {0:?}")]
    UnknownRole(String),

    #[error("document has no {0} subject")]
    MissingSubject(SubjectRole),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("document error: {0}")]
    Document(#[from] DocumentError),

    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
