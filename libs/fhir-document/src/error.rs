use thiserror::Error;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("expected a Bundle resource, found {0}")]
    NotABundle(String),
    #[error("document bundle has no Composition entry")]
    MissingComposition,
    #[error("resource has no logical id")]
    MissingResourceId,
    #[error("resource {0} is already part of the document")]
    DuplicateResource(String),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DocumentError>;
