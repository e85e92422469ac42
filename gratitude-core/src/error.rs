use thiserror::Error;

use crate::document::DocumentError;

#[derive(Error, Debug)]
pub enum GratitudeError {
    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Document error: {0}")]
    Document(#[from] DocumentError),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, GratitudeError>;
