use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GateError {
    #[error("Invalid filter format")]
    InvalidFilter,
    #[error("Invalid query parameter: {0}")]
    InvalidParameter(String),
    #[error("Collection name is required")]
    MissingCollection,
    #[error("Document not found")]
    NotFound,
    // store messages are passed through verbatim
    #[error("{0}")]
    Store(String),
    #[error("store operation timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
}

impl GateError {
    pub fn store(err: impl std::fmt::Display) -> Self {
        GateError::Store(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GateError>;
