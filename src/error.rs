//! Error types for spotlist

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid viewport: {0}")]
    InvalidViewport(String),

    #[error("Invalid point: {0}")]
    InvalidPoint(String),

    #[error("Unknown category: {0}")]
    UnknownCategory(String),

    #[error("Invalid limit: {0}")]
    InvalidLimit(String),

    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),

    #[error("Cursor was issued for a different origin point")]
    CursorOriginMismatch,

    #[error("At least one of keyword, category or viewport must be provided")]
    MissingFilter,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn store(msg: impl Into<String>) -> Self {
        Error::Store(msg.into())
    }

    pub fn invalid_cursor(msg: impl Into<String>) -> Self {
        Error::InvalidCursor(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Error::Internal(msg.into())
    }

    /// True for errors raised by request validation, before any store access.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidViewport(_)
                | Error::InvalidPoint(_)
                | Error::UnknownCategory(_)
                | Error::InvalidLimit(_)
                | Error::InvalidCursor(_)
                | Error::CursorOriginMismatch
                | Error::MissingFilter
                | Error::InvalidRequest(_)
        )
    }
}
