//! # Error Handling
//!
//! One error type for the whole engine. Kinds map 1:1 onto what the
//! public API can report: lifecycle (`ShuttingDown`), catalog lookups
//! (`NotFound` / `AlreadyExists`), input validation (`InvalidArgument`),
//! admission control (`CacheFull`) and the three collaborator failure
//! domains (`Meta`, `Engine`, `Job`).

use thiserror::Error;

/// Result type alias for Quiver operations
pub type Result<T> = std::result::Result<T, Error>;

/// Primary error type for Quiver
#[derive(Error, Debug)]
pub enum Error {
    #[error("engine is shutting down")]
    ShuttingDown,

    #[error("{what} not found: {name}")]
    NotFound { what: &'static str, name: String },

    #[error("{what} already exists: {name}")]
    AlreadyExists { what: &'static str, name: String },

    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("cache is full")]
    CacheFull,

    #[error("meta store error: {message}")]
    Meta { message: String },

    #[error("index engine error: {message}")]
    Engine { message: String },

    #[error("job failed: {message}")]
    Job { message: String },

    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub fn table_not_found(table_id: impl Into<String>) -> Self {
        Error::NotFound { what: "table", name: table_id.into() }
    }

    pub fn table_already_exists(table_id: impl Into<String>) -> Self {
        Error::AlreadyExists { what: "table", name: table_id.into() }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Error::InvalidArgument { message: message.into() }
    }

    pub fn meta(message: impl Into<String>) -> Self {
        Error::Meta { message: message.into() }
    }

    pub fn engine(message: impl Into<String>) -> Self {
        Error::Engine { message: message.into() }
    }

    pub fn job(message: impl Into<String>) -> Self {
        Error::Job { message: message.into() }
    }

    /// Get error code for monitoring
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::ShuttingDown => "SHUTTING_DOWN",
            Error::NotFound { .. } => "NOT_FOUND",
            Error::AlreadyExists { .. } => "ALREADY_EXISTS",
            Error::InvalidArgument { .. } => "INVALID_ARGUMENT",
            Error::CacheFull => "CACHE_FULL",
            Error::Meta { .. } => "META_ERROR",
            Error::Engine { .. } => "ENGINE_ERROR",
            Error::Job { .. } => "JOB_ERROR",
            Error::Io { .. } => "IO_ERROR",
        }
    }

    /// Check if error is recoverable (the caller may retry)
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::ShuttingDown => false,
            Error::Io { .. } => false,
            Error::CacheFull => true,
            _ => true,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io { message: err.to_string(), source: err }
    }
}
