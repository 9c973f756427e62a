// Error types for the Trellis dispatch engine

use crate::HttpStatus;
use serde_json::{Value, json};
use std::fmt;
use thiserror::Error;

/// A structured error raised by handler code, argument resolution or
/// attribute producers.
///
/// Carries its own status code and the JSON payload sent to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestError {
    pub status: u16,
    pub body: Value,
}

impl RequestError {
    /// Create an error with an explicit payload
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    /// Create an error whose payload is `{ "error": message, "code": status }`
    pub fn with_message(status: u16, message: impl Into<String>) -> Self {
        Self::new(status, json!({ "error": message.into(), "code": status }))
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::with_message(HttpStatus::BadRequest.code(), message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::with_message(HttpStatus::Unauthorized.code(), message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::with_message(HttpStatus::Forbidden.code(), message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::with_message(HttpStatus::NotFound.code(), message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::with_message(HttpStatus::Conflict.code(), message)
    }

    /// The human-readable message, if the payload carries one
    pub fn message(&self) -> Option<&str> {
        self.body.get("error").and_then(Value::as_str)
    }
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.message() {
            Some(message) => write!(f, "{} ({})", message, self.status),
            None => write!(f, "request failed with status {}", self.status),
        }
    }
}

impl std::error::Error for RequestError {}

#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Request(#[from] RequestError),

    #[error("No route registered for path: {0}")]
    UnknownPath(String),

    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),

    #[error("Route {0} requires a body but no body parser was supplied")]
    MissingBodyParser(String),

    #[error("Synchronizer {key} woke a waiter that is not at the head of its queue")]
    SynchronizerOutOfOrder { key: String },

    #[error("Invalid parameter binding: {0}")]
    InvalidBinding(String),

    #[error("Failed to parse request body: {0}")]
    BodyParse(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl Error {
    /// Get the HTTP status code for this error.
    ///
    /// Routing errors follow the dispatcher convention: an unknown path is
    /// 405 and a known path without a handler for the method is 404.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Request(e) => e.status,
            Error::UnknownPath(_) => HttpStatus::MethodNotAllowed.code(),
            Error::MethodNotAllowed(_) => HttpStatus::NotFound.code(),
            Error::BodyParse(_) => HttpStatus::BadRequest.code(),
            _ => HttpStatus::InternalServerError.code(),
        }
    }

    /// Get the HttpStatus enum for this error
    pub fn http_status(&self) -> HttpStatus {
        HttpStatus::from_code(self.status_code()).unwrap_or(HttpStatus::InternalServerError)
    }

    /// Check if this is a client error (4xx)
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }

    /// Check if this is a server error (5xx)
    pub fn is_server_error(&self) -> bool {
        self.status_code() >= 500
    }

    /// Whether this error must be hidden behind the generic 500 envelope
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            Error::MissingBodyParser(_)
                | Error::SynchronizerOutOfOrder { .. }
                | Error::InvalidBinding(_)
                | Error::Serialization(_)
                | Error::Internal(_)
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
