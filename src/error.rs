//! Structured error types for variable resolution.

use crate::reference::ReferenceError;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // No value available
    MissingValue,
    ValidationFailed,

    // Broken references
    ContextNotFound,
    ReferenceKeyNotFound,
    ReferenceDepthExceeded,

    // Configuration errors
    MissingCallback,
    NoSaveTarget,

    // Internal errors
    Io,
    Internal,
}

/// Structured error returned by resolution and save operations.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ResolveError {
    pub code: ErrorCode,
    pub message: String,
    /// Display name of the variable being resolved, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variable: Option<String>,
    /// Storage key of the variable being resolved, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Opaque payload, e.g. whatever a validator attached to its failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ResolveError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            variable: None,
            key: None,
            details: None,
        }
    }

    /// Attach the variable this error belongs to, unless one is already set.
    pub fn for_variable(mut self, name: &str, key: &str) -> Self {
        if self.variable.is_none() {
            self.variable = Some(name.to_string());
            self.key = Some(key.to_string());
        }
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    // Convenience constructors

    pub fn missing_value(name: &str, key: &str) -> Self {
        Self::new(
            ErrorCode::MissingValue,
            format!("No value found for {} (key: {})", name, key),
        )
        .for_variable(name, key)
    }

    pub fn validation(name: &str, key: &str, payload: Option<Value>) -> Self {
        let mut err = Self::new(
            ErrorCode::ValidationFailed,
            format!("Validation failed for {} (key: {})", name, key),
        )
        .for_variable(name, key);
        err.details = payload;
        err
    }

    pub fn missing_callback(callback: &str) -> Self {
        Self::new(
            ErrorCode::MissingCallback,
            format!("No {} callback configured", callback),
        )
    }

    pub fn no_save_target(name: &str, key: &str) -> Self {
        Self::new(
            ErrorCode::NoSaveTarget,
            format!("No save target configured for {} (key: {})", name, key),
        )
        .for_variable(name, key)
    }

    pub fn io(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::Io, err.to_string())
    }

    pub fn internal(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::Internal, err.to_string())
    }

    /// True when resolution found no value, no default and did not prompt.
    pub fn is_missing_value(&self) -> bool {
        self.code == ErrorCode::MissingValue
    }

    /// True for failures caused by a broken `@context` reference.
    pub fn is_reference_error(&self) -> bool {
        matches!(
            self.code,
            ErrorCode::ContextNotFound
                | ErrorCode::ReferenceKeyNotFound
                | ErrorCode::ReferenceDepthExceeded
        )
    }
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ResolveError {}

impl From<ReferenceError> for ResolveError {
    fn from(err: ReferenceError) -> Self {
        let code = match err {
            ReferenceError::ContextNotFound { .. } => ErrorCode::ContextNotFound,
            ReferenceError::KeyNotFound { .. } => ErrorCode::ReferenceKeyNotFound,
            ReferenceError::DepthExceeded { .. } => ErrorCode::ReferenceDepthExceeded,
        };
        Self::new(code, err.to_string())
    }
}

// Allow using ? with anyhow errors by converting them
impl From<anyhow::Error> for ResolveError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<ResolveError>() {
            Ok(resolve_err) => resolve_err,
            Err(err) => ResolveError::io(format!("{:#}", err)),
        }
    }
}

/// Result type for resolution operations.
pub type ResolveResult<T> = std::result::Result<T, ResolveError>;
