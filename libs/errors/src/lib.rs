//! Unified error handling for the city sensor services
//!
//! Every library crate in the workspace returns [`CityResult`]; the service
//! binary maps [`CityError`] onto HTTP responses through [`CityError::status_code`]
//! and [`CityError::to_error_info`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

// ============================================================================
// ErrorInfo - API error response type
// ============================================================================

/// Standard error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Error code (HTTP status or custom)
    pub code: u16,
    /// Error message
    pub message: String,
    /// Detailed error description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Field-specific errors for validation
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub field_errors: HashMap<String, Vec<String>>,
}

impl ErrorInfo {
    /// Create a new ErrorInfo with just a message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: 500,
            message: message.into(),
            details: None,
            field_errors: HashMap::new(),
        }
    }

    /// Set the error code
    pub fn with_code(mut self, code: u16) -> Self {
        self.code = code;
        self
    }

    /// Add details
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Add a field error
    pub fn add_field_error(mut self, field: impl Into<String>, error: impl Into<String>) -> Self {
        self.field_errors
            .entry(field.into())
            .or_default()
            .push(error.into());
        self
    }
}

// ============================================================================
// CityError - Main error type
// ============================================================================

/// Main error type for the sensor ingestion stack
#[derive(Debug, Error)]
pub enum CityError {
    // ======================================
    // Configuration Errors
    // ======================================
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid configuration: {field}: {reason}")]
    InvalidConfig { field: String, reason: String },

    // ======================================
    // Storage Errors
    // ======================================
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Storage operation timed out after {timeout_ms}ms: {key}")]
    StorageTimeout { key: String, timeout_ms: u64 },

    #[error("Corrupted record for {key}: {reason}")]
    CorruptedRecord { key: String, reason: String },

    // ======================================
    // Validation Errors
    // ======================================
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Invalid parameter: {param}: {reason}")]
    InvalidParameter { param: String, reason: String },

    #[error("Malformed reading: {0}")]
    MalformedReading(String),

    // ======================================
    // Dispatch Errors
    // ======================================
    #[error("Alert dispatch failed: {0}")]
    Dispatch(String),

    #[error("Notification delivery failed: {endpoint}: {reason}")]
    Notification { endpoint: String, reason: String },

    // ======================================
    // API & HTTP Errors
    // ======================================
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {resource}")]
    NotFound { resource: String },

    #[error("Timeout waiting for {0}")]
    Timeout(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    // ======================================
    // File & I/O Errors
    // ======================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    // ======================================
    // Catch-all
    // ======================================
    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using CityError
pub type CityResult<T> = Result<T, CityError>;

impl CityError {
    /// Get the appropriate HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request
            Self::BadRequest(_)
            | Self::Validation(_)
            | Self::InvalidParameter { .. }
            | Self::MalformedReading(_) => 400,

            // 404 Not Found
            Self::NotFound { .. } => 404,

            // 502 Bad Gateway
            Self::Dispatch(_) | Self::Notification { .. } => 502,

            // 503 Service Unavailable
            Self::ServiceUnavailable(_) => 503,

            // 504 Gateway Timeout
            Self::Timeout(_) | Self::StorageTimeout { .. } => 504,

            // 500 Internal Server Error
            Self::Configuration(_)
            | Self::InvalidConfig { .. }
            | Self::Storage(_)
            | Self::CorruptedRecord { .. }
            | Self::Io(_)
            | Self::Serialization(_)
            | Self::Internal(_)
            | Self::Other(_) => 500,
        }
    }

    /// Whether this error originated in the storage layer
    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            Self::Storage(_) | Self::StorageTimeout { .. } | Self::CorruptedRecord { .. } | Self::Io(_)
        )
    }

    /// Convert to API ErrorInfo for HTTP responses
    pub fn to_error_info(&self) -> ErrorInfo {
        let mut error_info = ErrorInfo::new(self.to_string()).with_code(self.status_code());

        match self {
            Self::InvalidParameter { param, reason } => {
                error_info = error_info.add_field_error(param, reason);
            },
            Self::InvalidConfig { field, reason } => {
                error_info = error_info.add_field_error(field, reason);
            },
            Self::Validation(msg) | Self::MalformedReading(msg) => {
                error_info = error_info.with_details(msg.clone());
            },
            _ => {},
        }

        error_info
    }
}

// Conversion traits for common error types
impl From<serde_json::Error> for CityError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
