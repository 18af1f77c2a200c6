//! Error types for BridgeLedger conversions.

use crate::SourceTxId;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Main error type for conversion operations.
///
/// Every variant aborts the whole unit of work it occurred in; no partial
/// effect of a failed unit is ever committed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConversionError {
    /// Malformed input. Caller error, nothing was changed.
    #[error("Invalid request: {message}")]
    InvalidRequest {
        message: String,
        field: Option<String>,
    },

    /// The source transaction was already credited. Never resubmit.
    #[error("Source transaction already used: {0}")]
    AlreadyUsed(SourceTxId),

    /// Prices could not be obtained. Safe to resubmit later.
    #[error("Price unavailable: {0}")]
    PriceUnavailable(String),

    /// Division by a zero price.
    #[error("Division by zero")]
    DivisionByZero,

    /// A value exceeded its fixed-point width.
    #[error("Arithmetic overflow")]
    Overflow,

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ConversionError {
    /// Create an `InvalidRequest` without a field.
    pub fn invalid(message: impl Into<String>) -> Self {
        ConversionError::InvalidRequest {
            message: message.into(),
            field: None,
        }
    }

    /// Create an `InvalidRequest` naming the offending field.
    pub fn invalid_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        ConversionError::InvalidRequest {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Check if resubmitting the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ConversionError::PriceUnavailable(_))
    }

    /// Get the discriminating kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConversionError::InvalidRequest { .. } => ErrorKind::InvalidRequest,
            ConversionError::AlreadyUsed(_) => ErrorKind::AlreadyUsed,
            ConversionError::PriceUnavailable(_) => ErrorKind::PriceUnavailable,
            ConversionError::DivisionByZero => ErrorKind::DivisionByZero,
            ConversionError::Overflow => ErrorKind::Overflow,
            ConversionError::Configuration(_) => ErrorKind::Configuration,
        }
    }

    /// Get error code for logs and machine-readable output.
    pub fn error_code(&self) -> &'static str {
        self.kind().code()
    }
}

/// Field-less discriminant of [`ConversionError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    InvalidRequest,
    AlreadyUsed,
    PriceUnavailable,
    DivisionByZero,
    Overflow,
    Configuration,
}

impl ErrorKind {
    /// All kinds, in declaration order.
    pub const ALL: [ErrorKind; 6] = [
        ErrorKind::InvalidRequest,
        ErrorKind::AlreadyUsed,
        ErrorKind::PriceUnavailable,
        ErrorKind::DivisionByZero,
        ErrorKind::Overflow,
        ErrorKind::Configuration,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::InvalidRequest => "INVALID_REQUEST",
            ErrorKind::AlreadyUsed => "ALREADY_USED",
            ErrorKind::PriceUnavailable => "PRICE_UNAVAILABLE",
            ErrorKind::DivisionByZero => "DIVISION_BY_ZERO",
            ErrorKind::Overflow => "OVERFLOW",
            ErrorKind::Configuration => "CONFIGURATION_ERROR",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Result type alias for conversion operations.
pub type Result<T> = std::result::Result<T, ConversionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable() {
        assert!(ConversionError::PriceUnavailable("feed down".into()).is_retryable());
        assert!(!ConversionError::AlreadyUsed(SourceTxId::from_bytes([7; 32])).is_retryable());
        assert!(!ConversionError::Overflow.is_retryable());
        assert!(!ConversionError::invalid("bad").is_retryable());
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(ConversionError::DivisionByZero.error_code(), "DIVISION_BY_ZERO");
        assert_eq!(
            ConversionError::invalid_field("zero", "source_amount").error_code(),
            "INVALID_REQUEST"
        );
        assert_eq!(ErrorKind::ALL.len(), 6);
    }

    #[test]
    fn test_display() {
        let err = ConversionError::invalid_field("amount must be positive", "source_amount");
        assert_eq!(err.to_string(), "Invalid request: amount must be positive");
    }
}
