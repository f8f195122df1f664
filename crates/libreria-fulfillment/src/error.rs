//! # Service Error Types
//!
//! The serializable error surface of the fulfillment service.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Error Flow                                       │
//! │                                                                         │
//! │  ValidationError ──► CoreError ──► ServiceError { code, message }       │
//! │                                                                         │
//! │  The {code, message} pair is the wire shape. `code` is a stable         │
//! │  machine-readable discriminant; `message` is human-readable and may     │
//! │  change between releases. An eventual HTTP edge maps codes to status    │
//! │  via ErrorCode::status_code().                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use libreria_core::error::{CoreError, ValidationError};

/// Result type alias for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

// =============================================================================
// Error Codes
// =============================================================================

/// Stable machine-readable error discriminants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ValidationFailed,
    InsufficientStock,
    InsufficientBalance,
    ConcurrencyConflict,
    InvalidStateTransition,
    NotFound,
    UnknownReservation,
    ReturnWindowExpired,
    InvalidCard,
    PriceDriftUnconfirmed,
    Unauthorized,
    Forbidden,
    Internal,
}

impl ErrorCode {
    /// HTTP status for an eventual REST edge. Client-recoverable failures
    /// map to 4xx; only genuine bugs map to 500.
    pub const fn status_code(&self) -> u16 {
        match self {
            ErrorCode::ValidationFailed => 400,
            ErrorCode::PriceDriftUnconfirmed => 400,
            ErrorCode::Unauthorized => 401,
            ErrorCode::InsufficientBalance => 402,
            ErrorCode::Forbidden => 403,
            ErrorCode::NotFound => 404,
            ErrorCode::UnknownReservation => 404,
            ErrorCode::InsufficientStock => 409,
            ErrorCode::ConcurrencyConflict => 409,
            ErrorCode::InvalidStateTransition => 409,
            ErrorCode::InvalidCard => 422,
            ErrorCode::ReturnWindowExpired => 422,
            ErrorCode::Internal => 500,
        }
    }
}

// =============================================================================
// Service Error
// =============================================================================

/// The error callers of the fulfillment service see.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("{code:?}: {message}")]
pub struct ServiceError {
    pub code: ErrorCode,
    pub message: String,
}

impl ServiceError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ServiceError {
            code,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message)
    }
}

impl From<CoreError> for ServiceError {
    fn from(err: CoreError) -> Self {
        let code = match &err {
            CoreError::Validation(_) => ErrorCode::ValidationFailed,
            CoreError::InsufficientStock { .. } => ErrorCode::InsufficientStock,
            CoreError::InsufficientBalance { .. } => ErrorCode::InsufficientBalance,
            CoreError::ConcurrentModification { .. } => ErrorCode::ConcurrencyConflict,
            CoreError::InvalidStateTransition { .. } => ErrorCode::InvalidStateTransition,
            CoreError::NotFound { .. } => ErrorCode::NotFound,
            CoreError::UnknownReservation { .. } => ErrorCode::UnknownReservation,
            CoreError::ReturnWindowExpired { .. } => ErrorCode::ReturnWindowExpired,
            CoreError::InvalidCard { .. } => ErrorCode::InvalidCard,
            CoreError::Unauthorized => ErrorCode::Unauthorized,
            CoreError::Forbidden { .. } => ErrorCode::Forbidden,
            CoreError::PriceDriftUnconfirmed { .. } => ErrorCode::PriceDriftUnconfirmed,
        };
        ServiceError::new(code, err.to_string())
    }
}

impl From<ValidationError> for ServiceError {
    fn from(err: ValidationError) -> Self {
        ServiceError::new(ErrorCode::ValidationFailed, err.to_string())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_error_mapping() {
        let err: ServiceError = CoreError::InsufficientStock {
            book_id: "b1".to_string(),
            available: 0,
            requested: 1,
        }
        .into();
        assert_eq!(err.code, ErrorCode::InsufficientStock);
        assert_eq!(err.code.status_code(), 409);
        assert!(err.message.contains("b1"));
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(ErrorCode::ValidationFailed.status_code(), 400);
        assert_eq!(ErrorCode::Unauthorized.status_code(), 401);
        assert_eq!(ErrorCode::InsufficientBalance.status_code(), 402);
        assert_eq!(ErrorCode::Forbidden.status_code(), 403);
        assert_eq!(ErrorCode::NotFound.status_code(), 404);
        assert_eq!(ErrorCode::ReturnWindowExpired.status_code(), 422);
        assert_eq!(ErrorCode::Internal.status_code(), 500);
    }

    #[test]
    fn test_wire_shape() {
        let err = ServiceError::new(ErrorCode::NotFound, "Sale not found: VEN-1");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "NOT_FOUND");
        assert_eq!(json["message"], "Sale not found: VEN-1");
    }
}
