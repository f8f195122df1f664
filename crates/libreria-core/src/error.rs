//! # Error Types
//!
//! Domain-specific error types for libreria-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  libreria-core errors (this file)                                       │
//! │  ├── CoreError        - Business rule / state machine violations        │
//! │  └── ValidationError  - Input validation failures                       │
//! │                                                                         │
//! │  The ledger crate raises CoreError directly: stock and payment          │
//! │  failures ARE domain failures, not infrastructure failures.             │
//! │                                                                         │
//! │  libreria-fulfillment errors (service boundary)                         │
//! │  └── ServiceError     - Serializable {code, message} for callers        │
//! │                                                                         │
//! │  Flow: ValidationError -> CoreError -> ServiceError                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (book id, quantities, states)
//! 3. Errors are enum variants, never String
//! 4. None are silently swallowed

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// Covers the full fulfillment taxonomy: stock, balance, concurrency,
/// state machine guards and the return window.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Not enough available stock to reserve.
    #[error("Insufficient stock for book {book_id}: available {available}, requested {requested}")]
    InsufficientStock {
        book_id: String,
        available: i64,
        requested: i64,
    },

    /// Debit card balance cannot cover the amount.
    #[error("Insufficient balance on card {card_id}: balance {balance_cents}, requested {requested_cents}")]
    InsufficientBalance {
        card_id: String,
        balance_cents: i64,
        requested_cents: i64,
    },

    /// Version/CAS conflict that survived the internal retry budget.
    ///
    /// Retried internally by the stock ledger; surfaced to callers only
    /// after the budget is exhausted.
    #[error("Concurrent modification of stock for book {book_id} after {attempts} attempts")]
    ConcurrentModification { book_id: String, attempts: u32 },

    /// A state machine guard rejected the requested transition.
    #[error("{entity} {id}: invalid transition {from} -> {to}")]
    InvalidStateTransition {
        entity: &'static str,
        id: String,
        from: String,
        to: String,
    },

    /// Entity lookup failed.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A release/commit referenced a reservation id with no prior reserve.
    #[error("Unknown reservation: {reservation_id}")]
    UnknownReservation { reservation_id: String },

    /// Return requested more than 8 days after delivery.
    #[error("Return window expired for sale {sale_numero}: delivered {days_since_delivery} days ago (limit {limit_days})")]
    ReturnWindowExpired {
        sale_numero: String,
        days_since_delivery: i64,
        limit_days: i64,
    },

    /// Card is expired or inactive.
    #[error("Invalid card {card_id}: {reason}")]
    InvalidCard { card_id: String, reason: String },

    /// Caller is not authenticated for the operation.
    #[error("Unauthorized")]
    Unauthorized,

    /// Caller's role does not permit the operation.
    #[error("Forbidden: {action} requires {required}")]
    Forbidden {
        action: &'static str,
        required: &'static str,
    },

    /// Checkout attempted while cart lines carry unconfirmed price drift.
    #[error("Price drift unconfirmed for books: {book_ids:?}")]
    PriceDriftUnconfirmed { book_ids: Vec<String> },
}

impl CoreError {
    /// Shorthand for a NotFound error.
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity,
            id: id.into(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Always recoverable client-side; raised before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Cart has no lines; nothing to sell.
    #[error("Cart is empty")]
    EmptyCart,
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientStock {
            book_id: "book-1".to_string(),
            available: 1,
            requested: 2,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for book book-1: available 1, requested 2"
        );
    }

    #[test]
    fn test_transition_message() {
        let err = CoreError::InvalidStateTransition {
            entity: "Sale",
            id: "VEN-20260830-0001".to_string(),
            from: "entregado".to_string(),
            to: "cancelada".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Sale VEN-20260830-0001: invalid transition entregado -> cancelada"
        );
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "direccion".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
