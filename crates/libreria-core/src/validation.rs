//! # Validation Module
//!
//! Input validation utilities for the fulfillment core.
//!
//! Validation runs before any business logic: everything here returns a
//! [`ValidationError`], which callers surface as a client-recoverable
//! failure (HTTP 400 at the eventual edge).

use crate::error::ValidationError;
use crate::MAX_LINE_QUANTITY;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a cart/sale line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_LINE_QUANTITY (3 copies of one title per order)
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "cantidad".to_string(),
        });
    }

    if qty > MAX_LINE_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "cantidad".to_string(),
            min: 1,
            max: MAX_LINE_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a monetary amount that must be strictly positive
/// (debits, credits, refunds).
pub fn validate_amount_cents(cents: i64) -> ValidationResult<()> {
    if cents <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "monto".to_string(),
        });
    }

    Ok(())
}

/// Validates an admin balance override value. Zero is allowed; negatives
/// are rejected.
pub fn validate_balance_cents(cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::OutOfRange {
            field: "saldo".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates a refund percentage for partial inspection approval.
///
/// ## Rules
/// - Must be between 0 and 100 inclusive
pub fn validate_refund_percentage(pct: i64) -> ValidationResult<u8> {
    if !(0..=100).contains(&pct) {
        return Err(ValidationError::OutOfRange {
            field: "porcentajeReembolso".to_string(),
            min: 0,
            max: 100,
        });
    }

    Ok(pct as u8)
}

// =============================================================================
// String Validators
// =============================================================================

/// Validates a mandatory free-text reason (cancellations, return requests,
/// admin balance overrides).
pub fn validate_reason(reason: &str) -> ValidationResult<String> {
    let reason = reason.trim();

    if reason.is_empty() {
        return Err(ValidationError::Required {
            field: "motivo".to_string(),
        });
    }

    if reason.len() > 500 {
        return Err(ValidationError::TooLong {
            field: "motivo".to_string(),
            max: 500,
        });
    }

    Ok(reason.to_string())
}

/// Validates a shipping address for home delivery.
pub fn validate_address(address: &str) -> ValidationResult<String> {
    let address = address.trim();

    if address.is_empty() {
        return Err(ValidationError::Required {
            field: "direccion_envio".to_string(),
        });
    }

    if address.len() > 300 {
        return Err(ValidationError::TooLong {
            field: "direccion_envio".to_string(),
            max: 300,
        });
    }

    Ok(address.to_string())
}

/// Validates a carrier tracking number (required to mark a sale enviado).
pub fn validate_tracking(tracking: &str) -> ValidationResult<String> {
    let tracking = tracking.trim();

    if tracking.is_empty() {
        return Err(ValidationError::Required {
            field: "tracking".to_string(),
        });
    }

    if !tracking
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "tracking".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(tracking.to_string())
}

/// Validates a UUID string format.
pub fn validate_uuid(id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "id".to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: "id".to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(3).is_ok());

        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(4).is_err());
    }

    #[test]
    fn test_validate_amount_cents() {
        assert!(validate_amount_cents(1).is_ok());
        assert!(validate_amount_cents(0).is_err());
        assert!(validate_amount_cents(-100).is_err());
    }

    #[test]
    fn test_validate_balance_cents_allows_zero() {
        assert!(validate_balance_cents(0).is_ok());
        assert!(validate_balance_cents(5000).is_ok());
        assert!(validate_balance_cents(-1).is_err());
    }

    #[test]
    fn test_validate_refund_percentage() {
        assert_eq!(validate_refund_percentage(0).unwrap(), 0);
        assert_eq!(validate_refund_percentage(50).unwrap(), 50);
        assert_eq!(validate_refund_percentage(100).unwrap(), 100);

        assert!(validate_refund_percentage(-1).is_err());
        assert!(validate_refund_percentage(101).is_err());
    }

    #[test]
    fn test_validate_reason() {
        assert_eq!(validate_reason("  cambió de opinión ").unwrap(), "cambió de opinión");
        assert!(validate_reason("").is_err());
        assert!(validate_reason("   ").is_err());
        assert!(validate_reason(&"x".repeat(600)).is_err());
    }

    #[test]
    fn test_validate_tracking() {
        assert!(validate_tracking("TRK-12345").is_ok());
        assert!(validate_tracking("").is_err());
        assert!(validate_tracking("has space").is_err());
    }

    #[test]
    fn test_validate_uuid() {
        assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000").is_ok());
        assert!(validate_uuid("").is_err());
        assert!(validate_uuid("not-a-uuid").is_err());
    }
}
