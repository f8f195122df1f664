//! # libreria-core: Pure Business Logic for the Libreria Fulfillment Core
//!
//! This crate is the **heart** of the order-fulfillment system. It contains
//! all business rules as pure functions and types with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Libreria Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              libreria-fulfillment (Service Layer)               │   │
//! │  │     Sale saga, shipment transitions, return workflow            │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              libreria-ledger (Concurrent State)                 │   │
//! │  │     Stock ledger (CAS), payment ledger, entity stores           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ libreria-core (THIS CRATE) ★                    │   │
//! │  │                                                                 │   │
//! │  │   ┌────────┐ ┌────────┐ ┌─────────┐ ┌────────┐ ┌────────────┐  │   │
//! │  │   │ money  │ │ types  │ │  cart   │ │ sale   │ │ devolucion │  │   │
//! │  │   │pricing │ │discount│ │validate │ │machine │ │  machine   │  │   │
//! │  │   └────────┘ └────────┘ └─────────┘ └────────┘ └────────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS            │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Book, StockRecord, Card, Principal, ...)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`cart`] - Shopping cart with add-time price freezing and drift flags
//! - [`discount`] - Discount rules and the fixed-order evaluation policy
//! - [`pricing`] - Quote computation and price-drift detection
//! - [`sale`] - Sale snapshot + shipment state machine
//! - [`devolucion`] - Return aggregate + refund state machine
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: Every function is deterministic - same input = same output
//! 2. **No I/O**: Database, network, file system access is FORBIDDEN here
//! 3. **Integer Money**: All monetary values are in cents (i64) to avoid float errors
//! 4. **Explicit Errors**: All errors are typed, never strings or panics

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod devolucion;
pub mod discount;
pub mod error;
pub mod money;
pub mod pricing;
pub mod sale;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use cart::{Cart, CartLine, CartTotals};
pub use devolucion::{
    validate_return_window, InspectionResult, ItemInspection, Return, ReturnItem, ReturnState,
    ReturnTotals,
};
pub use discount::{DiscountCode, DiscountPolicy, DiscountRule};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use pricing::{DriftReport, Quote};
pub use sale::{
    Cancellation, PaymentInfo, PaymentMethod, PaymentState, Sale, SaleItem, SaleState,
    SaleTotals, ShippingInfo, TaxInfo,
};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum quantity of a single book in a cart line.
///
/// ## Business Reason
/// The store limits any one title to three copies per order to keep stock
/// available for other buyers. Configurable per-store in future versions.
pub const MAX_LINE_QUANTITY: i64 = 3;

/// Days after delivery during which a return may be requested.
pub const RETURN_WINDOW_DAYS: i64 = 8;

/// Flat shipping fee for home delivery, in cents. Store pickup is free.
pub const HOME_DELIVERY_FEE_CENTS: i64 = 500;

/// Default tax rate in basis points (1900 = 19%).
pub const DEFAULT_TAX_RATE_BPS: u32 = 1900;

/// Default bound on optimistic-concurrency retries in the stock ledger.
pub const DEFAULT_CAS_RETRY_BUDGET: u32 = 5;
