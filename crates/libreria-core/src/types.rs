//! # Domain Types
//!
//! Core domain types used throughout the fulfillment system.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │      Book       │   │   StockRecord   │   │      Card       │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  book_id        │   │  id (UUID)      │       │
//! │  │  title, author  │   │  available_qty  │   │  card_type      │       │
//! │  │  price_cents    │   │  reserved_qty   │   │  balance_cents  │       │
//! │  │  active         │   │  version (CAS)  │   │  expiry, active │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Principal    │   │  ShippingType   │   │    TaxRate      │       │
//! │  │  id + Role      │   │  Domicilio /    │   │  bps (u32)      │       │
//! │  │  (explicit, no  │   │  RecogidaTienda │   │  1900 = 19%     │       │
//! │  │  ambient state) │   └─────────────────┘   └─────────────────┘       │
//! │  └─────────────────┘                                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Entities carry a UUID `id` for relations plus a human-readable business
//! key where one exists (sale `numero`, return `codigo`).

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// 1 basis point = 0.01% = 1/10000, so 1900 bps = 19%.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Creates a tax rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Zero tax rate.
    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate::zero()
    }
}

// =============================================================================
// Principal & Roles
// =============================================================================

/// Role of the authenticated caller, as supplied by the auth middleware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Cliente,
    Administrador,
    Root,
}

impl Role {
    /// Admin roles may force shipment transitions, inspect returns and
    /// override card balances.
    #[inline]
    pub const fn is_admin(&self) -> bool {
        matches!(self, Role::Administrador | Role::Root)
    }
}

/// The authenticated caller of an orchestrator operation.
///
/// Passed explicitly to every operation; the core never reads ambient
/// request state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Authenticated user id (UUID).
    pub id: String,
    /// Role supplied by the auth middleware. Trusted as-is.
    pub role: Role,
}

impl Principal {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Principal {
            id: id.into(),
            role,
        }
    }

    pub fn cliente(id: impl Into<String>) -> Self {
        Principal::new(id, Role::Cliente)
    }

    pub fn administrador(id: impl Into<String>) -> Self {
        Principal::new(id, Role::Administrador)
    }
}

// =============================================================================
// Book (catalog snapshot data)
// =============================================================================

/// The slice of catalog data the fulfillment core consumes.
///
/// The catalog service owns everything else about a book; the core only
/// reads snapshot fields (title, author, current price) and mutates the
/// stock counters through the stock ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Book {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Title shown on sale snapshots.
    pub title: String,

    /// Author shown on sale snapshots.
    pub author: String,

    /// Current price in cents. Cart lines freeze their own copy.
    pub price_cents: i64,

    /// Whether the book is sellable (soft delete).
    pub active: bool,
}

impl Book {
    /// Returns the current price as Money.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }
}

// =============================================================================
// Stock Record
// =============================================================================

/// Per-book stock counters, mutated only through the stock ledger.
///
/// ## Invariants
/// - `available_qty >= 0` and `reserved_qty >= 0` at all times
/// - `available_qty + reserved_qty` (total physical stock) never decreases
///   except via a permanent commit or an admin edit
/// - `version` increases by exactly 1 on every successful write and is the
///   optimistic-concurrency token for compare-and-swap
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockRecord {
    pub book_id: String,
    pub available_qty: i64,
    pub reserved_qty: i64,
    pub version: u64,
}

impl StockRecord {
    /// Creates a fresh record with everything available.
    pub fn new(book_id: impl Into<String>, available_qty: i64) -> Self {
        StockRecord {
            book_id: book_id.into(),
            available_qty,
            reserved_qty: 0,
            version: 0,
        }
    }

    /// Total physical stock on hand (available + reserved).
    #[inline]
    pub const fn total_physical(&self) -> i64 {
        self.available_qty + self.reserved_qty
    }
}

// =============================================================================
// Cards
// =============================================================================

/// Kind of payment card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardType {
    /// Revolving credit: debits authorize without a balance check.
    Credito,
    /// Balance-backed: debits fail when `amount > balance`.
    Debito,
}

/// A payment card owned by a customer.
///
/// `balance_cents` is mutated only by the payment ledger; admin-initiated
/// changes require an explicit reason recorded in the audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Card {
    pub id: String,
    pub owner_id: String,
    pub card_type: CardType,
    pub balance_cents: i64,
    /// Expiry month, 1-12.
    pub expiry_month: u32,
    /// Expiry year, four digits.
    pub expiry_year: i32,
    pub active: bool,
    pub is_default: bool,
}

impl Card {
    /// Returns the balance as Money.
    #[inline]
    pub fn balance(&self) -> Money {
        Money::from_cents(self.balance_cents)
    }

    /// A card is valid through the last day of its expiry month.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        let (y, m) = (now.year(), now.month());
        (self.expiry_year, self.expiry_month) < (y, m)
    }

    /// Validity check used before any ledger operation: active and not
    /// expired.
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.active && !self.is_expired(now)
    }
}

/// Kind of balance mutation, for the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalanceMutationKind {
    Debito,
    Credito,
    AjusteAdmin,
}

/// Before/after snapshot of a card balance mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceMutation {
    pub id: String,
    pub card_id: String,
    pub kind: BalanceMutationKind,
    pub before_cents: i64,
    pub after_cents: i64,
    /// Mandatory for admin adjustments; the transaction id otherwise.
    pub reason: String,
    pub at: DateTime<Utc>,
}

// =============================================================================
// Shipping
// =============================================================================

/// How a sale reaches the customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "tipo")]
pub enum ShippingType {
    /// Home delivery to a street address. Carries the flat fee.
    Domicilio { direccion: String },
    /// Free pickup at a store.
    RecogidaTienda { id_tienda: String },
}

impl ShippingType {
    /// Shipping cost is a pure function of the shipping type: the given
    /// flat fee for home delivery, zero for store pickup. Never persisted
    /// as state; the fee itself is a runtime knob of the caller.
    pub fn shipping_cost(&self, home_delivery_fee: Money) -> Money {
        match self {
            ShippingType::Domicilio { .. } => home_delivery_fee,
            ShippingType::RecogidaTienda { .. } => Money::zero(),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
