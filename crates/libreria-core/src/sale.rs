//! # Sale
//!
//! The immutable sale snapshot and its shipment state machine.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Sale Lifecycle                                   │
//! │                                                                         │
//! │  creada ──► pendiente_pago ──► pagada ──► listo_para_envio              │
//! │     │              │              │              │                      │
//! │     │              │              │              ▼                      │
//! │     │              │              │          enviado ──► entregado      │
//! │     │              │              │              │        (terminal)    │
//! │     ▼              ▼              ▼              ▼                      │
//! │  cancelada ◄──────────────────────────────────────                      │
//! │  (terminal; reachable from any state before entregado)                  │
//! │                                                                         │
//! │  enviado requires a carrier tracking number.                            │
//! │  entregado stamps delivered_at (starts the 8-day return window).        │
//! │  Cancellation refunds the card but does NOT restock: committed stock    │
//! │  decrements are permanent sales history.                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Snapshot Pattern
//! Item data (title, author, unit price, quantity) is copied out of the
//! cart at creation time. Later catalog or price edits can never change a
//! completed sale; refunds reconcile against this snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::pricing::Quote;
use crate::types::ShippingType;

// =============================================================================
// Sale State
// =============================================================================

/// The state of a sale. Serialized with the Spanish wire names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaleState {
    Creada,
    PendientePago,
    Pagada,
    ListoParaEnvio,
    Enviado,
    Entregado,
    Cancelada,
}

impl SaleState {
    /// Wire name, also used in error messages.
    pub const fn as_str(&self) -> &'static str {
        match self {
            SaleState::Creada => "creada",
            SaleState::PendientePago => "pendiente_pago",
            SaleState::Pagada => "pagada",
            SaleState::ListoParaEnvio => "listo_para_envio",
            SaleState::Enviado => "enviado",
            SaleState::Entregado => "entregado",
            SaleState::Cancelada => "cancelada",
        }
    }

    /// Terminal states admit no further transitions.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, SaleState::Entregado | SaleState::Cancelada)
    }

    /// The transition table. `cancelada` is reachable from every
    /// non-terminal state.
    pub fn can_transition_to(&self, to: SaleState) -> bool {
        use SaleState::*;
        match (self, to) {
            (_, Cancelada) => !self.is_terminal(),
            (Creada, PendientePago) => true,
            (PendientePago, Pagada) => true,
            (Pagada, ListoParaEnvio) => true,
            (ListoParaEnvio, Enviado) => true,
            (Enviado, Entregado) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for SaleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Payment
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Card payment through the payment ledger. The only method today;
    /// the enum keeps the wire shape open.
    Tarjeta,
}

/// Payment state of a sale, kept consistent with the return workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentState {
    Pagado,
    ReembolsadoParcial,
    ReembolsadoTotal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInfo {
    pub method: PaymentMethod,
    pub card_id: String,
    pub state: PaymentState,
    /// Cumulative refunded amount, for partial-refund bookkeeping.
    pub refunded_cents: i64,
}

// =============================================================================
// Shipping, Totals, Tax
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingInfo {
    #[serde(flatten)]
    pub shipping_type: ShippingType,
    /// Carrier tracking number; mandatory once the sale is enviado.
    pub tracking: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleTotals {
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub tax_cents: i64,
    pub shipping_cents: i64,
    pub final_cents: i64,
}

impl From<Quote> for SaleTotals {
    fn from(q: Quote) -> Self {
        SaleTotals {
            subtotal_cents: q.subtotal_cents,
            discount_cents: q.discount_cents,
            tax_cents: q.tax_cents,
            shipping_cents: q.shipping_cents,
            final_cents: q.total_cents,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxInfo {
    pub paid_by_customer: bool,
}

/// Recorded when a sale is cancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cancellation {
    pub reason: String,
    pub cancelled_by: String,
    pub at: DateTime<Utc>,
}

// =============================================================================
// Sale Item (snapshot)
// =============================================================================

/// A line item frozen into the sale at creation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleItem {
    pub book_id: String,
    /// Title at time of sale (frozen).
    pub title: String,
    /// Author at time of sale (frozen).
    pub author: String,
    /// Unit price in cents at time of sale (frozen).
    pub unit_price_cents: i64,
    pub quantity: i64,
    pub line_total_cents: i64,
}

impl SaleItem {
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.line_total_cents)
    }
}

// =============================================================================
// Sale
// =============================================================================

/// A durable sale. Never deleted; only transitioned to a terminal state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sale {
    /// Business key, e.g. `VEN-20260830-0001`.
    pub numero: String,
    pub customer_id: String,
    pub state: SaleState,
    pub items: Vec<SaleItem>,
    pub payment: PaymentInfo,
    pub shipping: ShippingInfo,
    pub totals: SaleTotals,
    pub tax_info: TaxInfo,
    pub created_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled: Option<Cancellation>,
}

impl Sale {
    /// Guarded state transition. Fails with `InvalidStateTransition`
    /// instead of silently no-op-ing.
    pub fn transition(&mut self, to: SaleState) -> CoreResult<()> {
        if !self.state.can_transition_to(to) {
            return Err(CoreError::InvalidStateTransition {
                entity: "Sale",
                id: self.numero.clone(),
                from: self.state.to_string(),
                to: to.to_string(),
            });
        }
        self.state = to;
        Ok(())
    }

    /// Marks the sale enviado with its mandatory tracking number.
    pub fn ship(&mut self, tracking: String) -> CoreResult<()> {
        self.transition(SaleState::Enviado)?;
        self.shipping.tracking = Some(tracking);
        Ok(())
    }

    /// Marks the sale entregado and stamps the delivery time, which starts
    /// the return window.
    pub fn deliver(&mut self, at: DateTime<Utc>) -> CoreResult<()> {
        self.transition(SaleState::Entregado)?;
        self.delivered_at = Some(at);
        Ok(())
    }

    /// Cancels the sale with its mandatory reason. The caller refunds the
    /// card; committed stock stays decremented.
    pub fn cancel(&mut self, reason: String, cancelled_by: String) -> CoreResult<()> {
        self.transition(SaleState::Cancelada)?;
        self.cancelled = Some(Cancellation {
            reason,
            cancelled_by,
            at: Utc::now(),
        });
        Ok(())
    }

    /// Records a refund against this sale's payment, moving the payment
    /// state to partially or totally refunded.
    pub fn record_refund(&mut self, amount: Money) {
        self.payment.refunded_cents += amount.cents();
        self.payment.state = if self.payment.refunded_cents >= self.totals.final_cents {
            PaymentState::ReembolsadoTotal
        } else {
            PaymentState::ReembolsadoParcial
        };
    }

    /// Finds a snapshot item by book id.
    pub fn item(&self, book_id: &str) -> Option<&SaleItem> {
        self.items.iter().find(|i| i.book_id == book_id)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
