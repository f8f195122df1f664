//! # Returns (Devoluciones)
//!
//! The return aggregate, per-item inspection, and the refund state machine.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Return Lifecycle                                  │
//! │                                                                         │
//! │  solicitada ──► aprobada ──► esperando_envio ──► en_transito            │
//! │      │    │        │                                  │                 │
//! │      │    │        ▼                                  ▼                 │
//! │      │    │    cancelada (terminal)               recibida              │
//! │      │    │    only from solicitada/aprobada          │                 │
//! │      ▼    │                                           ▼                 │
//! │  rechazada (terminal)                           en_inspeccion           │
//! │                                                       │                 │
//! │                all items inspected ───────────────────┤                 │
//! │                       │                               │                 │
//! │      nothing approved ▼               something approved                │
//! │                   cerrada ◄── reembolso_completado ◄── reembolso_       │
//! │                  (terminal)           ▲                aprobado         │
//! │                                       │                   │             │
//! │                               reembolso_procesando ◄──────┘             │
//! │                                                                         │
//! │  Per item: aprobado | rechazado | aprobado_parcial (explicit 0-100%)    │
//! │  Refund per item = unit_price × qty × pct/100, capped at the item's     │
//! │  original line total from the SALE SNAPSHOT (never current catalog).    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::sale::{Cancellation, SaleItem};

// =============================================================================
// Return State
// =============================================================================

/// State of a return. Serialized with the Spanish wire names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnState {
    Solicitada,
    Aprobada,
    Rechazada,
    EsperandoEnvio,
    EnTransito,
    Recibida,
    EnInspeccion,
    ReembolsoAprobado,
    ReembolsoProcesando,
    ReembolsoCompletado,
    Cerrada,
    Cancelada,
}

impl ReturnState {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ReturnState::Solicitada => "solicitada",
            ReturnState::Aprobada => "aprobada",
            ReturnState::Rechazada => "rechazada",
            ReturnState::EsperandoEnvio => "esperando_envio",
            ReturnState::EnTransito => "en_transito",
            ReturnState::Recibida => "recibida",
            ReturnState::EnInspeccion => "en_inspeccion",
            ReturnState::ReembolsoAprobado => "reembolso_aprobado",
            ReturnState::ReembolsoProcesando => "reembolso_procesando",
            ReturnState::ReembolsoCompletado => "reembolso_completado",
            ReturnState::Cerrada => "cerrada",
            ReturnState::Cancelada => "cancelada",
        }
    }

    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            ReturnState::Rechazada | ReturnState::Cerrada | ReturnState::Cancelada
        )
    }

    /// Cancellation is only allowed before the customer ships the items
    /// back: from `solicitada` or `aprobada`.
    pub const fn is_cancellable(&self) -> bool {
        matches!(self, ReturnState::Solicitada | ReturnState::Aprobada)
    }

    /// The transition table.
    pub fn can_transition_to(&self, to: ReturnState) -> bool {
        use ReturnState::*;
        match (self, to) {
            (_, Cancelada) => self.is_cancellable(),
            (Solicitada, Aprobada) | (Solicitada, Rechazada) => true,
            (Aprobada, EsperandoEnvio) => true,
            (EsperandoEnvio, EnTransito) => true,
            (EnTransito, Recibida) => true,
            (Recibida, EnInspeccion) => true,
            (EnInspeccion, ReembolsoAprobado) => true,
            // nothing approved: close without a refund
            (EnInspeccion, Cerrada) => true,
            (ReembolsoAprobado, ReembolsoProcesando) => true,
            (ReembolsoProcesando, ReembolsoCompletado) => true,
            (ReembolsoCompletado, Cerrada) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for ReturnState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Inspection
// =============================================================================

/// Outcome of inspecting one returned item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InspectionResult {
    Aprobado,
    Rechazado,
    /// Requires an explicit 0-100 refund percentage.
    AprobadoParcial,
}

/// Recorded inspection of one return item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemInspection {
    pub result: InspectionResult,
    /// 0-100. Fixed at 100 for aprobado and 0 for rechazado.
    pub refund_percentage: u8,
    pub refund_amount_cents: i64,
}

// =============================================================================
// Return Item
// =============================================================================

/// One item of a return request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnItem {
    pub book_id: String,
    /// Title from the sale snapshot, for display.
    pub title: String,
    pub requested_qty: i64,
    pub reason: String,
    pub inspection: Option<ItemInspection>,
}

impl ReturnItem {
    /// Quantity physically going back to stock: the requested quantity
    /// when the item was approved (fully or partially), zero otherwise.
    pub fn restockable_qty(&self) -> i64 {
        match self.inspection {
            Some(ItemInspection {
                result: InspectionResult::Rechazado,
                ..
            })
            | None => 0,
            Some(_) => self.requested_qty,
        }
    }
}

// =============================================================================
// Return Totals
// =============================================================================

/// Aggregate refund bookkeeping for a return.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnTotals {
    /// Worth of everything the customer asked to return, at snapshot prices.
    pub requested_refund_cents: i64,
    /// Sum of inspected refund amounts.
    pub approved_refund_cents: i64,
    /// Actually credited back to the card.
    pub refunded_cents: i64,
}

// =============================================================================
// Return
// =============================================================================

/// A return request against one sale, identified by its immutable numero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Return {
    /// Business key, e.g. `DEV-20260830-0001`.
    pub codigo: String,
    pub sale_numero: String,
    pub customer_id: String,
    pub state: ReturnState,
    pub items: Vec<ReturnItem>,
    pub totals: ReturnTotals,
    pub created_at: DateTime<Utc>,
    pub cancelled: Option<Cancellation>,
}

impl Return {
    /// Guarded state transition. Fails with `InvalidStateTransition`
    /// instead of silently no-op-ing.
    pub fn transition(&mut self, to: ReturnState) -> CoreResult<()> {
        if !self.state.can_transition_to(to) {
            return Err(CoreError::InvalidStateTransition {
                entity: "Return",
                id: self.codigo.clone(),
                from: self.state.to_string(),
                to: to.to_string(),
            });
        }
        self.state = to;
        Ok(())
    }

    /// Cancels the return (customer or admin, with a mandatory reason).
    pub fn cancel(&mut self, reason: String, cancelled_by: String) -> CoreResult<()> {
        self.transition(ReturnState::Cancelada)?;
        self.cancelled = Some(Cancellation {
            reason,
            cancelled_by,
            at: Utc::now(),
        });
        Ok(())
    }

    /// Records the inspection of one item.
    ///
    /// The refund amount is computed against the SALE SNAPSHOT line:
    /// `unit_price × requested_qty × pct/100`, capped at the line's
    /// original total, so a refund can never exceed what was paid even if
    /// the catalog price has changed since.
    pub fn inspect_item(
        &mut self,
        book_id: &str,
        result: InspectionResult,
        refund_percentage: u8,
        sale_item: &SaleItem,
    ) -> CoreResult<ItemInspection> {
        let item = self
            .items
            .iter_mut()
            .find(|i| i.book_id == book_id)
            .ok_or_else(|| CoreError::not_found("ReturnItem", book_id))?;

        let pct = match result {
            InspectionResult::Aprobado => 100,
            InspectionResult::Rechazado => 0,
            InspectionResult::AprobadoParcial => refund_percentage.min(100),
        };

        let raw = sale_item
            .unit_price()
            .multiply_quantity(item.requested_qty)
            .apply_refund_percentage(pct);
        let refund = raw.min(sale_item.line_total());

        let inspection = ItemInspection {
            result,
            refund_percentage: pct,
            refund_amount_cents: refund.cents(),
        };
        item.inspection = Some(inspection);
        self.totals.approved_refund_cents =
            self.items
                .iter()
                .filter_map(|i| i.inspection)
                .map(|ins| ins.refund_amount_cents)
                .sum();

        Ok(inspection)
    }

    /// True once every item carries an inspection result.
    pub fn all_items_inspected(&self) -> bool {
        self.items.iter().all(|i| i.inspection.is_some())
    }

    /// The state the return aggregates to once inspection finishes:
    /// `reembolso_aprobado` when anything was approved, `cerrada` when
    /// every item was rejected.
    pub fn aggregate_state(&self) -> ReturnState {
        if self.totals.approved_refund_cents > 0 {
            ReturnState::ReembolsoAprobado
        } else {
            ReturnState::Cerrada
        }
    }
}

/// Checks the 8-day return window against the sale's delivery time.
pub fn validate_return_window(
    sale_numero: &str,
    delivered_at: DateTime<Utc>,
    now: DateTime<Utc>,
    limit_days: i64,
) -> CoreResult<()> {
    let days = (now - delivered_at).num_days();
    if days > limit_days {
        return Err(CoreError::ReturnWindowExpired {
            sale_numero: sale_numero.to_string(),
            days_since_delivery: days,
            limit_days,
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
