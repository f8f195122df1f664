//! # Return Workflow
//!
//! The return/refund side of the fulfillment service: request, approval,
//! shipment tracking, per-item inspection, refund processing, restocking.
//!
//! ## Rules
//! - Returns are only accepted against `entregado` sales, within the
//!   configured window after delivery (8 days by default).
//! - One open return per sale at a time.
//! - Refund amounts reconcile against the SALE SNAPSHOT, never the current
//!   catalog price.
//! - Approved quantities go back to available stock when the refund
//!   completes; rejected items never restock.

use tracing::info;

use libreria_core::devolucion::{
    validate_return_window, InspectionResult, Return, ReturnItem, ReturnState, ReturnTotals,
};
use libreria_core::error::{CoreError, CoreResult, ValidationError};
use libreria_core::sale::SaleState;
use libreria_core::types::Principal;
use libreria_core::validation::{validate_reason, validate_refund_percentage};
use libreria_core::Money;

use crate::activity::Activity;
use crate::error::ServiceResult;
use crate::orchestrator::Fulfillment;

/// One requested line of a return, as supplied by the customer.
#[derive(Debug, Clone)]
pub struct ReturnRequestItem {
    pub book_id: String,
    pub quantity: i64,
    pub reason: String,
}

impl Fulfillment {
    // =========================================================================
    // Request
    // =========================================================================

    /// Opens a return against a delivered sale.
    ///
    /// ## Rules
    /// - Only the customer who bought the sale may request one
    /// - Sale must be `entregado` and within the return window
    /// - Requested quantities must not exceed what was purchased
    /// - At most one open return per sale
    pub async fn create_return(
        &self,
        principal: &Principal,
        sale_numero: &str,
        items: Vec<ReturnRequestItem>,
    ) -> ServiceResult<Return> {
        let ret = self
            .build_return(principal, sale_numero, items)
            .await?;
        self.returns.insert(ret.clone()).await;
        self.activity.record(Activity::new(
            "return.requested",
            &ret.codigo,
            &principal.id,
            format!("against sale {}", sale_numero),
        ));
        info!(codigo = %ret.codigo, sale_numero = %sale_numero, "Return requested");
        Ok(ret)
    }

    async fn build_return(
        &self,
        principal: &Principal,
        sale_numero: &str,
        items: Vec<ReturnRequestItem>,
    ) -> CoreResult<Return> {
        let sale = self.sales.get(sale_numero).await?;
        // Only the purchasing customer opens a return; admins drive the
        // workflow afterwards.
        if principal.id != sale.customer_id || principal.role.is_admin() {
            return Err(CoreError::Forbidden {
                action: "return this sale",
                required: "purchasing cliente",
            });
        }

        if sale.state != SaleState::Entregado {
            return Err(CoreError::InvalidStateTransition {
                entity: "Sale",
                id: sale_numero.to_string(),
                from: sale.state.to_string(),
                to: "devolucion".to_string(),
            });
        }

        let delivered_at = sale
            .delivered_at
            .ok_or_else(|| CoreError::not_found("delivery timestamp for sale", sale_numero))?;
        validate_return_window(
            sale_numero,
            delivered_at,
            chrono::Utc::now(),
            self.config.return_window_days,
        )?;

        if !self.returns.open_for_sale(sale_numero).await.is_empty() {
            return Err(ValidationError::InvalidFormat {
                field: "venta".to_string(),
                reason: format!("sale {} already has an open return", sale_numero),
            }
            .into());
        }

        if items.is_empty() {
            return Err(ValidationError::Required {
                field: "items".to_string(),
            }
            .into());
        }

        let mut return_items = Vec::with_capacity(items.len());
        let mut requested_refund = Money::zero();
        for req in items {
            let sale_item = sale
                .item(&req.book_id)
                .ok_or_else(|| CoreError::not_found("SaleItem", &req.book_id))?;

            if req.quantity <= 0 || req.quantity > sale_item.quantity {
                return Err(ValidationError::OutOfRange {
                    field: "cantidad".to_string(),
                    min: 1,
                    max: sale_item.quantity,
                }
                .into());
            }
            let reason = validate_reason(&req.reason)?;

            requested_refund += sale_item.unit_price().multiply_quantity(req.quantity);
            return_items.push(ReturnItem {
                book_id: req.book_id,
                title: sale_item.title.clone(),
                requested_qty: req.quantity,
                reason,
                inspection: None,
            });
        }

        Ok(Return {
            codigo: self.returns.next_codigo(),
            sale_numero: sale_numero.to_string(),
            customer_id: sale.customer_id.clone(),
            state: ReturnState::Solicitada,
            items: return_items,
            totals: ReturnTotals {
                requested_refund_cents: requested_refund.cents(),
                approved_refund_cents: 0,
                refunded_cents: 0,
            },
            created_at: chrono::Utc::now(),
            cancelled: None,
        })
    }

    // =========================================================================
    // Approval
    // =========================================================================

    /// Approves a requested return. Admin only. The approval is durable:
    /// the return stays `aprobada` until someone moves it on.
    pub async fn approve_return(&self, principal: &Principal, codigo: &str) -> ServiceResult<Return> {
        self.ensure_admin(principal, "approve a return")?;
        self.returns
            .update(codigo, |r| r.transition(ReturnState::Aprobada))
            .await?;
        self.record_transition(principal, codigo, "return.approved", "aprobada");
        Ok(self.returns.get(codigo).await?)
    }

    /// Rejects a requested return outright. Admin only. Terminal.
    pub async fn reject_return(&self, principal: &Principal, codigo: &str) -> ServiceResult<Return> {
        self.ensure_admin(principal, "reject a return")?;
        self.returns
            .update(codigo, |r| r.transition(ReturnState::Rechazada))
            .await?;
        self.record_transition(principal, codigo, "return.rejected", "rechazada");
        Ok(self.returns.get(codigo).await?)
    }

    // =========================================================================
    // Shipment back to the store
    // =========================================================================

    /// Asks the customer to ship the items back. Admin only.
    pub async fn request_return_shipment(
        &self,
        principal: &Principal,
        codigo: &str,
    ) -> ServiceResult<Return> {
        self.ensure_admin(principal, "request return shipment")?;
        self.returns
            .update(codigo, |r| r.transition(ReturnState::EsperandoEnvio))
            .await?;
        self.record_transition(principal, codigo, "return.awaiting_shipment", "esperando_envio");
        Ok(self.returns.get(codigo).await?)
    }

    /// Customer (or admin) reports the package is on its way.
    pub async fn mark_return_in_transit(
        &self,
        principal: &Principal,
        codigo: &str,
    ) -> ServiceResult<Return> {
        let ret = self.returns.get(codigo).await?;
        self.ensure_owner_or_admin(principal, &ret.customer_id, "update this return")?;
        self.returns
            .update(codigo, |r| r.transition(ReturnState::EnTransito))
            .await?;
        self.record_transition(principal, codigo, "return.in_transit", "en_transito");
        Ok(self.returns.get(codigo).await?)
    }

    /// Store receipt of the returned package. Admin only.
    pub async fn receive_return(&self, principal: &Principal, codigo: &str) -> ServiceResult<Return> {
        self.ensure_admin(principal, "receive a return")?;
        self.returns
            .update(codigo, |r| r.transition(ReturnState::Recibida))
            .await?;
        self.record_transition(principal, codigo, "return.received", "recibida");
        Ok(self.returns.get(codigo).await?)
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Records the inspection of one returned item. Admin only.
    ///
    /// The first inspection moves the return from `recibida` to
    /// `en_inspeccion`. Once every item is inspected, the return aggregates
    /// to `reembolso_aprobado` (something approved) or `cerrada` (all
    /// rejected).
    pub async fn inspect_return_item(
        &self,
        principal: &Principal,
        codigo: &str,
        book_id: &str,
        result: InspectionResult,
        refund_percentage: i64,
    ) -> ServiceResult<Return> {
        self.ensure_admin(principal, "inspect a return")?;
        let pct = validate_refund_percentage(refund_percentage)?;

        let ret = self.returns.get(codigo).await?;
        let sale = self.sales.get(&ret.sale_numero).await?;
        let sale_item = sale
            .item(book_id)
            .ok_or_else(|| CoreError::not_found("SaleItem", book_id))?
            .clone();

        self.returns
            .update(codigo, |r| {
                // Everything that can fail is checked before the first
                // mutation, so a bad request leaves the return untouched.
                if !r.items.iter().any(|i| i.book_id == book_id) {
                    return Err(CoreError::not_found("ReturnItem", book_id));
                }
                if r.state == ReturnState::Recibida {
                    r.transition(ReturnState::EnInspeccion)?;
                }
                if r.state != ReturnState::EnInspeccion {
                    return Err(CoreError::InvalidStateTransition {
                        entity: "Return",
                        id: r.codigo.clone(),
                        from: r.state.to_string(),
                        to: ReturnState::EnInspeccion.to_string(),
                    });
                }

                r.inspect_item(book_id, result, pct, &sale_item)?;

                if r.all_items_inspected() {
                    let next = r.aggregate_state();
                    r.transition(next)?;
                }
                Ok(())
            })
            .await?;

        self.record_transition(
            principal,
            codigo,
            "return.inspected",
            &format!("{book_id}: {result:?} at {pct}%"),
        );
        Ok(self.returns.get(codigo).await?)
    }

    // =========================================================================
    // Refund
    // =========================================================================

    /// Executes the approved refund: credits the sale's card, records the
    /// refund on the sale, and restocks the approved quantities. Admin only.
    pub async fn process_refund(&self, principal: &Principal, codigo: &str) -> ServiceResult<Return> {
        self.ensure_admin(principal, "process a refund")?;

        let (sale_numero, refund_cents, restock) = self
            .returns
            .update(codigo, |r| {
                r.transition(ReturnState::ReembolsoProcesando)?;
                let restock: Vec<(String, i64)> = r
                    .items
                    .iter()
                    .filter(|i| i.restockable_qty() > 0)
                    .map(|i| (i.book_id.clone(), i.restockable_qty()))
                    .collect();
                Ok((
                    r.sale_numero.clone(),
                    r.totals.approved_refund_cents,
                    restock,
                ))
            })
            .await?;

        let sale = self.sales.get(&sale_numero).await?;
        self.payments
            .credit(
                &sale.payment.card_id,
                refund_cents,
                &format!("reembolso {}", codigo),
            )
            .await?;

        self.sales
            .update(&sale_numero, |s| {
                s.record_refund(Money::from_cents(refund_cents));
                Ok(())
            })
            .await?;

        // The inspected copies go back on the shelf.
        for (book_id, qty) in restock {
            self.stock.restock(&book_id, qty).await?;
        }

        self.returns
            .update(codigo, |r| {
                r.totals.refunded_cents = refund_cents;
                r.transition(ReturnState::ReembolsoCompletado)
            })
            .await?;

        self.record_transition(
            principal,
            codigo,
            "return.refunded",
            &format!("{refund_cents} cents to card {}", sale.payment.card_id),
        );
        info!(codigo = %codigo, refund_cents = %refund_cents, "Refund processed");
        Ok(self.returns.get(codigo).await?)
    }

    /// Closes a completed return. Admin only. Terminal.
    pub async fn close_return(&self, principal: &Principal, codigo: &str) -> ServiceResult<Return> {
        self.ensure_admin(principal, "close a return")?;
        self.returns
            .update(codigo, |r| r.transition(ReturnState::Cerrada))
            .await?;
        self.record_transition(principal, codigo, "return.closed", "cerrada");
        Ok(self.returns.get(codigo).await?)
    }

    // =========================================================================
    // Cancellation & Reads
    // =========================================================================

    /// Cancels a return before the items ship back. Owner or admin.
    pub async fn cancel_return(
        &self,
        principal: &Principal,
        codigo: &str,
        reason: &str,
    ) -> ServiceResult<Return> {
        let reason = validate_reason(reason)?;
        let ret = self.returns.get(codigo).await?;
        self.ensure_owner_or_admin(principal, &ret.customer_id, "cancel this return")?;

        self.returns
            .update(codigo, |r| r.cancel(reason.clone(), principal.id.clone()))
            .await?;
        self.record_transition(principal, codigo, "return.cancelled", &reason);
        Ok(self.returns.get(codigo).await?)
    }

    /// Fetches one return. Owner or admin.
    pub async fn get_return(&self, principal: &Principal, codigo: &str) -> ServiceResult<Return> {
        let ret = self.returns.get(codigo).await?;
        self.ensure_owner_or_admin(principal, &ret.customer_id, "view this return")?;
        Ok(ret)
    }

    /// Returns visible to the caller: admins see every return, customers
    /// only their own.
    pub async fn list_returns(&self, principal: &Principal) -> Vec<Return> {
        if principal.role.is_admin() {
            return self.returns.list_all().await;
        }
        self.returns.list_for_customer(&principal.id).await
    }
}
