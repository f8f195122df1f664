//! # Fulfillment Orchestrator
//!
//! The service facade: cart operations, the sale creation saga, and the
//! shipment transitions. The return workflow lives in [`crate::returns`]
//! as a second impl block on the same service.
//!
//! ## Sale Creation Saga
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      create_sale Pipeline                               │
//! │                                                                         │
//! │  1. Load cart           empty cart ──► VALIDATION_FAILED                │
//! │  2. Drift check         unconfirmed drift ──► PRICE_DRIFT_UNCONFIRMED   │
//! │  3. Quote               discounts, tax, shipping                        │
//! │  4. Reserve stock       per line; failure ──► unwind earlier reserves   │
//! │  5. Charge card         failure ──► unwind all reserves                 │
//! │  6. Commit reserves     permanent stock decrement                       │
//! │  7. Persist sale        snapshot items, state pagada                    │
//! │  8. Clear cart                                                          │
//! │                                                                         │
//! │  Every step after a successful reserve/debit registers its inverse in   │
//! │  a CompensationLog; a failure unwinds the log in reverse order, so a    │
//! │  failed checkout leaves stock and balances exactly as they were.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use libreria_core::cart::Cart;
use libreria_core::error::{CoreError, CoreResult};
use libreria_core::pricing::{self, DriftReport, Quote};
use libreria_core::sale::{
    PaymentInfo, PaymentMethod, PaymentState, Sale, SaleItem, SaleState, ShippingInfo, TaxInfo,
};
use libreria_core::types::{Book, Principal, ShippingType, StockRecord};
use libreria_core::validation::{validate_address, validate_tracking};
use libreria_ledger::{
    CartStore, CatalogStore, DiscountStore, IdempotencyStore, PaymentLedger, ReturnStore,
    SaleStore, StockLedger,
};

use crate::activity::{Activity, ActivityLog, TracingActivityLog};
use crate::config::FulfillmentConfig;
use crate::error::ServiceResult;
use crate::saga::{Compensation, CompensationLog};

// =============================================================================
// Service
// =============================================================================

/// The fulfillment service. Cheap to clone; clones share every store.
#[derive(Clone)]
pub struct Fulfillment {
    pub(crate) config: FulfillmentConfig,
    pub(crate) catalog: CatalogStore,
    pub(crate) carts: CartStore,
    pub(crate) discounts: DiscountStore,
    pub(crate) stock: StockLedger,
    pub(crate) payments: PaymentLedger,
    pub(crate) sales: SaleStore,
    pub(crate) returns: ReturnStore,
    pub(crate) activity: Arc<dyn ActivityLog>,
}

impl Fulfillment {
    pub fn new(config: FulfillmentConfig) -> Self {
        Self::with_activity_log(config, Arc::new(TracingActivityLog))
    }

    pub fn with_activity_log(config: FulfillmentConfig, activity: Arc<dyn ActivityLog>) -> Self {
        let idempotency = IdempotencyStore::new();
        Fulfillment {
            catalog: CatalogStore::new(),
            carts: CartStore::new(config.discount_policy.clone(), config.tax_rate()),
            discounts: DiscountStore::new(),
            stock: StockLedger::with_retry_budget(idempotency.clone(), config.cas_retry_budget),
            payments: PaymentLedger::new(idempotency),
            sales: SaleStore::new(),
            returns: ReturnStore::new(),
            activity,
            config,
        }
    }

    // =========================================================================
    // Seeding (admin/bootstrap)
    // =========================================================================

    /// Adds a book with initial stock.
    pub async fn seed_book(&self, book: Book, available_qty: i64) {
        self.stock
            .insert_record(StockRecord::new(&book.id, available_qty))
            .await;
        self.catalog.insert_book(book).await;
    }

    pub fn catalog(&self) -> &CatalogStore {
        &self.catalog
    }

    pub fn stock(&self) -> &StockLedger {
        &self.stock
    }

    pub fn payments(&self) -> &PaymentLedger {
        &self.payments
    }

    pub fn discounts(&self) -> &DiscountStore {
        &self.discounts
    }

    pub fn sales(&self) -> &SaleStore {
        &self.sales
    }

    pub fn returns(&self) -> &ReturnStore {
        &self.returns
    }

    // =========================================================================
    // Cart Operations
    // =========================================================================

    /// Adds a book to the caller's cart, freezing the current price.
    pub async fn add_to_cart(
        &self,
        principal: &Principal,
        book_id: &str,
        quantity: i64,
    ) -> ServiceResult<Cart> {
        let book = self.catalog.get_book(book_id).await?;
        let cart = self.carts.add_line(&principal.id, &book, quantity).await?;
        Ok(cart)
    }

    /// Sets a line quantity; 0 removes the line.
    pub async fn update_cart_quantity(
        &self,
        principal: &Principal,
        book_id: &str,
        quantity: i64,
    ) -> ServiceResult<Cart> {
        Ok(self
            .carts
            .update_quantity(&principal.id, book_id, quantity)
            .await?)
    }

    pub async fn remove_from_cart(
        &self,
        principal: &Principal,
        book_id: &str,
    ) -> ServiceResult<Cart> {
        Ok(self.carts.remove_line(&principal.id, book_id).await?)
    }

    /// Applies a discount code by its code string.
    pub async fn apply_discount_code(
        &self,
        principal: &Principal,
        code: &str,
    ) -> ServiceResult<Cart> {
        let code = self.discounts.get_active(code).await?;
        Ok(self.carts.apply_code(&principal.id, code).await?)
    }

    pub async fn get_cart(&self, principal: &Principal) -> Cart {
        self.carts.get_or_create(&principal.id).await
    }

    /// Flags cart lines whose frozen price no longer matches the catalog
    /// and reports them. The customer must confirm before checkout.
    pub async fn check_price_drift(&self, principal: &Principal) -> ServiceResult<DriftReport> {
        let cart = self.carts.get_or_create(&principal.id).await;
        let book_ids: Vec<String> = cart.lines.iter().map(|l| l.book_id.clone()).collect();
        let prices = self.catalog.prices_for(&book_ids).await;
        Ok(self.carts.detect_drift(&principal.id, &prices).await?)
    }

    /// Accepts the current catalog price for drifted line(s).
    /// `book_id = None` confirms everything.
    pub async fn confirm_price_drift(
        &self,
        principal: &Principal,
        book_id: Option<&str>,
    ) -> ServiceResult<Cart> {
        let cart = self.carts.get_or_create(&principal.id).await;
        let book_ids: Vec<String> = cart.lines.iter().map(|l| l.book_id.clone()).collect();
        let prices = self.catalog.prices_for(&book_ids).await;
        Ok(self
            .carts
            .confirm_drift(&principal.id, book_id, &prices)
            .await?)
    }

    /// Prices the cart as it stands, without creating anything.
    pub async fn quote(
        &self,
        principal: &Principal,
        shipping: &ShippingType,
        customer_pays_tax: bool,
    ) -> ServiceResult<Quote> {
        let cart = self.carts.get_or_create(&principal.id).await;
        Ok(pricing::quote(
            &cart,
            &self.config.discount_policy,
            self.config.tax_rate(),
            shipping,
            self.config.home_delivery_fee(),
            customer_pays_tax,
        )?)
    }

    // =========================================================================
    // Sale Creation (the saga)
    // =========================================================================

    /// Turns the caller's cart into a paid sale, all-or-nothing.
    pub async fn create_sale(
        &self,
        principal: &Principal,
        card_id: &str,
        shipping: ShippingType,
        customer_pays_tax: bool,
    ) -> ServiceResult<Sale> {
        let sale = self
            .run_sale_saga(principal, card_id, shipping, customer_pays_tax)
            .await?;
        Ok(sale)
    }

    async fn run_sale_saga(
        &self,
        principal: &Principal,
        card_id: &str,
        shipping: ShippingType,
        customer_pays_tax: bool,
    ) -> CoreResult<Sale> {
        // ---- Step 1: load and validate the cart --------------------------
        let cart = self.carts.get_or_create(&principal.id).await;
        if cart.is_empty() {
            return Err(libreria_core::error::ValidationError::EmptyCart.into());
        }

        if let ShippingType::Domicilio { direccion } = &shipping {
            validate_address(direccion)?;
        }

        // ---- Step 2: drift gate ------------------------------------------
        let book_ids: Vec<String> = cart.lines.iter().map(|l| l.book_id.clone()).collect();
        let prices = self.catalog.prices_for(&book_ids).await;
        let report = self.carts.detect_drift(&principal.id, &prices).await?;
        if !report.is_empty() {
            let drifted = report.changed.iter().map(|d| d.book_id.clone()).collect();
            return Err(CoreError::PriceDriftUnconfirmed { book_ids: drifted });
        }
        // Re-read: detect_drift may have flagged lines in the stored cart.
        let cart = self.carts.get_or_create(&principal.id).await;
        let drifted = cart.drifted_book_ids();
        if !drifted.is_empty() {
            return Err(CoreError::PriceDriftUnconfirmed { book_ids: drifted });
        }

        // ---- Step 3: card ownership and quote ----------------------------
        let card = self.payments.get_card(card_id).await?;
        if card.owner_id != principal.id {
            return Err(CoreError::Forbidden {
                action: "pay with this card",
                required: "card owner",
            });
        }

        let quote = pricing::quote(
            &cart,
            &self.config.discount_policy,
            self.config.tax_rate(),
            &shipping,
            self.config.home_delivery_fee(),
            customer_pays_tax,
        )?;

        // ---- Steps 4-6: reserve, charge, commit --------------------------
        let transaction_id = Uuid::new_v4().to_string();
        let mut log = CompensationLog::new();

        for line in &cart.lines {
            let reservation_id = format!("{}:{}", transaction_id, line.book_id);
            if let Err(e) = self
                .stock
                .reserve(&line.book_id, line.quantity, &principal.id, &reservation_id)
                .await
            {
                warn!(book_id = %line.book_id, error = %e, "Sale saga aborted at reserve");
                log.unwind(&self.stock, &self.payments).await;
                return Err(e);
            }
            log.push(Compensation::ReleaseReservation {
                book_id: line.book_id.clone(),
                qty: line.quantity,
                holder_id: principal.id.clone(),
                reservation_id,
            });
        }

        if quote.total_cents > 0 {
            if let Err(e) = self
                .payments
                .debit(card_id, quote.total_cents, &transaction_id)
                .await
            {
                warn!(card_id = %card_id, error = %e, "Sale saga aborted at debit");
                log.unwind(&self.stock, &self.payments).await;
                return Err(e);
            }
            log.push(Compensation::RefundDebit {
                card_id: card_id.to_string(),
                amount_cents: quote.total_cents,
                reason: format!("rollback {}", transaction_id),
            });
        }

        for line in &cart.lines {
            let reservation_id = format!("{}:{}", transaction_id, line.book_id);
            let commit_id = format!("{}:commit", reservation_id);
            if let Err(e) = self
                .stock
                .commit(
                    &line.book_id,
                    line.quantity,
                    &principal.id,
                    &reservation_id,
                    &commit_id,
                )
                .await
            {
                warn!(book_id = %line.book_id, error = %e, "Sale saga aborted at commit");
                log.unwind(&self.stock, &self.payments).await;
                return Err(e);
            }
        }

        // ---- Step 7: persist the sale snapshot ---------------------------
        let numero = self.sales.next_numero();
        let items: Vec<SaleItem> = cart
            .lines
            .iter()
            .map(|l| SaleItem {
                book_id: l.book_id.clone(),
                title: l.title.clone(),
                author: l.author.clone(),
                unit_price_cents: l.unit_price_cents,
                quantity: l.quantity,
                line_total_cents: l.line_total().cents(),
            })
            .collect();

        let mut sale = Sale {
            numero: numero.clone(),
            customer_id: principal.id.clone(),
            state: SaleState::Creada,
            items,
            payment: PaymentInfo {
                method: PaymentMethod::Tarjeta,
                card_id: card_id.to_string(),
                state: PaymentState::Pagado,
                refunded_cents: 0,
            },
            shipping: ShippingInfo {
                shipping_type: shipping,
                tracking: None,
            },
            totals: quote.into(),
            tax_info: TaxInfo {
                paid_by_customer: customer_pays_tax,
            },
            created_at: Utc::now(),
            delivered_at: None,
            cancelled: None,
        };
        sale.transition(SaleState::PendientePago)?;
        sale.transition(SaleState::Pagada)?;

        self.sales.insert(sale.clone()).await;

        // ---- Step 8: the cart is spent -----------------------------------
        self.carts.clear(&principal.id).await?;

        log.commit();
        self.activity.record(Activity::new(
            "sale.created",
            &numero,
            &principal.id,
            format!("total {} cents, tx {}", sale.totals.final_cents, transaction_id),
        ));
        info!(numero = %numero, customer_id = %principal.id,
              total_cents = sale.totals.final_cents, "Sale created");
        Ok(sale)
    }

    // =========================================================================
    // Shipment Transitions
    // =========================================================================

    /// Marks a paid sale ready for shipment. Admin only.
    pub async fn mark_ready(&self, principal: &Principal, numero: &str) -> ServiceResult<Sale> {
        self.ensure_admin(principal, "mark a sale ready")?;
        self.sales
            .update(numero, |sale| sale.transition(SaleState::ListoParaEnvio))
            .await?;
        self.record_transition(principal, numero, "sale.ready", "listo_para_envio");
        Ok(self.sales.get(numero).await?)
    }

    /// Marks a sale shipped with its mandatory tracking number. Admin only.
    pub async fn ship_sale(
        &self,
        principal: &Principal,
        numero: &str,
        tracking: &str,
    ) -> ServiceResult<Sale> {
        self.ensure_admin(principal, "ship a sale")?;
        let tracking = validate_tracking(tracking)?;
        self.sales
            .update(numero, |sale| sale.ship(tracking.clone()))
            .await?;
        self.record_transition(principal, numero, "sale.shipped", &format!("tracking {tracking}"));
        Ok(self.sales.get(numero).await?)
    }

    /// Marks a sale delivered, starting the return window. Admin only.
    pub async fn deliver_sale(&self, principal: &Principal, numero: &str) -> ServiceResult<Sale> {
        self.ensure_admin(principal, "mark a sale delivered")?;
        self.sales
            .update(numero, |sale| sale.deliver(Utc::now()))
            .await?;
        self.record_transition(principal, numero, "sale.delivered", "entregado");
        Ok(self.sales.get(numero).await?)
    }

    /// Cancels a sale before delivery: refunds whatever the card paid and
    /// has not already been refunded. Committed stock stays decremented.
    ///
    /// Owner or admin.
    pub async fn cancel_sale(
        &self,
        principal: &Principal,
        numero: &str,
        reason: &str,
    ) -> ServiceResult<Sale> {
        let reason = libreria_core::validation::validate_reason(reason)?;
        let sale = self.sales.get(numero).await?;
        self.ensure_owner_or_admin(principal, &sale.customer_id, "cancel this sale")?;

        let refund_cents = self
            .sales
            .update(numero, |sale| {
                sale.cancel(reason.clone(), principal.id.clone())?;
                Ok(sale.totals.final_cents - sale.payment.refunded_cents)
            })
            .await?;

        if refund_cents > 0 {
            self.payments
                .credit(
                    &sale.payment.card_id,
                    refund_cents,
                    &format!("cancelacion {}", numero),
                )
                .await?;
            self.sales
                .update(numero, |sale| {
                    sale.record_refund(libreria_core::Money::from_cents(refund_cents));
                    Ok(())
                })
                .await?;
        }

        self.record_transition(
            principal,
            numero,
            "sale.cancelled",
            &format!("refunded {refund_cents} cents"),
        );
        Ok(self.sales.get(numero).await?)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Fetches one sale. Owner or admin.
    pub async fn get_sale(&self, principal: &Principal, numero: &str) -> ServiceResult<Sale> {
        let sale = self.sales.get(numero).await?;
        self.ensure_owner_or_admin(principal, &sale.customer_id, "view this sale")?;
        Ok(sale)
    }

    /// Sales visible to the caller: their own, or everything for admins.
    pub async fn list_sales(&self, principal: &Principal) -> Vec<Sale> {
        if principal.role.is_admin() {
            self.sales.list_all().await
        } else {
            self.sales.list_for_customer(&principal.id).await
        }
    }

    // =========================================================================
    // Authorization helpers
    // =========================================================================

    pub(crate) fn ensure_admin(
        &self,
        principal: &Principal,
        action: &'static str,
    ) -> CoreResult<()> {
        if !principal.role.is_admin() {
            return Err(CoreError::Forbidden {
                action,
                required: "administrador",
            });
        }
        Ok(())
    }

    pub(crate) fn ensure_owner_or_admin(
        &self,
        principal: &Principal,
        owner_id: &str,
        action: &'static str,
    ) -> CoreResult<()> {
        if principal.id != owner_id && !principal.role.is_admin() {
            return Err(CoreError::Forbidden {
                action,
                required: "owner or administrador",
            });
        }
        Ok(())
    }

    pub(crate) fn record_transition(
        &self,
        principal: &Principal,
        entity_id: &str,
        event: &str,
        detail: &str,
    ) {
        self.activity
            .record(Activity::new(event, entity_id, &principal.id, detail));
    }
}
