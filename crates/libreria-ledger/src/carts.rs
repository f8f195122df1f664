//! # Cart Store
//!
//! One cart per customer, mutated under a single lock so totals are always
//! consistent with the lines. Every mutation ends with a
//! [`Cart::recompute`] using the store's discount policy and tax rate.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use libreria_core::cart::Cart;
use libreria_core::discount::{DiscountCode, DiscountPolicy};
use libreria_core::error::CoreResult;
use libreria_core::pricing::{confirm_drift, detect_drift, DriftReport};
use libreria_core::types::{Book, TaxRate};

/// Customer carts keyed by customer id. Clones share state.
#[derive(Debug, Clone)]
pub struct CartStore {
    carts: Arc<RwLock<HashMap<String, Cart>>>,
    policy: DiscountPolicy,
    tax_rate: TaxRate,
}

impl CartStore {
    pub fn new(policy: DiscountPolicy, tax_rate: TaxRate) -> Self {
        CartStore {
            carts: Arc::new(RwLock::new(HashMap::new())),
            policy,
            tax_rate,
        }
    }

    /// The customer's cart, created empty on first touch.
    pub async fn get_or_create(&self, customer_id: &str) -> Cart {
        let mut carts = self.carts.write().await;
        carts
            .entry(customer_id.to_string())
            .or_insert_with(|| Cart::new(customer_id))
            .clone()
    }

    /// Adds a book (or merges quantity) and recomputes totals.
    pub async fn add_line(&self, customer_id: &str, book: &Book, quantity: i64) -> CoreResult<Cart> {
        self.mutate(customer_id, |cart| {
            cart.add_line(book, quantity)?;
            Ok(())
        })
        .await
    }

    /// Sets a line quantity; 0 removes the line.
    pub async fn update_quantity(
        &self,
        customer_id: &str,
        book_id: &str,
        quantity: i64,
    ) -> CoreResult<Cart> {
        self.mutate(customer_id, |cart| {
            cart.update_quantity(book_id, quantity)?;
            Ok(())
        })
        .await
    }

    pub async fn remove_line(&self, customer_id: &str, book_id: &str) -> CoreResult<Cart> {
        self.mutate(customer_id, |cart| {
            cart.remove_line(book_id)?;
            Ok(())
        })
        .await
    }

    /// Applies a discount code, replacing any existing one.
    pub async fn apply_code(&self, customer_id: &str, code: DiscountCode) -> CoreResult<Cart> {
        self.mutate(customer_id, |cart| {
            cart.apply_discount_code(code);
            Ok(())
        })
        .await
    }

    /// Empties the cart. Called after a sale is created from it.
    pub async fn clear(&self, customer_id: &str) -> CoreResult<Cart> {
        self.mutate(customer_id, |cart| {
            cart.clear();
            Ok(())
        })
        .await
    }

    /// Flags lines whose frozen price diverged from the catalog.
    /// `current_prices` is a snapshot of live prices by book id.
    pub async fn detect_drift(
        &self,
        customer_id: &str,
        current_prices: &HashMap<String, i64>,
    ) -> CoreResult<DriftReport> {
        let mut report = DriftReport::default();
        self.mutate(customer_id, |cart| {
            report = detect_drift(cart, |id| current_prices.get(id).copied());
            Ok(())
        })
        .await?;
        Ok(report)
    }

    /// Re-stamps drifted lines with the live price. `book_id = None`
    /// confirms everything.
    pub async fn confirm_drift(
        &self,
        customer_id: &str,
        book_id: Option<&str>,
        current_prices: &HashMap<String, i64>,
    ) -> CoreResult<Cart> {
        self.mutate(customer_id, |cart| {
            confirm_drift(cart, book_id, |id| current_prices.get(id).copied());
            Ok(())
        })
        .await
    }

    /// Runs a mutation under the write lock and recomputes totals before
    /// releasing it. Returns the resulting cart snapshot.
    async fn mutate<F>(&self, customer_id: &str, apply: F) -> CoreResult<Cart>
    where
        F: FnOnce(&mut Cart) -> CoreResult<()>,
    {
        let mut carts = self.carts.write().await;
        let cart = carts
            .entry(customer_id.to_string())
            .or_insert_with(|| Cart::new(customer_id));

        apply(cart)?;
        cart.recompute(&self.policy, self.tax_rate);
        debug!(customer_id = %customer_id, lines = cart.lines.len(),
               final_cents = cart.totals.final_cents, "Cart updated");
        Ok(cart.clone())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
