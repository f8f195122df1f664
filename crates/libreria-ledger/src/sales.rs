//! # Sale Store
//!
//! Durable sales keyed by their business numero (`VEN-YYYYMMDD-NNNN`).
//! Sales are never deleted; state changes happen through [`SaleStore::update`]
//! so the guarded transition and the stored copy can never diverge.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;

use libreria_core::error::{CoreError, CoreResult};
use libreria_core::sale::Sale;

/// Sale registry shared across tasks. Clones share state.
#[derive(Debug, Clone)]
pub struct SaleStore {
    sales: Arc<RwLock<HashMap<String, Sale>>>,
    sequence: Arc<AtomicU64>,
}

impl SaleStore {
    pub fn new() -> Self {
        SaleStore {
            sales: Arc::new(RwLock::new(HashMap::new())),
            sequence: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Issues the next sale numero: `VEN-YYYYMMDD-NNNN`.
    ///
    /// The sequence is global, not per-day; uniqueness is what matters, the
    /// date prefix is for humans.
    pub fn next_numero(&self) -> String {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        format!("VEN-{}-{:04}", Utc::now().format("%Y%m%d"), seq)
    }

    pub async fn insert(&self, sale: Sale) {
        debug!(numero = %sale.numero, state = %sale.state, "Sale stored");
        let mut sales = self.sales.write().await;
        sales.insert(sale.numero.clone(), sale);
    }

    pub async fn get(&self, numero: &str) -> CoreResult<Sale> {
        let sales = self.sales.read().await;
        sales
            .get(numero)
            .cloned()
            .ok_or_else(|| CoreError::not_found("Sale", numero))
    }

    /// Mutates a sale in place under the write lock. The closure's error
    /// aborts the update with the sale untouched.
    pub async fn update<F, R>(&self, numero: &str, apply: F) -> CoreResult<R>
    where
        F: FnOnce(&mut Sale) -> CoreResult<R>,
    {
        let mut sales = self.sales.write().await;
        let sale = sales
            .get_mut(numero)
            .ok_or_else(|| CoreError::not_found("Sale", numero))?;
        apply(sale)
    }

    /// Sales belonging to a customer, newest first.
    pub async fn list_for_customer(&self, customer_id: &str) -> Vec<Sale> {
        let sales = self.sales.read().await;
        let mut owned: Vec<Sale> = sales
            .values()
            .filter(|s| s.customer_id == customer_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        owned
    }

    /// Every sale, newest first. Admin listing.
    pub async fn list_all(&self) -> Vec<Sale> {
        let sales = self.sales.read().await;
        let mut all: Vec<Sale> = sales.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        all
    }
}

impl Default for SaleStore {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use libreria_core::sale::{
        PaymentInfo, PaymentMethod, PaymentState, SaleState, SaleTotals, ShippingInfo, TaxInfo,
    };
    use libreria_core::types::ShippingType;

    fn sale(numero: &str, customer_id: &str) -> Sale {
        Sale {
            numero: numero.to_string(),
            customer_id: customer_id.to_string(),
            state: SaleState::Pagada,
            items: Vec::new(),
            payment: PaymentInfo {
                method: PaymentMethod::Tarjeta,
                card_id: "card-1".to_string(),
                state: PaymentState::Pagado,
                refunded_cents: 0,
            },
            shipping: ShippingInfo {
                shipping_type: ShippingType::RecogidaTienda {
                    id_tienda: "t1".to_string(),
                },
                tracking: None,
            },
            totals: SaleTotals {
                subtotal_cents: 1000,
                discount_cents: 0,
                tax_cents: 190,
                shipping_cents: 0,
                final_cents: 1190,
            },
            tax_info: TaxInfo {
                paid_by_customer: false,
            },
            created_at: Utc::now(),
            delivered_at: None,
            cancelled: None,
        }
    }

    #[test]
    fn test_numero_format_and_sequence() {
        let store = SaleStore::new();
        let n1 = store.next_numero();
        let n2 = store.next_numero();

        assert!(n1.starts_with("VEN-"));
        assert!(n1.ends_with("-0001"));
        assert!(n2.ends_with("-0002"));
    }

    #[tokio::test]
    async fn test_insert_get_update() {
        let store = SaleStore::new();
        store.insert(sale("VEN-1", "u1")).await;

        store
            .update("VEN-1", |s| s.transition(SaleState::ListoParaEnvio))
            .await
            .unwrap();
        assert_eq!(store.get("VEN-1").await.unwrap().state, SaleState::ListoParaEnvio);
    }

    #[tokio::test]
    async fn test_failed_update_leaves_sale_untouched() {
        let store = SaleStore::new();
        store.insert(sale("VEN-1", "u1")).await;

        // pagada cannot jump to enviado
        let err = store
            .update("VEN-1", |s| s.transition(SaleState::Enviado))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidStateTransition { .. }));
        assert_eq!(store.get("VEN-1").await.unwrap().state, SaleState::Pagada);
    }

    #[tokio::test]
    async fn test_list_for_customer() {
        let store = SaleStore::new();
        store.insert(sale("VEN-1", "u1")).await;
        store.insert(sale("VEN-2", "u2")).await;
        store.insert(sale("VEN-3", "u1")).await;

        let mine = store.list_for_customer("u1").await;
        assert_eq!(mine.len(), 2);
        assert!(mine.iter().all(|s| s.customer_id == "u1"));
    }
}
