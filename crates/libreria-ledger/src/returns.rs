//! # Return Store
//!
//! Return requests keyed by their business codigo (`DEV-YYYYMMDD-NNNN`).
//! Same shape as the sale store: insert, read, closure-guarded update.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;

use libreria_core::devolucion::Return;
use libreria_core::error::{CoreError, CoreResult};

/// Return registry shared across tasks. Clones share state.
#[derive(Debug, Clone)]
pub struct ReturnStore {
    returns: Arc<RwLock<HashMap<String, Return>>>,
    sequence: Arc<AtomicU64>,
}

impl ReturnStore {
    pub fn new() -> Self {
        ReturnStore {
            returns: Arc::new(RwLock::new(HashMap::new())),
            sequence: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Issues the next return codigo: `DEV-YYYYMMDD-NNNN`.
    pub fn next_codigo(&self) -> String {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        format!("DEV-{}-{:04}", Utc::now().format("%Y%m%d"), seq)
    }

    pub async fn insert(&self, ret: Return) {
        debug!(codigo = %ret.codigo, state = %ret.state, "Return stored");
        let mut returns = self.returns.write().await;
        returns.insert(ret.codigo.clone(), ret);
    }

    pub async fn get(&self, codigo: &str) -> CoreResult<Return> {
        let returns = self.returns.read().await;
        returns
            .get(codigo)
            .cloned()
            .ok_or_else(|| CoreError::not_found("Return", codigo))
    }

    /// Mutates a return in place under the write lock. The closure's error
    /// aborts the update with the return untouched.
    pub async fn update<F, R>(&self, codigo: &str, apply: F) -> CoreResult<R>
    where
        F: FnOnce(&mut Return) -> CoreResult<R>,
    {
        let mut returns = self.returns.write().await;
        let ret = returns
            .get_mut(codigo)
            .ok_or_else(|| CoreError::not_found("Return", codigo))?;
        apply(ret)
    }

    /// Returns belonging to a customer, newest first.
    pub async fn list_for_customer(&self, customer_id: &str) -> Vec<Return> {
        let returns = self.returns.read().await;
        let mut owned: Vec<Return> = returns
            .values()
            .filter(|r| r.customer_id == customer_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        owned
    }

    /// Every return, newest first. Admin listing.
    pub async fn list_all(&self) -> Vec<Return> {
        let returns = self.returns.read().await;
        let mut all: Vec<Return> = returns.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        all
    }

    /// Open (non-terminal) returns against one sale. Used to reject a
    /// second concurrent return for the same sale.
    pub async fn open_for_sale(&self, sale_numero: &str) -> Vec<Return> {
        let returns = self.returns.read().await;
        returns
            .values()
            .filter(|r| r.sale_numero == sale_numero && !r.state.is_terminal())
            .cloned()
            .collect()
    }
}

impl Default for ReturnStore {
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
    use libreria_core::devolucion::{ReturnItem, ReturnState, ReturnTotals};

    fn ret(codigo: &str, sale_numero: &str, customer_id: &str) -> Return {
        Return {
            codigo: codigo.to_string(),
            sale_numero: sale_numero.to_string(),
            customer_id: customer_id.to_string(),
            state: ReturnState::Solicitada,
            items: vec![ReturnItem {
                book_id: "b1".to_string(),
                title: "Pedro Páramo".to_string(),
                requested_qty: 1,
                reason: "dañado".to_string(),
                inspection: None,
            }],
            totals: ReturnTotals::default(),
            created_at: Utc::now(),
            cancelled: None,
        }
    }

    #[test]
    fn test_codigo_format() {
        let store = ReturnStore::new();
        let c = store.next_codigo();
        assert!(c.starts_with("DEV-"));
        assert!(c.ends_with("-0001"));
    }

    #[tokio::test]
    async fn test_insert_get_update() {
        let store = ReturnStore::new();
        store.insert(ret("DEV-1", "VEN-1", "u1")).await;

        store
            .update("DEV-1", |r| r.transition(ReturnState::Aprobada))
            .await
            .unwrap();
        assert_eq!(store.get("DEV-1").await.unwrap().state, ReturnState::Aprobada);
    }

    #[tokio::test]
    async fn test_open_for_sale_ignores_terminal() {
        let store = ReturnStore::new();
        store.insert(ret("DEV-1", "VEN-1", "u1")).await;
        store
            .update("DEV-1", |r| r.transition(ReturnState::Rechazada))
            .await
            .unwrap();
        store.insert(ret("DEV-2", "VEN-1", "u1")).await;

        let open = store.open_for_sale("VEN-1").await;
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].codigo, "DEV-2");
    }
}
