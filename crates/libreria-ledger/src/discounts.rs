//! # Discount Code Registry
//!
//! Admin-issued discount codes, looked up by their case-insensitive code
//! string when a customer applies one to their cart.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;

use libreria_core::discount::DiscountCode;
use libreria_core::error::{CoreError, CoreResult};

/// Discount codes keyed by their normalized code. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct DiscountStore {
    codes: Arc<RwLock<HashMap<String, DiscountCode>>>,
}

impl DiscountStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn normalize(code: &str) -> String {
        code.trim().to_uppercase()
    }

    /// Registers or replaces a code.
    pub async fn register(&self, code: DiscountCode) {
        info!(code = %code.code, "Discount code registered");
        let mut codes = self.codes.write().await;
        codes.insert(Self::normalize(&code.code), code);
    }

    /// Resolves an active code. Unknown and deactivated codes both come
    /// back NotFound; customers cannot distinguish them.
    pub async fn get_active(&self, code: &str) -> CoreResult<DiscountCode> {
        let codes = self.codes.read().await;
        codes
            .get(&Self::normalize(code))
            .filter(|c| c.active)
            .cloned()
            .ok_or_else(|| CoreError::not_found("DiscountCode", code))
    }

    /// Deactivates a code without forgetting it.
    pub async fn deactivate(&self, code: &str) -> CoreResult<()> {
        let mut codes = self.codes.write().await;
        let entry = codes
            .get_mut(&Self::normalize(code))
            .ok_or_else(|| CoreError::not_found("DiscountCode", code))?;
        entry.active = false;
        info!(code = %code, "Discount code deactivated");
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use libreria_core::discount::DiscountRule;

    #[tokio::test]
    async fn test_register_and_lookup_case_insensitive() {
        let store = DiscountStore::new();
        store
            .register(DiscountCode::new(
                "Desc10",
                DiscountRule::Percentage { bps: 1000 },
            ))
            .await;

        assert!(store.get_active("desc10").await.is_ok());
        assert!(store.get_active(" DESC10 ").await.is_ok());
        assert!(store.get_active("otro").await.is_err());
    }

    #[tokio::test]
    async fn test_deactivated_code_is_invisible() {
        let store = DiscountStore::new();
        store
            .register(DiscountCode::new(
                "VERANO",
                DiscountRule::Fixed { amount_cents: 500 },
            ))
            .await;

        store.deactivate("verano").await.unwrap();
        assert!(store.get_active("VERANO").await.is_err());
    }
}
