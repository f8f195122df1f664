//! # Fulfillment Configuration
//!
//! Runtime knobs for the fulfillment service.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                            │
//! │     LIBRERIA_TAX_RATE_BPS=1900                                          │
//! │     LIBRERIA_RETURN_WINDOW_DAYS=8                                       │
//! │     LIBRERIA_HOME_DELIVERY_FEE_CENTS=500                                │
//! │     LIBRERIA_CAS_RETRY_BUDGET=5                                         │
//! │                                                                         │
//! │  2. Default Values (from libreria-core constants)                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use libreria_core::money::Money;
use libreria_core::types::TaxRate;
use libreria_core::{
    DiscountPolicy, DEFAULT_CAS_RETRY_BUDGET, DEFAULT_TAX_RATE_BPS, HOME_DELIVERY_FEE_CENTS,
    RETURN_WINDOW_DAYS,
};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid fulfillment configuration: {0}")]
    Invalid(String),
}

/// Runtime configuration of the fulfillment service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FulfillmentConfig {
    /// Tax rate in basis points (1900 = 19%).
    #[serde(default = "default_tax_rate_bps")]
    pub tax_rate_bps: u32,

    /// Flat home-delivery fee in cents. Store pickup is always free.
    #[serde(default = "default_home_delivery_fee")]
    pub home_delivery_fee_cents: i64,

    /// Days after delivery during which a return may be requested.
    #[serde(default = "default_return_window")]
    pub return_window_days: i64,

    /// Bound on optimistic-concurrency retries in the stock ledger.
    #[serde(default = "default_cas_retry_budget")]
    pub cas_retry_budget: u32,

    /// Discount stacking policy: which rule kinds apply, in what order.
    /// Not overridable from the environment; a deployment that needs a
    /// different order deserializes the whole config.
    #[serde(default)]
    pub discount_policy: DiscountPolicy,
}

fn default_tax_rate_bps() -> u32 {
    DEFAULT_TAX_RATE_BPS
}

fn default_home_delivery_fee() -> i64 {
    HOME_DELIVERY_FEE_CENTS
}

fn default_return_window() -> i64 {
    RETURN_WINDOW_DAYS
}

fn default_cas_retry_budget() -> u32 {
    DEFAULT_CAS_RETRY_BUDGET
}

impl Default for FulfillmentConfig {
    fn default() -> Self {
        FulfillmentConfig {
            tax_rate_bps: default_tax_rate_bps(),
            home_delivery_fee_cents: default_home_delivery_fee(),
            return_window_days: default_return_window(),
            cas_retry_budget: default_cas_retry_budget(),
            discount_policy: DiscountPolicy::default(),
        }
    }
}

impl FulfillmentConfig {
    /// Loads defaults, applies environment overrides, and validates.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Loads config or falls back to defaults on failure.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            warn!("Failed to load fulfillment config: {}. Using defaults.", e);
            Self::default()
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tax_rate_bps > 10_000 {
            return Err(ConfigError::Invalid(format!(
                "tax_rate_bps must be at most 10000 (100%), got {}",
                self.tax_rate_bps
            )));
        }
        if self.home_delivery_fee_cents < 0 {
            return Err(ConfigError::Invalid(
                "home_delivery_fee_cents must not be negative".into(),
            ));
        }
        if self.return_window_days <= 0 {
            return Err(ConfigError::Invalid(
                "return_window_days must be positive".into(),
            ));
        }
        if self.cas_retry_budget == 0 {
            return Err(ConfigError::Invalid(
                "cas_retry_budget must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn tax_rate(&self) -> TaxRate {
        TaxRate::from_bps(self.tax_rate_bps)
    }

    pub fn home_delivery_fee(&self) -> Money {
        Money::from_cents(self.home_delivery_fee_cents)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(bps) = std::env::var("LIBRERIA_TAX_RATE_BPS") {
            if let Ok(v) = bps.parse::<u32>() {
                debug!(tax_rate_bps = v, "Overriding tax rate from environment");
                self.tax_rate_bps = v;
            }
        }

        if let Ok(fee) = std::env::var("LIBRERIA_HOME_DELIVERY_FEE_CENTS") {
            if let Ok(v) = fee.parse::<i64>() {
                debug!(fee_cents = v, "Overriding delivery fee from environment");
                self.home_delivery_fee_cents = v;
            }
        }

        if let Ok(days) = std::env::var("LIBRERIA_RETURN_WINDOW_DAYS") {
            if let Ok(v) = days.parse::<i64>() {
                debug!(days = v, "Overriding return window from environment");
                self.return_window_days = v;
            }
        }

        if let Ok(budget) = std::env::var("LIBRERIA_CAS_RETRY_BUDGET") {
            if let Ok(v) = budget.parse::<u32>() {
                debug!(budget = v, "Overriding CAS retry budget from environment");
                self.cas_retry_budget = v;
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
