//! # libreria-ledger: Concurrent State Layer
//!
//! This crate owns every piece of shared mutable state in the fulfillment
//! system and exposes it through cloneable, task-safe handles.
//!
//! ## Stores
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         libreria-ledger                                 │
//! │                                                                         │
//! │  ┌──────────────┐  ┌───────────────┐  ┌──────────────────────────────┐ │
//! │  │ StockLedger  │  │ PaymentLedger │  │  IdempotencyStore            │ │
//! │  │ reserve /    │  │ debit/credit, │  │  (operation, token) →        │ │
//! │  │ release /    │  │ audit trail,  │  │  recorded outcome, so        │ │
//! │  │ commit with  │  │ admin         │  │  replays never double-apply  │ │
//! │  │ version CAS  │  │ overrides     │  │                              │ │
//! │  └──────────────┘  └───────────────┘  └──────────────────────────────┘ │
//! │                                                                         │
//! │  ┌──────────────┐  ┌───────────┐  ┌───────────┐  ┌─────────────┐     │
//! │  │ CatalogStore │  │ CartStore │  │ SaleStore │  │ ReturnStore │     │
//! │  └──────────────┘  └───────────┘  └───────────┘  └─────────────┘     │
//! │  ┌───────────────┐                                                    │
//! │  │ DiscountStore │                                                    │
//! │  └───────────────┘                                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Error Handling
//! Ledger failures ARE domain failures (insufficient stock, invalid card,
//! CAS conflict), so every operation returns [`libreria_core::CoreResult`]
//! directly; there is no parallel error taxonomy to translate. The service
//! boundary in `libreria-fulfillment` maps `CoreError` to wire codes once.
//!
//! ## Concurrency Model
//! Request-scoped units of work run concurrently; there is no global lock.
//! Each store guards its own map with a `tokio::sync::RwLock`, and the
//! stock ledger layers optimistic concurrency (version compare-and-swap
//! with a bounded retry budget) on top, because stock is the one resource
//! many buyers contend for.

pub mod carts;
pub mod catalog;
pub mod discounts;
pub mod idempotency;
pub mod payment;
pub mod returns;
pub mod sales;
pub mod stock;

pub use carts::CartStore;
pub use catalog::CatalogStore;
pub use discounts::DiscountStore;
pub use idempotency::{IdempotencyStore, Operation};
pub use payment::PaymentLedger;
pub use returns::ReturnStore;
pub use sales::SaleStore;
pub use stock::{Reservation, ReservationStatus, StockLedger};
