//! # libreria-fulfillment: Service Layer
//!
//! The only writer that spans multiple ledgers. Everything a caller does
//! to the fulfillment system goes through the [`Fulfillment`] service.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      libreria-fulfillment                               │
//! │                                                                         │
//! │  ┌───────────────────────────────────────────────────────────────────┐ │
//! │  │                    Fulfillment (facade)                           │ │
//! │  │                                                                   │ │
//! │  │   carts ─► drift gate ─► quote ─► SALE SAGA ─► shipment states    │ │
//! │  │                                      │                            │ │
//! │  │        reserve ─► charge ─► commit   │   returns: request ─►      │ │
//! │  │             ▲ CompensationLog ▲      │   approve ─► inspect ─►    │ │
//! │  │             └── reverse unwind ──────┘   refund ─► restock        │ │
//! │  └───────────────────────────────────────────────────────────────────┘ │
//! │                                                                         │
//! │  error:    CoreError ──► ServiceError { code, message }                 │
//! │  config:   env-overridable FulfillmentConfig                            │
//! │  activity: ActivityLog trait (tracing by default)                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod activity;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod returns;
pub mod saga;

pub use activity::{Activity, ActivityLog, TracingActivityLog};
pub use config::{ConfigError, FulfillmentConfig};
pub use error::{ErrorCode, ServiceError, ServiceResult};
pub use orchestrator::Fulfillment;
pub use returns::ReturnRequestItem;
pub use saga::{Compensation, CompensationLog};
