//! # Stock Ledger
//!
//! Per-book available/reserved accounting with optimistic concurrency.
//!
//! ## Reservation Protocol
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Stock Ledger Operations                             │
//! │                                                                         │
//! │  reserve(book, qty, holder, reservation_id)                             │
//! │      available -= qty     reserved += qty     (hold created)            │
//! │           │                                                             │
//! │           ├──► release(...)  available += qty  reserved -= qty          │
//! │           │    (hold reversed; the copies go back on the shelf)         │
//! │           │                                                             │
//! │           └──► commit(..., transaction_id)     reserved -= qty          │
//! │                (hold made permanent; the copies are SOLD and never      │
//! │                 return to available — restocking is a separate,         │
//! │                 explicit admin action)                                  │
//! │                                                                         │
//! │  Every operation is keyed by a caller-supplied reservation_id           │
//! │  (commit also by transaction_id); replays are no-op successes.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Optimistic Concurrency
//! Each mutation snapshots the record under a read lock, computes the new
//! state, then writes back only if `version` is unchanged, retrying with
//! fresh state up to a bounded budget before failing with
//! `ConcurrentModification`. This reimplements the document-store version
//! field as an explicit compare-and-swap.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use libreria_core::error::{CoreError, CoreResult};
use libreria_core::types::StockRecord;
use libreria_core::DEFAULT_CAS_RETRY_BUDGET;

use crate::idempotency::{IdempotencyStore, Operation};

// =============================================================================
// Reservations
// =============================================================================

/// Lifecycle of a single logical hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    /// Stock is held; may be released or committed.
    Held,
    /// Hold reversed; quantity returned to available.
    Released,
    /// Hold made permanent; quantity left physical stock.
    Committed,
}

/// A temporary hold on stock, identified by its caller-supplied id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub reservation_id: String,
    pub book_id: String,
    pub qty: i64,
    pub holder_id: String,
    pub status: ReservationStatus,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Stock Ledger
// =============================================================================

/// Concurrency-safe stock accounting. Cheap to clone; clones share state.
#[derive(Debug, Clone)]
pub struct StockLedger {
    records: Arc<RwLock<HashMap<String, StockRecord>>>,
    reservations: Arc<RwLock<HashMap<String, Reservation>>>,
    idempotency: IdempotencyStore,
    retry_budget: u32,
}

impl StockLedger {
    pub fn new(idempotency: IdempotencyStore) -> Self {
        Self::with_retry_budget(idempotency, DEFAULT_CAS_RETRY_BUDGET)
    }

    pub fn with_retry_budget(idempotency: IdempotencyStore, retry_budget: u32) -> Self {
        StockLedger {
            records: Arc::new(RwLock::new(HashMap::new())),
            reservations: Arc::new(RwLock::new(HashMap::new())),
            idempotency,
            retry_budget: retry_budget.max(1),
        }
    }

    /// Seeds or replaces the record for a book. Admin/bootstrap path.
    pub async fn insert_record(&self, record: StockRecord) {
        let mut records = self.records.write().await;
        records.insert(record.book_id.clone(), record);
    }

    /// Current counters for a book.
    pub async fn record(&self, book_id: &str) -> CoreResult<StockRecord> {
        let records = self.records.read().await;
        records
            .get(book_id)
            .cloned()
            .ok_or_else(|| CoreError::not_found("StockRecord", book_id))
    }

    /// Looks up a reservation by id.
    pub async fn reservation(&self, reservation_id: &str) -> Option<Reservation> {
        self.reservations.read().await.get(reservation_id).cloned()
    }

    // -------------------------------------------------------------------------
    // Reserve
    // -------------------------------------------------------------------------

    /// Places a hold on `qty` copies of a book.
    ///
    /// Atomically checks `available_qty >= qty`, then moves the quantity
    /// from available to reserved. Fails with `InsufficientStock` when not
    /// enough copies are available. Replaying the same `reservation_id` is
    /// a no-op success.
    pub async fn reserve(
        &self,
        book_id: &str,
        qty: i64,
        holder_id: &str,
        reservation_id: &str,
    ) -> CoreResult<()> {
        libreria_core::validation::validate_quantity(qty)?;

        if self.idempotency.seen(Operation::Reserve, reservation_id).await {
            debug!(reservation_id = %reservation_id, "Reserve replay, no-op");
            return Ok(());
        }

        self.mutate_with_cas(book_id, |record| {
            if record.available_qty < qty {
                return Err(CoreError::InsufficientStock {
                    book_id: book_id.to_string(),
                    available: record.available_qty,
                    requested: qty,
                });
            }
            record.available_qty -= qty;
            record.reserved_qty += qty;
            Ok(())
        })
        .await?;

        let mut reservations = self.reservations.write().await;
        reservations.insert(
            reservation_id.to_string(),
            Reservation {
                reservation_id: reservation_id.to_string(),
                book_id: book_id.to_string(),
                qty,
                holder_id: holder_id.to_string(),
                status: ReservationStatus::Held,
                created_at: Utc::now(),
            },
        );
        drop(reservations);

        self.idempotency.record(Operation::Reserve, reservation_id).await;
        info!(book_id = %book_id, qty = %qty, reservation_id = %reservation_id, "Stock reserved");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Release
    // -------------------------------------------------------------------------

    /// Reverses a hold, returning its exact quantity to available.
    ///
    /// No-op success if the reservation was already released or committed;
    /// `UnknownReservation` if no hold was ever created under this id.
    pub async fn release(
        &self,
        book_id: &str,
        qty: i64,
        holder_id: &str,
        reservation_id: &str,
    ) -> CoreResult<()> {
        let reservation = self
            .reservation(reservation_id)
            .await
            .ok_or_else(|| CoreError::UnknownReservation {
                reservation_id: reservation_id.to_string(),
            })?;

        if reservation.status != ReservationStatus::Held {
            debug!(reservation_id = %reservation_id, status = ?reservation.status,
                   "Release of settled reservation, no-op");
            return Ok(());
        }

        self.check_reservation_shape(&reservation, book_id, qty, holder_id)?;

        // Reverse the exact quantity held, not the caller's number.
        let held = reservation.qty;
        self.mutate_with_cas(book_id, |record| {
            record.available_qty += held;
            record.reserved_qty -= held;
            Ok(())
        })
        .await?;

        self.set_reservation_status(reservation_id, ReservationStatus::Released)
            .await;
        self.idempotency.record(Operation::Release, reservation_id).await;
        info!(book_id = %book_id, qty = %held, reservation_id = %reservation_id, "Reservation released");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Commit
    // -------------------------------------------------------------------------

    /// Converts a hold into a permanent decrement: the quantity leaves
    /// `reserved_qty` and never returns to `available_qty`.
    ///
    /// Idempotent under `transaction_id`; `UnknownReservation` when no hold
    /// exists under `reservation_id`.
    pub async fn commit(
        &self,
        book_id: &str,
        qty: i64,
        holder_id: &str,
        reservation_id: &str,
        transaction_id: &str,
    ) -> CoreResult<()> {
        if self.idempotency.seen(Operation::Commit, transaction_id).await {
            debug!(transaction_id = %transaction_id, "Commit replay, no-op");
            return Ok(());
        }

        let reservation = self
            .reservation(reservation_id)
            .await
            .ok_or_else(|| CoreError::UnknownReservation {
                reservation_id: reservation_id.to_string(),
            })?;

        match reservation.status {
            ReservationStatus::Committed => {
                debug!(reservation_id = %reservation_id, "Commit of committed reservation, no-op");
                return Ok(());
            }
            ReservationStatus::Released => {
                // The hold no longer exists; committing it would conjure
                // stock out of nothing.
                return Err(CoreError::UnknownReservation {
                    reservation_id: reservation_id.to_string(),
                });
            }
            ReservationStatus::Held => {}
        }

        self.check_reservation_shape(&reservation, book_id, qty, holder_id)?;

        let held = reservation.qty;
        self.mutate_with_cas(book_id, |record| {
            record.reserved_qty -= held;
            Ok(())
        })
        .await?;

        self.set_reservation_status(reservation_id, ReservationStatus::Committed)
            .await;
        self.idempotency.record(Operation::Commit, transaction_id).await;
        info!(book_id = %book_id, qty = %held, reservation_id = %reservation_id,
              transaction_id = %transaction_id, "Reservation committed");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Admin edits
    // -------------------------------------------------------------------------

    /// Adds copies to available stock. The explicit admin action for new
    /// inventory, completed returns, and restocking cancelled sales.
    pub async fn restock(&self, book_id: &str, qty: i64) -> CoreResult<()> {
        if qty <= 0 {
            return Err(CoreError::Validation(
                libreria_core::error::ValidationError::MustBePositive {
                    field: "cantidad".to_string(),
                },
            ));
        }
        self.mutate_with_cas(book_id, |record| {
            record.available_qty += qty;
            Ok(())
        })
        .await?;
        info!(book_id = %book_id, qty = %qty, "Stock replenished");
        Ok(())
    }

    /// Overwrites the available count. Admin correction path; reserved
    /// quantity is untouched.
    pub async fn set_stock(&self, book_id: &str, available_qty: i64) -> CoreResult<()> {
        if available_qty < 0 {
            return Err(CoreError::Validation(
                libreria_core::error::ValidationError::OutOfRange {
                    field: "cantidad_disponible".to_string(),
                    min: 0,
                    max: i64::MAX,
                },
            ));
        }
        self.mutate_with_cas(book_id, |record| {
            record.available_qty = available_qty;
            Ok(())
        })
        .await?;
        info!(book_id = %book_id, available_qty = %available_qty, "Stock set");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // CAS core
    // -------------------------------------------------------------------------

    /// Snapshot-compute-compare-swap with a bounded retry budget.
    ///
    /// `apply` sees a copy of the current record and either mutates it or
    /// rejects the operation. The write lands only if the version is still
    /// the one we read; otherwise we retry against fresh state.
    async fn mutate_with_cas<F>(&self, book_id: &str, mut apply: F) -> CoreResult<StockRecord>
    where
        F: FnMut(&mut StockRecord) -> CoreResult<()>,
    {
        for attempt in 0..self.retry_budget {
            // Snapshot under the read lock.
            let snapshot = {
                let records = self.records.read().await;
                records
                    .get(book_id)
                    .cloned()
                    .ok_or_else(|| CoreError::not_found("StockRecord", book_id))?
            };

            let mut candidate = snapshot.clone();
            apply(&mut candidate)?;

            debug_assert!(candidate.available_qty >= 0 && candidate.reserved_qty >= 0);
            candidate.version = snapshot.version + 1;

            // Conditional write: only if nobody moved the version.
            let mut records = self.records.write().await;
            match records.get_mut(book_id) {
                Some(current) if current.version == snapshot.version => {
                    *current = candidate.clone();
                    return Ok(candidate);
                }
                Some(_) => {
                    warn!(book_id = %book_id, attempt = attempt + 1, "Stock CAS conflict, retrying");
                }
                None => return Err(CoreError::not_found("StockRecord", book_id)),
            }
        }

        Err(CoreError::ConcurrentModification {
            book_id: book_id.to_string(),
            attempts: self.retry_budget,
        })
    }

    /// Guards against a reservation id being reused with different
    /// parameters than the original hold.
    fn check_reservation_shape(
        &self,
        reservation: &Reservation,
        book_id: &str,
        qty: i64,
        holder_id: &str,
    ) -> CoreResult<()> {
        if reservation.book_id != book_id
            || reservation.qty != qty
            || reservation.holder_id != holder_id
        {
            return Err(CoreError::Validation(
                libreria_core::error::ValidationError::InvalidFormat {
                    field: "id_reserva".to_string(),
                    reason: format!(
                        "reservation {} was created for book {} qty {} holder {}",
                        reservation.reservation_id,
                        reservation.book_id,
                        reservation.qty,
                        reservation.holder_id
                    ),
                },
            ));
        }
        Ok(())
    }

    async fn set_reservation_status(&self, reservation_id: &str, status: ReservationStatus) {
        let mut reservations = self.reservations.write().await;
        if let Some(r) = reservations.get_mut(reservation_id) {
            r.status = status;
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
