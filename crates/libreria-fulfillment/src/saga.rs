//! # Sale Saga Compensation
//!
//! The compensation log that makes sale creation all-or-nothing.
//!
//! ## How It Works
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Compensation Log                                    │
//! │                                                                         │
//! │  Each completed saga step pushes its inverse:                           │
//! │                                                                         │
//! │    reserve(b1) ok ──► push ReleaseReservation(b1)                       │
//! │    reserve(b2) ok ──► push ReleaseReservation(b2)                       │
//! │    debit(card) ok ──► push RefundDebit(card)                            │
//! │                                                                         │
//! │  A later step fails ──► run the log in REVERSE order:                   │
//! │                                                                         │
//! │    refund the debit, release b2, release b1                             │
//! │                                                                         │
//! │  Compensation itself uses idempotent operations, so a crash mid-        │
//! │  rollback can be retried safely. Individual compensation failures are   │
//! │  logged and do not stop the rest of the rollback.                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use tracing::{error, info};

use libreria_ledger::{PaymentLedger, StockLedger};

/// The inverse of one completed saga step.
#[derive(Debug, Clone)]
pub enum Compensation {
    /// Undo a stock reservation.
    ReleaseReservation {
        book_id: String,
        qty: i64,
        holder_id: String,
        reservation_id: String,
    },
    /// Undo a card debit by crediting the amount back.
    RefundDebit {
        card_id: String,
        amount_cents: i64,
        reason: String,
    },
}

/// Accumulates inverses as saga steps complete; unwinds them in reverse
/// order on failure.
#[derive(Debug, Default)]
pub struct CompensationLog {
    steps: Vec<Compensation>,
}

impl CompensationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the inverse of a step that just completed.
    pub fn push(&mut self, step: Compensation) {
        self.steps.push(step);
    }

    /// Discards the log: the saga committed, nothing to undo.
    pub fn commit(mut self) {
        self.steps.clear();
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Unwinds every registered step, newest first.
    ///
    /// Failures are logged and skipped so one stuck compensation cannot
    /// strand the others. The underlying operations are idempotent, so a
    /// retry of the whole saga re-runs these safely.
    pub async fn unwind(self, stock: &StockLedger, payments: &PaymentLedger) {
        for step in self.steps.into_iter().rev() {
            match step {
                Compensation::ReleaseReservation {
                    book_id,
                    qty,
                    holder_id,
                    reservation_id,
                } => {
                    info!(book_id = %book_id, reservation_id = %reservation_id,
                          "Compensating: releasing reservation");
                    if let Err(e) = stock
                        .release(&book_id, qty, &holder_id, &reservation_id)
                        .await
                    {
                        error!(book_id = %book_id, reservation_id = %reservation_id,
                               error = %e, "Compensation failed: release");
                    }
                }
                Compensation::RefundDebit {
                    card_id,
                    amount_cents,
                    reason,
                } => {
                    info!(card_id = %card_id, amount_cents = %amount_cents,
                          "Compensating: refunding debit");
                    if let Err(e) = payments.credit(&card_id, amount_cents, &reason).await {
                        error!(card_id = %card_id, error = %e, "Compensation failed: refund");
                    }
                }
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use libreria_core::types::{Card, CardType, StockRecord};
    use libreria_ledger::IdempotencyStore;

    #[tokio::test]
    async fn test_unwind_restores_stock_and_balance() {
        let idempotency = IdempotencyStore::new();
        let stock = StockLedger::new(idempotency.clone());
        let payments = PaymentLedger::new(idempotency);

        stock.insert_record(StockRecord::new("b1", 5)).await;
        payments
            .register_card(Card {
                id: "c1".to_string(),
                owner_id: "u1".to_string(),
                card_type: CardType::Debito,
                balance_cents: 10_000,
                expiry_month: 12,
                expiry_year: 2099,
                active: true,
                is_default: true,
            })
            .await;

        // Simulate a saga that reserved and charged, then failed.
        stock.reserve("b1", 2, "u1", "res-1").await.unwrap();
        payments.debit("c1", 4_000, "tx-1").await.unwrap();

        let mut log = CompensationLog::new();
        log.push(Compensation::ReleaseReservation {
            book_id: "b1".to_string(),
            qty: 2,
            holder_id: "u1".to_string(),
            reservation_id: "res-1".to_string(),
        });
        log.push(Compensation::RefundDebit {
            card_id: "c1".to_string(),
            amount_cents: 4_000,
            reason: "rollback tx-1".to_string(),
        });

        log.unwind(&stock, &payments).await;

        let record = stock.record("b1").await.unwrap();
        assert_eq!(record.available_qty, 5);
        assert_eq!(record.reserved_qty, 0);
        assert_eq!(payments.get_card("c1").await.unwrap().balance_cents, 10_000);
    }

    #[tokio::test]
    async fn test_commit_discards_log() {
        let idempotency = IdempotencyStore::new();
        let stock = StockLedger::new(idempotency.clone());
        let payments = PaymentLedger::new(idempotency);

        stock.insert_record(StockRecord::new("b1", 5)).await;
        stock.reserve("b1", 1, "u1", "res-1").await.unwrap();

        let mut log = CompensationLog::new();
        log.push(Compensation::ReleaseReservation {
            book_id: "b1".to_string(),
            qty: 1,
            holder_id: "u1".to_string(),
            reservation_id: "res-1".to_string(),
        });
        log.commit();

        // the reservation is still held
        let record = stock.record("b1").await.unwrap();
        assert_eq!(record.reserved_qty, 1);
        let _ = &payments;
    }
}
