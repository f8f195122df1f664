//! # Payment Ledger
//!
//! Card balances, debits/credits, and the append-only audit trail.
//!
//! ## Rules
//! - Debit cards fail a debit when `amount > balance`; credit cards
//!   authorize unconditionally and may go negative.
//! - Every balance change appends a [`BalanceMutation`] with before/after
//!   snapshots. The trail is never rewritten.
//! - Debits are idempotent under a caller-supplied `transaction_id`.
//! - Admin overrides set an absolute balance and require a reason.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use libreria_core::error::{CoreError, CoreResult};
use libreria_core::types::{BalanceMutation, BalanceMutationKind, Card, CardType};
use libreria_core::validation::{validate_amount_cents, validate_balance_cents, validate_reason};

use crate::idempotency::{IdempotencyStore, Operation};

/// Concurrency-safe card balance accounting. Clones share state.
#[derive(Debug, Clone)]
pub struct PaymentLedger {
    cards: Arc<RwLock<HashMap<String, Card>>>,
    audit: Arc<RwLock<Vec<BalanceMutation>>>,
    idempotency: IdempotencyStore,
}

impl PaymentLedger {
    pub fn new(idempotency: IdempotencyStore) -> Self {
        PaymentLedger {
            cards: Arc::new(RwLock::new(HashMap::new())),
            audit: Arc::new(RwLock::new(Vec::new())),
            idempotency,
        }
    }

    /// Registers a card. Bootstrap/admin path; replaces any existing card
    /// with the same id.
    pub async fn register_card(&self, card: Card) {
        let mut cards = self.cards.write().await;
        cards.insert(card.id.clone(), card);
    }

    pub async fn get_card(&self, card_id: &str) -> CoreResult<Card> {
        let cards = self.cards.read().await;
        cards
            .get(card_id)
            .cloned()
            .ok_or_else(|| CoreError::not_found("Card", card_id))
    }

    /// Cards owned by a customer, default card first.
    pub async fn cards_for_owner(&self, owner_id: &str) -> Vec<Card> {
        let cards = self.cards.read().await;
        let mut owned: Vec<Card> = cards
            .values()
            .filter(|c| c.owner_id == owner_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.is_default.cmp(&a.is_default).then(a.id.cmp(&b.id)));
        owned
    }

    // -------------------------------------------------------------------------
    // Debit / Credit
    // -------------------------------------------------------------------------

    /// Charges a card.
    ///
    /// ## Rules
    /// - Card must be active and unexpired (`InvalidCard` otherwise)
    /// - Debit cards must cover the amount (`InsufficientBalance`)
    /// - Credit cards authorize regardless of balance
    /// - Replaying `transaction_id` is a no-op success
    pub async fn debit(
        &self,
        card_id: &str,
        amount_cents: i64,
        transaction_id: &str,
    ) -> CoreResult<()> {
        validate_amount_cents(amount_cents)?;

        if self.idempotency.seen(Operation::Debit, transaction_id).await {
            debug!(transaction_id = %transaction_id, "Debit replay, no-op");
            return Ok(());
        }

        let mut cards = self.cards.write().await;
        let card = cards
            .get_mut(card_id)
            .ok_or_else(|| CoreError::not_found("Card", card_id))?;

        if !card.is_valid(Utc::now()) {
            let reason = if card.active {
                "card is expired"
            } else {
                "card is inactive"
            };
            return Err(CoreError::InvalidCard {
                card_id: card_id.to_string(),
                reason: reason.to_string(),
            });
        }

        if card.card_type == CardType::Debito && amount_cents > card.balance_cents {
            return Err(CoreError::InsufficientBalance {
                card_id: card_id.to_string(),
                balance_cents: card.balance_cents,
                requested_cents: amount_cents,
            });
        }

        let before = card.balance_cents;
        card.balance_cents -= amount_cents;
        let after = card.balance_cents;
        drop(cards);

        self.append_audit(card_id, BalanceMutationKind::Debito, before, after, transaction_id)
            .await;
        self.idempotency.record(Operation::Debit, transaction_id).await;
        info!(card_id = %card_id, amount_cents = %amount_cents,
              transaction_id = %transaction_id, "Card debited");
        Ok(())
    }

    /// Returns money to a card. Used for refunds and saga compensation.
    ///
    /// Credits apply even to inactive or expired cards: a customer is owed
    /// their money back regardless of card status.
    pub async fn credit(&self, card_id: &str, amount_cents: i64, reason: &str) -> CoreResult<()> {
        validate_amount_cents(amount_cents)?;

        let mut cards = self.cards.write().await;
        let card = cards
            .get_mut(card_id)
            .ok_or_else(|| CoreError::not_found("Card", card_id))?;

        let before = card.balance_cents;
        card.balance_cents += amount_cents;
        let after = card.balance_cents;
        drop(cards);

        self.append_audit(card_id, BalanceMutationKind::Credito, before, after, reason)
            .await;
        info!(card_id = %card_id, amount_cents = %amount_cents, reason = %reason, "Card credited");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Admin override
    // -------------------------------------------------------------------------

    /// Sets a card balance to an absolute value. Admin path only; the
    /// caller's role is checked at the service boundary.
    ///
    /// ## Rules
    /// - New balance must be >= 0
    /// - Reason is mandatory and lands in the audit trail
    pub async fn set_absolute_balance(
        &self,
        card_id: &str,
        new_balance_cents: i64,
        reason: &str,
    ) -> CoreResult<()> {
        validate_balance_cents(new_balance_cents)?;
        let reason = validate_reason(reason)?;

        let mut cards = self.cards.write().await;
        let card = cards
            .get_mut(card_id)
            .ok_or_else(|| CoreError::not_found("Card", card_id))?;

        let before = card.balance_cents;
        card.balance_cents = new_balance_cents;
        drop(cards);

        self.append_audit(
            card_id,
            BalanceMutationKind::AjusteAdmin,
            before,
            new_balance_cents,
            &reason,
        )
        .await;
        info!(card_id = %card_id, before_cents = %before, after_cents = %new_balance_cents,
              reason = %reason, "Admin balance override");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Audit trail
    // -------------------------------------------------------------------------

    /// Mutations recorded for a card, oldest first.
    pub async fn audit_for_card(&self, card_id: &str) -> Vec<BalanceMutation> {
        let audit = self.audit.read().await;
        audit.iter().filter(|m| m.card_id == card_id).cloned().collect()
    }

    async fn append_audit(
        &self,
        card_id: &str,
        kind: BalanceMutationKind,
        before_cents: i64,
        after_cents: i64,
        reason: &str,
    ) {
        let mut audit = self.audit.write().await;
        audit.push(BalanceMutation {
            id: Uuid::new_v4().to_string(),
            card_id: card_id.to_string(),
            kind,
            before_cents,
            after_cents,
            reason: reason.to_string(),
            at: Utc::now(),
        });
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
