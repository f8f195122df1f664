//! # Catalog Store
//!
//! The slice of the catalog the fulfillment core reads: book snapshot data
//! and the live price. Price changes here are what the cart's drift
//! detection compares against.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;

use libreria_core::error::{CoreError, CoreResult};
use libreria_core::types::Book;
use libreria_core::validation::validate_amount_cents;

/// Book lookup shared across tasks. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct CatalogStore {
    books: Arc<RwLock<HashMap<String, Book>>>,
}

impl CatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a book.
    pub async fn insert_book(&self, book: Book) {
        let mut books = self.books.write().await;
        books.insert(book.id.clone(), book);
    }

    /// Fetches an active book. Inactive books are invisible to buyers.
    pub async fn get_book(&self, book_id: &str) -> CoreResult<Book> {
        let books = self.books.read().await;
        books
            .get(book_id)
            .filter(|b| b.active)
            .cloned()
            .ok_or_else(|| CoreError::not_found("Book", book_id))
    }

    /// Current price in cents, or None for unknown/inactive books. The
    /// shape drift detection wants.
    pub async fn current_price(&self, book_id: &str) -> Option<i64> {
        let books = self.books.read().await;
        books.get(book_id).filter(|b| b.active).map(|b| b.price_cents)
    }

    /// Snapshot of current prices for a set of books, for a single locked
    /// read instead of one per line.
    pub async fn prices_for(&self, book_ids: &[String]) -> HashMap<String, i64> {
        let books = self.books.read().await;
        book_ids
            .iter()
            .filter_map(|id| {
                books
                    .get(id)
                    .filter(|b| b.active)
                    .map(|b| (id.clone(), b.price_cents))
            })
            .collect()
    }

    /// Changes a book's price. Existing cart lines keep their frozen price
    /// and pick this up as drift.
    pub async fn set_price(&self, book_id: &str, price_cents: i64) -> CoreResult<()> {
        validate_amount_cents(price_cents)?;

        let mut books = self.books.write().await;
        let book = books
            .get_mut(book_id)
            .ok_or_else(|| CoreError::not_found("Book", book_id))?;

        let old = book.price_cents;
        book.price_cents = price_cents;
        info!(book_id = %book_id, old_cents = %old, new_cents = %price_cents, "Book price changed");
        Ok(())
    }

    /// Soft-deletes a book: it stops being sellable but stays resolvable
    /// for historical snapshots.
    pub async fn deactivate(&self, book_id: &str) -> CoreResult<()> {
        let mut books = self.books.write().await;
        let book = books
            .get_mut(book_id)
            .ok_or_else(|| CoreError::not_found("Book", book_id))?;
        book.active = false;
        info!(book_id = %book_id, "Book deactivated");
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn book(id: &str, price_cents: i64) -> Book {
        Book {
            id: id.to_string(),
            title: format!("Book {}", id),
            author: "Autora".to_string(),
            price_cents,
            active: true,
        }
    }

    #[tokio::test]
    async fn test_get_and_price() {
        let store = CatalogStore::new();
        store.insert_book(book("b1", 2500)).await;

        assert_eq!(store.get_book("b1").await.unwrap().price_cents, 2500);
        assert_eq!(store.current_price("b1").await, Some(2500));
        assert_eq!(store.current_price("nope").await, None);
    }

    #[tokio::test]
    async fn test_set_price() {
        let store = CatalogStore::new();
        store.insert_book(book("b1", 2500)).await;

        store.set_price("b1", 2800).await.unwrap();
        assert_eq!(store.current_price("b1").await, Some(2800));

        assert!(store.set_price("b1", 0).await.is_err());
        assert!(store.set_price("ghost", 1000).await.is_err());
    }

    #[tokio::test]
    async fn test_deactivated_book_is_invisible() {
        let store = CatalogStore::new();
        store.insert_book(book("b1", 2500)).await;
        store.deactivate("b1").await.unwrap();

        assert!(store.get_book("b1").await.is_err());
        assert_eq!(store.current_price("b1").await, None);
    }

    #[tokio::test]
    async fn test_prices_for_skips_unknown() {
        let store = CatalogStore::new();
        store.insert_book(book("b1", 1000)).await;
        store.insert_book(book("b2", 2000)).await;

        let prices = store
            .prices_for(&["b1".to_string(), "ghost".to_string()])
            .await;
        assert_eq!(prices.len(), 1);
        assert_eq!(prices.get("b1"), Some(&1000));
    }
}
