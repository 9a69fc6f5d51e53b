use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use super::errors::DomainError;
use super::event::Event;
use super::order::{Order, OrderHistory, OrderStatus};

/// Server-side cap applied to history reads when the caller asks for 0.
pub const DEFAULT_HISTORY_PAGE_SIZE: u32 = 50;

/// Writes and reads that must share one transaction.
pub trait OrderTx {
    /// Reads the order inside the transaction, locking the row where the
    /// backend supports it.
    fn get_order(&mut self, id: u64) -> Result<Order, DomainError>;
    /// Fails with `DuplicateOrder` when the id is taken.
    fn save_order(&mut self, order: &Order) -> Result<(), DomainError>;
    /// Fails with `OrderNotFound` when no row matched.
    fn update_order(&mut self, order: &Order) -> Result<(), DomainError>;
    /// Fails with `OrderNotFound` when no row matched.
    fn delete_order(&mut self, id: u64) -> Result<(), DomainError>;
    fn append_history(&mut self, order_id: u64, status: OrderStatus) -> Result<(), DomainError>;
    fn save_event(&mut self, event: &Event) -> Result<(), DomainError>;
    /// Runs `f` in a nested scope (a savepoint). An error from `f` undoes
    /// only what `f` wrote; the outer transaction stays usable.
    fn savepoint(
        &mut self,
        f: &mut dyn FnMut(&mut dyn OrderTx) -> Result<(), DomainError>,
    ) -> Result<(), DomainError>;
}

pub trait OrderRepository: Send + Sync + 'static {
    fn get_order(&self, id: u64) -> Result<Order, DomainError>;
    fn list_orders(&self) -> Result<Vec<Order>, DomainError>;
    /// Newest first; `count == 0` falls back to [`DEFAULT_HISTORY_PAGE_SIZE`].
    fn get_history(&self, page: u32, count: u32) -> Result<Vec<OrderHistory>, DomainError>;
    /// Every history row of one order, oldest first.
    fn get_order_history(&self, order_id: u64) -> Result<Vec<OrderHistory>, DomainError>;

    /// Commits when `f` returns `Ok`, rolls back and returns the error
    /// otherwise. A panic inside `f` rolls back and is resumed. A failed
    /// commit is reported as an error.
    fn with_transaction<T, F>(&self, f: F) -> Result<T, DomainError>
    where
        F: FnOnce(&mut dyn OrderTx) -> Result<T, DomainError>;
}

impl<R: OrderRepository> OrderRepository for Arc<R> {
    fn get_order(&self, id: u64) -> Result<Order, DomainError> {
        (**self).get_order(id)
    }

    fn list_orders(&self) -> Result<Vec<Order>, DomainError> {
        (**self).list_orders()
    }

    fn get_history(&self, page: u32, count: u32) -> Result<Vec<OrderHistory>, DomainError> {
        (**self).get_history(page, count)
    }

    fn get_order_history(&self, order_id: u64) -> Result<Vec<OrderHistory>, DomainError> {
        (**self).get_order_history(order_id)
    }

    fn with_transaction<T, F>(&self, f: F) -> Result<T, DomainError>
    where
        F: FnOnce(&mut dyn OrderTx) -> Result<T, DomainError>,
    {
        (**self).with_transaction(f)
    }
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(String),
}

/// Best-effort key/value cache for order history projections.
pub trait HistoryCache: Send + Sync + 'static {
    fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
    fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;
    fn delete(&self, key: &str) -> Result<(), CacheError>;
}
