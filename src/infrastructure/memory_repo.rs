use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;

use crate::domain::errors::DomainError;
use crate::domain::event::Event;
use crate::domain::order::{Order, OrderHistory, OrderStatus};
use crate::domain::pagination::page_slice;
use crate::domain::ports::{OrderRepository, OrderTx, DEFAULT_HISTORY_PAGE_SIZE};

#[derive(Debug, Clone, Default)]
struct State {
    orders: BTreeMap<u64, Order>,
    history: Vec<OrderHistory>,
    outbox: Vec<Event>,
    next_history_id: i64,
}

/// In-process repository with the same transactional contract as the
/// Postgres adapter. Transactions are serialised behind one lock and work
/// on a staged copy that replaces the live state only on commit.
#[derive(Debug, Default)]
pub struct InMemoryOrderRepository {
    state: Mutex<State>,
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, DomainError> {
        self.state
            .lock()
            .map_err(|_| DomainError::Internal("order state lock poisoned".to_string()))
    }

    /// Stores an order as-is, bypassing lifecycle rules. Meant for fixtures
    /// such as orders whose deadline already passed.
    pub fn seed(&self, order: Order) -> Result<(), DomainError> {
        let mut state = self.lock()?;
        state.orders.insert(order.id, order);
        Ok(())
    }

    /// Snapshot of the outbox in insertion order.
    pub fn outbox(&self) -> Result<Vec<Event>, DomainError> {
        Ok(self.lock()?.outbox.clone())
    }
}

struct MemoryTx<'a> {
    state: &'a mut State,
}

impl OrderTx for MemoryTx<'_> {
    fn get_order(&mut self, id: u64) -> Result<Order, DomainError> {
        self.state
            .orders
            .get(&id)
            .cloned()
            .ok_or(DomainError::OrderNotFound)
    }

    fn save_order(&mut self, order: &Order) -> Result<(), DomainError> {
        if self.state.orders.contains_key(&order.id) {
            return Err(DomainError::DuplicateOrder);
        }
        self.state.orders.insert(order.id, order.clone());
        Ok(())
    }

    fn update_order(&mut self, order: &Order) -> Result<(), DomainError> {
        match self.state.orders.get_mut(&order.id) {
            Some(existing) => {
                *existing = order.clone();
                Ok(())
            }
            None => Err(DomainError::OrderNotFound),
        }
    }

    fn delete_order(&mut self, id: u64) -> Result<(), DomainError> {
        self.state
            .orders
            .remove(&id)
            .map(|_| ())
            .ok_or(DomainError::OrderNotFound)
    }

    fn append_history(&mut self, order_id: u64, status: OrderStatus) -> Result<(), DomainError> {
        self.state.next_history_id += 1;
        let id = self.state.next_history_id;
        self.state.history.push(OrderHistory {
            id,
            order_id,
            status,
            created_at: Utc::now(),
        });
        Ok(())
    }

    fn save_event(&mut self, event: &Event) -> Result<(), DomainError> {
        self.state.outbox.push(event.clone());
        Ok(())
    }

    fn savepoint(
        &mut self,
        f: &mut dyn FnMut(&mut dyn OrderTx) -> Result<(), DomainError>,
    ) -> Result<(), DomainError> {
        let snapshot = self.state.clone();
        let result = f(self);
        if result.is_err() {
            *self.state = snapshot;
        }
        result
    }
}

impl OrderRepository for InMemoryOrderRepository {
    fn get_order(&self, id: u64) -> Result<Order, DomainError> {
        self.lock()?
            .orders
            .get(&id)
            .cloned()
            .ok_or(DomainError::OrderNotFound)
    }

    fn list_orders(&self) -> Result<Vec<Order>, DomainError> {
        Ok(self.lock()?.orders.values().cloned().collect())
    }

    fn get_history(&self, page: u32, count: u32) -> Result<Vec<OrderHistory>, DomainError> {
        let count = if count == 0 {
            DEFAULT_HISTORY_PAGE_SIZE
        } else {
            count
        };
        let newest_first: Vec<OrderHistory> = self.lock()?.history.iter().rev().cloned().collect();
        Ok(page_slice(&newest_first, page, count))
    }

    fn get_order_history(&self, order_id: u64) -> Result<Vec<OrderHistory>, DomainError> {
        Ok(self
            .lock()?
            .history
            .iter()
            .filter(|h| h.order_id == order_id)
            .cloned()
            .collect())
    }

    fn with_transaction<T, F>(&self, f: F) -> Result<T, DomainError>
    where
        F: FnOnce(&mut dyn OrderTx) -> Result<T, DomainError>,
    {
        let mut live = self.lock()?;
        let mut staged = live.clone();

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let mut tx = MemoryTx { state: &mut staged };
            f(&mut tx)
        }));

        match outcome {
            Ok(Ok(value)) => {
                *live = staged;
                Ok(value)
            }
            Ok(Err(e)) => Err(e),
            Err(payload) => {
                drop(live);
                panic::resume_unwind(payload)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;
    use chrono::Duration;

    use crate::domain::order::PackageType;

    fn order(id: u64) -> Order {
        Order {
            id,
            user_id: 1,
            status: OrderStatus::Expects,
            expires_at: Utc::now() + Duration::hours(1),
            package_type: PackageType::Box,
            weight: 1.0,
            price: BigDecimal::from(20),
        }
    }

    #[test]
    fn error_rolls_back_every_write() {
        let repo = InMemoryOrderRepository::new();

        let result: Result<(), DomainError> = repo.with_transaction(|tx| {
            tx.save_order(&order(1))?;
            tx.append_history(1, OrderStatus::Expects)?;
            Err(DomainError::Internal("boom".into()))
        });

        assert!(result.is_err());
        assert_eq!(repo.get_order(1), Err(DomainError::OrderNotFound));
        assert!(repo.get_history(0, 0).unwrap().is_empty());
    }

    #[test]
    fn panic_rolls_back_and_is_resumed() {
        let repo = InMemoryOrderRepository::new();

        let caught = panic::catch_unwind(AssertUnwindSafe(|| {
            let _: Result<(), DomainError> = repo.with_transaction(|tx| {
                tx.save_order(&order(1))?;
                panic!("inside transaction");
            });
        }));

        assert!(caught.is_err());
        assert_eq!(repo.get_order(1), Err(DomainError::OrderNotFound));
        // lock must still be usable afterwards
        assert!(repo.list_orders().unwrap().is_empty());
    }

    #[test]
    fn duplicate_insert_is_reported() {
        let repo = InMemoryOrderRepository::new();
        repo.with_transaction(|tx| tx.save_order(&order(1))).unwrap();

        let second = repo.with_transaction(|tx| tx.save_order(&order(1)));
        assert_eq!(second, Err(DomainError::DuplicateOrder));
    }

    #[test]
    fn failed_savepoint_keeps_sibling_writes() {
        let repo = InMemoryOrderRepository::new();

        repo.with_transaction(|tx| {
            tx.save_order(&order(1))?;
            let inner = tx.savepoint(&mut |tx: &mut dyn OrderTx| {
                tx.save_order(&order(2))?;
                Err(DomainError::WeightTooHeavy)
            });
            assert!(inner.is_err());
            Ok(())
        })
        .unwrap();

        assert!(repo.get_order(1).is_ok());
        assert_eq!(repo.get_order(2), Err(DomainError::OrderNotFound));
    }

    #[test]
    fn history_pages_newest_first_with_default_cap() {
        let repo = InMemoryOrderRepository::new();
        repo.with_transaction(|tx| {
            for id in 1..=60 {
                tx.append_history(id, OrderStatus::Expects)?;
            }
            Ok(())
        })
        .unwrap();

        let first = repo.get_history(0, 0).unwrap();
        assert_eq!(first.len(), DEFAULT_HISTORY_PAGE_SIZE as usize);
        assert_eq!(first[0].order_id, 60);

        let second = repo.get_history(1, 50).unwrap();
        assert_eq!(second.len(), 10);
        assert_eq!(second.last().unwrap().order_id, 1);
    }
}
