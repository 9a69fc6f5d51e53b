use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::domain::errors::DomainError;
use crate::domain::event::{Actor, Event, EventType};
use crate::domain::order::{
    return_window, AcceptOrderInput, ActionType, ImportResult, Order, OrderHistory, OrderStatus,
    PackageType, ProcessResult, RejectedRecord, StatusChange,
};
use crate::domain::pagination::{last_n, page_slice, scroll};
use crate::domain::ports::{HistoryCache, OrderRepository, OrderTx};
use crate::observability::Metrics;

pub struct OrderService<R> {
    repo: R,
    cache: Arc<dyn HistoryCache>,
    cache_ttl: Duration,
    metrics: Metrics,
}

impl<R: OrderRepository> OrderService<R> {
    pub fn new(repo: R, cache: Arc<dyn HistoryCache>, cache_ttl: Duration, metrics: Metrics) -> Self {
        Self {
            repo,
            cache,
            cache_ttl,
            metrics,
        }
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Courier hands a parcel to the pickup point.
    ///
    /// The order row, its first history row and an `order_accepted` outbox
    /// event are written in one transaction.
    pub fn accept_order(&self, input: AcceptOrderInput) -> Result<Order, DomainError> {
        log::info!(
            "AcceptOrder called: order_id={}, user_id={}",
            input.order_id,
            input.user_id
        );

        if input.expires_at <= Utc::now() {
            return Err(self.fail(
                DomainError::ValidationFailed("expiration date is in the past".to_string()),
                "Expiration date in past",
            ));
        }

        let package_type: PackageType = input
            .package
            .parse()
            .map_err(|e| self.fail(e, "Invalid package type"))?;

        match self.repo.get_order(input.order_id) {
            Ok(_) => {
                return Err(self.fail(DomainError::OrderAlreadyExists, "Order already exists"));
            }
            Err(DomainError::OrderNotFound) => {}
            Err(e) => return Err(self.fail(e, "Failed to look up order")),
        }

        let mut order = Order {
            id: input.order_id,
            user_id: input.user_id,
            status: OrderStatus::Expects,
            expires_at: input.expires_at,
            package_type,
            weight: input.weight,
            price: input.price,
        };

        order
            .validate_weight()
            .map_err(|e| self.fail(e, "Weight validation failed"))?;
        order.calculate_total_price();
        order
            .validate_price()
            .map_err(|e| self.fail(e, "Price validation failed"))?;

        self.repo
            .with_transaction(|tx| {
                // the unique key is the authoritative duplicate check
                tx.save_order(&order).map_err(|e| match e {
                    DomainError::DuplicateOrder => DomainError::OrderAlreadyExists,
                    other => other,
                })?;
                tx.append_history(order.id, order.status)?;
                tx.save_event(&Event::new(
                    EventType::OrderAccepted,
                    Actor::courier(order.user_id),
                    &order,
                    order.status,
                ))
            })
            .map_err(|e| self.fail(e, "Failed to save order"))?;

        self.metrics.record_event(EventType::OrderAccepted);
        self.invalidate(order.id);

        log::info!("Order accepted successfully: order_id={}", order.id);
        Ok(order)
    }

    /// Courier takes a parcel back. Allowed for returned orders at any time
    /// and for stored orders once their deadline passed. Deletes the row.
    pub fn return_order(&self, order_id: u64) -> Result<StatusChange, DomainError> {
        log::info!("ReturnOrder called: order_id={}", order_id);

        let result = self.repo.with_transaction(|tx| {
            let order = tx.get_order(order_id)?;

            match order.status {
                OrderStatus::Accepted => return Err(DomainError::OrderAlreadyIssued),
                OrderStatus::Returned => {}
                _ if Utc::now() < order.expires_at => return Err(DomainError::StorageNotExpired),
                _ => {}
            }

            tx.append_history(order_id, OrderStatus::Deleted)?;
            tx.delete_order(order_id)?;
            tx.save_event(&Event::new(
                EventType::OrderReturnedToCourier,
                Actor::courier(order.user_id),
                &order,
                OrderStatus::Deleted,
            ))
        });

        if let Err(e) = result {
            return Err(self.fail(e, "Failed to return order to courier"));
        }

        self.metrics.record_event(EventType::OrderReturnedToCourier);
        self.invalidate(order_id);

        log::info!("Order returned to courier and deleted: order_id={}", order_id);
        Ok(StatusChange {
            order_id,
            status: OrderStatus::Deleted,
        })
    }

    /// Issues orders to, or takes them back from, a client.
    ///
    /// All ids share one transaction, each inside its own savepoint, so one
    /// id failing never undoes or blocks the others. Never fails wholesale:
    /// a failed commit reports every id as an error.
    pub fn process_orders(&self, user_id: u64, action: ActionType, order_ids: &[u64]) -> ProcessResult {
        log::info!(
            "ProcessOrders called: user_id={}, action={}, order_ids={:?}",
            user_id,
            action,
            order_ids
        );

        let now = Utc::now();
        let mut result = ProcessResult {
            processed: Vec::with_capacity(order_ids.len()),
            errors: Vec::new(),
        };
        let mut applied: Vec<EventType> = Vec::new();

        let committed = self.repo.with_transaction(|tx| {
            for &id in order_ids {
                let mut event_type = None;
                let outcome = tx.savepoint(&mut |tx: &mut dyn OrderTx| {
                    event_type = Some(apply_action(tx, user_id, action, id, now)?);
                    Ok(())
                });

                match (outcome, event_type) {
                    (Ok(()), Some(event_type)) => {
                        result.processed.push(id);
                        applied.push(event_type);
                    }
                    (Err(e), _) => {
                        self.fail(e, &format!("Cannot {action} order {id}"));
                        result.errors.push(id);
                    }
                    (Ok(()), None) => result.errors.push(id),
                }
            }
            Ok(())
        });

        match committed {
            Ok(()) => {
                for event_type in applied {
                    self.metrics.record_event(event_type);
                }
                for &id in &result.processed {
                    self.invalidate(id);
                }
            }
            Err(e) => {
                self.fail(e, "Transaction error in ProcessOrders");
                result.processed.clear();
                result.errors = order_ids.to_vec();
            }
        }

        log::info!(
            "ProcessOrders result: processed={}, errors={}",
            result.processed.len(),
            result.errors.len()
        );
        result
    }

    /// A user's orders, optionally only those physically at the pickup
    /// point. Returns the page and the filtered count before paging.
    pub fn list_orders(
        &self,
        user_id: u64,
        in_pvz_only: bool,
        last: u32,
        page: u32,
        limit: u32,
    ) -> Result<(Vec<Order>, u32), DomainError> {
        log::info!(
            "ListOrders called: user_id={}, in_pvz_only={}, last_n={}, page={}, limit={}",
            user_id,
            in_pvz_only,
            last,
            page,
            limit
        );

        if limit == 0 {
            return Err(self.fail(
                DomainError::ValidationFailed("limit must be greater than zero".to_string()),
                "Limit must be greater than zero",
            ));
        }

        let filtered: Vec<Order> = self
            .repo
            .list_orders()
            .map_err(|e| self.fail(e, "Failed to list orders"))?
            .into_iter()
            .filter(|o| o.user_id == user_id)
            .filter(|o| !in_pvz_only || o.status.in_pickup_point())
            .collect();

        let total = filtered.len() as u32;
        let filtered = last_n(filtered, last);
        let orders = page_slice(&filtered, page, limit);

        log::info!("ListOrders result: count={}", orders.len());
        Ok((orders, total))
    }

    /// Returned orders across all users. `limit == 0` returns all of them.
    pub fn list_returns(&self, page: u32, limit: u32) -> Result<Vec<Order>, DomainError> {
        log::info!("ListReturns called: page={}, limit={}", page, limit);

        let returned: Vec<Order> = self
            .repo
            .list_orders()
            .map_err(|e| self.fail(e, "Failed to list returns"))?
            .into_iter()
            .filter(|o| o.status == OrderStatus::Returned)
            .collect();

        let returns = if limit == 0 {
            returned
        } else {
            page_slice(&returned, page, limit)
        };

        log::info!("ListReturns result: count={}", returns.len());
        Ok(returns)
    }

    /// Cursor paging over a user's orders by ascending id. The cursor is the
    /// id of the last order returned, 0 once the stream is exhausted.
    pub fn scroll_orders(&self, user_id: u64, last_id: u64, limit: u32) -> Result<(Vec<Order>, u64), DomainError> {
        log::info!(
            "ScrollOrders called: user_id={}, last_id={}, limit={}",
            user_id,
            last_id,
            limit
        );

        let mut user_orders: Vec<Order> = self
            .repo
            .list_orders()
            .map_err(|e| self.fail(e, "Failed to list orders for scrolling"))?
            .into_iter()
            .filter(|o| o.user_id == user_id)
            .collect();
        user_orders.sort_by_key(|o| o.id);

        let (orders, next) = scroll(&user_orders, |o| o.id, last_id, limit as usize);

        log::info!("ScrollOrders result: count={}, next_last_id={}", orders.len(), next);
        Ok((orders, next))
    }

    pub fn get_history(&self, page: u32, count: u32) -> Result<Vec<OrderHistory>, DomainError> {
        log::info!("GetHistory called: page={}, count={}", page, count);
        self.repo
            .get_history(page, count)
            .map_err(|e| self.fail(e, "Failed to read history"))
    }

    /// History of one order. A cold read populates the cache; mutations
    /// only ever delete the entry.
    pub fn get_order_history(&self, order_id: u64) -> Result<Vec<OrderHistory>, DomainError> {
        log::info!("GetOrderHistory called: order_id={}", order_id);

        let key = cache_key(order_id);
        match self.cache.get(&key) {
            Ok(Some(cached)) => match serde_json::from_str::<Vec<OrderHistory>>(&cached) {
                Ok(history) => return Ok(history),
                Err(e) => log::warn!("Discarding unreadable cache entry {}: {}", key, e),
            },
            Ok(None) => {}
            Err(e) => log::warn!("Cache read failed for {}: {}", key, e),
        }

        let history = self
            .repo
            .get_order_history(order_id)
            .map_err(|e| self.fail(e, "Failed to get order history"))?;

        if history.is_empty() {
            return Err(self.fail(DomainError::OrderNotFound, "Order history not found"));
        }

        match serde_json::to_string(&history) {
            Ok(json) => {
                if let Err(e) = self.cache.set(&key, &json, self.cache_ttl) {
                    log::warn!("Cache write failed for {}: {}", key, e);
                }
            }
            Err(e) => log::warn!("Cannot serialize history for cache: {}", e),
        }

        log::info!("GetOrderHistory result: count={}", history.len());
        Ok(history)
    }

    pub fn get_order(&self, order_id: u64) -> Result<Order, DomainError> {
        self.repo
            .get_order(order_id)
            .map_err(|e| self.fail(e, "Failed to get order"))
    }

    /// Accepts every record independently; failures are collected by id in
    /// request order, including records rejected before decoding.
    pub fn import_orders(&self, records: Vec<Result<AcceptOrderInput, RejectedRecord>>) -> ImportResult {
        log::info!("ImportOrders called: count={}", records.len());

        let mut result = ImportResult {
            imported: 0,
            errors: Vec::new(),
        };
        for record in records {
            match record {
                Ok(input) => {
                    let id = input.order_id;
                    match self.accept_order(input) {
                        Ok(_) => result.imported += 1,
                        Err(_) => result.errors.push(id),
                    }
                }
                Err(rejected) => {
                    self.fail(rejected.error, &format!("Skipping import record {}", rejected.order_id));
                    result.errors.push(rejected.order_id);
                }
            }
        }

        log::info!(
            "ImportOrders result: imported={}, errors={}",
            result.imported,
            result.errors.len()
        );
        result
    }

    fn invalidate(&self, order_id: u64) {
        if let Err(e) = self.cache.delete(&cache_key(order_id)) {
            log::warn!("Cache invalidation failed for order {}: {}", order_id, e);
        }
    }

    fn fail(&self, err: DomainError, message: &str) -> DomainError {
        match err {
            DomainError::Internal(_) => log::error!("ERROR: {}: {}: {}", err.code(), message, err),
            _ => log::warn!("ERROR: {}: {}", err.code(), message),
        }
        self.metrics.record_failure(&err);
        err
    }
}

fn cache_key(order_id: u64) -> String {
    order_id.to_string()
}

/// One issue/return step inside the caller's savepoint.
fn apply_action(
    tx: &mut dyn OrderTx,
    user_id: u64,
    action: ActionType,
    id: u64,
    now: DateTime<Utc>,
) -> Result<EventType, DomainError> {
    let mut order = tx.get_order(id)?;
    if order.user_id != user_id {
        return Err(DomainError::OrderNotFound);
    }

    if now > order.expires_at {
        return Err(match action {
            ActionType::Return => DomainError::ReturnTimeExpired,
            _ => DomainError::StorageExpired,
        });
    }

    let (event_type, actor) = match action {
        ActionType::Issue => {
            match order.status {
                OrderStatus::Expects => {}
                OrderStatus::Accepted => return Err(DomainError::OrderAlreadyIssued),
                other => {
                    return Err(DomainError::ValidationFailed(format!(
                        "cannot issue order in status {other}"
                    )))
                }
            }
            order.status = OrderStatus::Accepted;
            order.expires_at = now + return_window();
            (EventType::OrderIssued, Actor::client(user_id))
        }
        ActionType::Return => {
            if order.status != OrderStatus::Accepted {
                return Err(DomainError::ValidationFailed(format!(
                    "cannot take back order in status {}",
                    order.status
                )));
            }
            order.status = OrderStatus::Returned;
            (EventType::OrderReturnedByClient, Actor::client(user_id))
        }
        ActionType::Unspecified => {
            return Err(DomainError::InvalidAction(action.to_string()));
        }
    };

    tx.update_order(&order)?;
    tx.append_history(order.id, order.status)?;
    tx.save_event(&Event::new(event_type, actor, &order, order.status))?;
    Ok(event_type)
}
