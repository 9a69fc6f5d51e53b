use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::order::{Order, OrderHistory};
use crate::schema::{order_history, orders, outbox};

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = orders)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OrderRow {
    pub id: i64,
    pub user_id: i64,
    pub status: String,
    pub expires_at: DateTime<Utc>,
    pub weight: f64,
    pub total_price: BigDecimal,
    pub package_type: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = orders)]
pub struct NewOrderRow {
    pub id: i64,
    pub user_id: i64,
    pub status: String,
    pub expires_at: DateTime<Utc>,
    pub weight: f64,
    pub total_price: BigDecimal,
    pub package_type: String,
}

#[derive(Debug, AsChangeset)]
#[diesel(table_name = orders)]
pub struct OrderChangeset {
    pub user_id: i64,
    pub status: String,
    pub expires_at: DateTime<Utc>,
    pub weight: f64,
    pub total_price: BigDecimal,
    pub package_type: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = order_history)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OrderHistoryRow {
    pub id: i64,
    pub order_id: i64,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = order_history)]
pub struct NewOrderHistoryRow {
    pub order_id: i64,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = outbox)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OutboxEventRow {
    pub id: Uuid,
    pub aggregate_type: String,
    pub aggregate_id: String,
    pub event_type: String,
    pub payload: Value,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = outbox)]
pub struct NewOutboxEventRow {
    pub id: Uuid,
    pub aggregate_type: String,
    pub aggregate_id: String,
    pub event_type: String,
    pub payload: Value,
}

/// Order ids are unsigned in the domain and BIGINT in Postgres.
pub fn to_db_id(id: u64) -> Result<i64, DomainError> {
    i64::try_from(id).map_err(|_| DomainError::InvalidInput(format!("id {id} is out of range")))
}

fn from_db_id(id: i64) -> Result<u64, DomainError> {
    u64::try_from(id).map_err(|_| DomainError::Internal(format!("negative id {id} in storage")))
}

impl TryFrom<OrderRow> for Order {
    type Error = DomainError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        Ok(Order {
            id: from_db_id(row.id)?,
            user_id: from_db_id(row.user_id)?,
            status: row.status.parse()?,
            expires_at: row.expires_at,
            package_type: row
                .package_type
                .parse()
                .map_err(|_| DomainError::Internal(format!("unknown package '{}' in storage", row.package_type)))?,
            weight: row.weight,
            price: row.total_price,
        })
    }
}

impl TryFrom<OrderHistoryRow> for OrderHistory {
    type Error = DomainError;

    fn try_from(row: OrderHistoryRow) -> Result<Self, Self::Error> {
        Ok(OrderHistory {
            id: row.id,
            order_id: from_db_id(row.order_id)?,
            status: row.status.parse()?,
            created_at: row.created_at,
        })
    }
}

impl TryFrom<&Order> for NewOrderRow {
    type Error = DomainError;

    fn try_from(order: &Order) -> Result<Self, Self::Error> {
        Ok(NewOrderRow {
            id: to_db_id(order.id)?,
            user_id: to_db_id(order.user_id)?,
            status: order.status.as_str().to_string(),
            expires_at: order.expires_at,
            weight: order.weight,
            total_price: order.price.clone(),
            package_type: order.package_type.as_str().to_string(),
        })
    }
}

impl TryFrom<&Order> for OrderChangeset {
    type Error = DomainError;

    fn try_from(order: &Order) -> Result<Self, Self::Error> {
        Ok(OrderChangeset {
            user_id: to_db_id(order.user_id)?,
            status: order.status.as_str().to_string(),
            expires_at: order.expires_at,
            weight: order.weight,
            total_price: order.price.clone(),
            package_type: order.package_type.as_str().to_string(),
            updated_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::{OrderStatus, PackageType};

    fn row(status: &str, package_type: &str) -> OrderRow {
        OrderRow {
            id: 3,
            user_id: 9,
            status: status.to_string(),
            expires_at: Utc::now(),
            weight: 2.5,
            total_price: BigDecimal::from(26),
            package_type: package_type.to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn row_converts_to_domain_order() {
        let order = Order::try_from(row("ACCEPTED", "bag+tape")).unwrap();
        assert_eq!(order.id, 3);
        assert_eq!(order.status, OrderStatus::Accepted);
        assert_eq!(order.package_type, PackageType::BagTape);
        assert_eq!(order.price, BigDecimal::from(26));
    }

    #[test]
    fn corrupt_row_is_internal_error() {
        let err = Order::try_from(row("LOST", "bag")).unwrap_err();
        assert_eq!(err.code(), "INTERNAL_ERROR");
        let err = Order::try_from(row("EXPECTS", "sack")).unwrap_err();
        assert_eq!(err.code(), "INTERNAL_ERROR");
    }

    #[test]
    fn oversized_id_is_rejected() {
        assert!(to_db_id(u64::MAX).is_err());
        assert_eq!(to_db_id(42).unwrap(), 42);
    }
}
