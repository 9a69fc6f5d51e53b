use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::order::{Order, OrderStatus};

/// Value of `source` on every event this service emits.
pub const EVENT_SOURCE: &str = "pvz-api";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    OrderAccepted,
    OrderIssued,
    OrderReturnedByClient,
    OrderReturnedToCourier,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::OrderAccepted => "order_accepted",
            EventType::OrderIssued => "order_issued",
            EventType::OrderReturnedByClient => "order_returned_by_client",
            EventType::OrderReturnedToCourier => "order_returned_to_courier",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Actor {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: u64,
}

impl Actor {
    pub fn courier(id: u64) -> Self {
        Self {
            kind: "courier".to_string(),
            id,
        }
    }

    pub fn client(id: u64) -> Self {
        Self {
            kind: "client".to_string(),
            id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventOrder {
    pub id: u64,
    pub user_id: u64,
    pub status: OrderStatus,
}

/// Outbox payload. Written in the same transaction as the order change it
/// describes and drained by an external relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub event_id: Uuid,
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
    pub actor: Actor,
    pub order: EventOrder,
    pub source: String,
}

impl Event {
    pub fn new(event_type: EventType, actor: Actor, order: &Order, status: OrderStatus) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            event_type,
            timestamp: Utc::now(),
            actor,
            order: EventOrder {
                id: order.id,
                user_id: order.user_id,
                status,
            },
            source: EVENT_SOURCE.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::PackageType;
    use bigdecimal::BigDecimal;

    #[test]
    fn payload_uses_wire_names() {
        let order = Order {
            id: 7,
            user_id: 42,
            status: OrderStatus::Expects,
            expires_at: Utc::now(),
            package_type: PackageType::Bag,
            weight: 1.0,
            price: BigDecimal::from(5),
        };
        let event = Event::new(
            EventType::OrderReturnedToCourier,
            Actor::courier(42),
            &order,
            OrderStatus::Deleted,
        );

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event_type"], "order_returned_to_courier");
        assert_eq!(json["actor"]["type"], "courier");
        assert_eq!(json["order"]["id"], 7);
        assert_eq!(json["order"]["status"], "DELETED");
        assert_eq!(json["source"], EVENT_SOURCE);
    }
}
