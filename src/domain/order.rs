use std::fmt;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::errors::DomainError;

/// How long a client may bring an issued order back.
pub const RETURN_WINDOW_HOURS: i64 = 48;

pub fn return_window() -> Duration {
    Duration::hours(RETURN_WINDOW_HOURS)
}

/// Prices are stored as `NUMERIC(12, 2)`.
pub const PRICE_SCALE: i64 = 2;
const PRICE_INTEGER_DIGITS: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Delivered by the courier, waiting at the pickup point.
    Expects,
    /// Handed over to the client.
    Accepted,
    /// Brought back by the client.
    Returned,
    /// Handed back to the courier. Never stored on an order row.
    Deleted,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Expects => "EXPECTS",
            OrderStatus::Accepted => "ACCEPTED",
            OrderStatus::Returned => "RETURNED",
            OrderStatus::Deleted => "DELETED",
        }
    }

    /// Physically present at the pickup point.
    pub fn in_pickup_point(&self) -> bool {
        matches!(self, OrderStatus::Expects | OrderStatus::Returned)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "EXPECTS" => Ok(OrderStatus::Expects),
            "ACCEPTED" => Ok(OrderStatus::Accepted),
            "RETURNED" => Ok(OrderStatus::Returned),
            "DELETED" => Ok(OrderStatus::Deleted),
            other => Err(DomainError::Internal(format!("unknown order status '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PackageType {
    #[serde(rename = "none")]
    Unspecified,
    #[serde(rename = "bag")]
    Bag,
    #[serde(rename = "box")]
    Box,
    #[serde(rename = "tape")]
    Tape,
    #[serde(rename = "bag+tape")]
    BagTape,
    #[serde(rename = "box+tape")]
    BoxTape,
}

impl PackageType {
    pub const ALL: [PackageType; 6] = [
        PackageType::Unspecified,
        PackageType::Bag,
        PackageType::Box,
        PackageType::Tape,
        PackageType::BagTape,
        PackageType::BoxTape,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PackageType::Unspecified => "none",
            PackageType::Bag => "bag",
            PackageType::Box => "box",
            PackageType::Tape => "tape",
            PackageType::BagTape => "bag+tape",
            PackageType::BoxTape => "box+tape",
        }
    }

    /// Fixed amount added to the base price.
    pub fn surcharge(&self) -> BigDecimal {
        let amount = match self {
            PackageType::Unspecified => 0,
            PackageType::Bag => 5,
            PackageType::Box => 20,
            PackageType::Tape => 1,
            PackageType::BagTape => 6,
            PackageType::BoxTape => 21,
        };
        BigDecimal::from(amount)
    }

    /// Exclusive weight ceiling in kilograms, `None` when unbounded.
    pub fn weight_limit(&self) -> Option<f64> {
        match self {
            PackageType::Unspecified | PackageType::Tape => None,
            PackageType::Bag | PackageType::BagTape => Some(10.0),
            PackageType::Box | PackageType::BoxTape => Some(30.0),
        }
    }
}

impl fmt::Display for PackageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PackageType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "none" | "unspecified" => Ok(PackageType::Unspecified),
            "bag" => Ok(PackageType::Bag),
            "box" => Ok(PackageType::Box),
            "tape" => Ok(PackageType::Tape),
            "bag+tape" => Ok(PackageType::BagTape),
            "box+tape" => Ok(PackageType::BoxTape),
            other => Err(DomainError::InvalidPackage(other.to_string())),
        }
    }
}

/// Membership test against the six known package names.
pub fn is_valid_package(raw: &str) -> bool {
    raw.parse::<PackageType>().is_ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionType {
    Unspecified,
    Issue,
    Return,
}

impl ActionType {
    /// Unknown input maps to `Unspecified`, which every order then rejects.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "issue" => ActionType::Issue,
            "return" => ActionType::Return,
            _ => ActionType::Unspecified,
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ActionType::Issue => "issue",
            ActionType::Return => "return",
            ActionType::Unspecified => "unspecified",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: u64,
    pub user_id: u64,
    pub status: OrderStatus,
    /// Pickup deadline while stored, return deadline once issued.
    pub expires_at: DateTime<Utc>,
    pub package_type: PackageType,
    pub weight: f64,
    pub price: BigDecimal,
}

impl Order {
    /// Checks the weight against the package ceiling. The ceiling itself is
    /// already too heavy.
    pub fn validate_weight(&self) -> Result<(), DomainError> {
        match self.package_type.weight_limit() {
            Some(limit) if self.weight >= limit => Err(DomainError::WeightTooHeavy),
            _ => Ok(()),
        }
    }

    /// Adds the package surcharge. Must run exactly once per accepted order.
    pub fn calculate_total_price(&mut self) {
        self.price += self.package_type.surcharge();
    }

    /// The total must be representable in storage without rounding: at most
    /// two fractional digits and ten integer digits, never negative.
    pub fn validate_price(&self) -> Result<(), DomainError> {
        if self.price < BigDecimal::from(0) {
            return Err(DomainError::InvalidInput(format!("price {} is negative", self.price)));
        }
        if self.price.with_scale(PRICE_SCALE) != self.price {
            return Err(DomainError::InvalidInput(format!(
                "price {} has more than {PRICE_SCALE} fractional digits",
                self.price
            )));
        }
        if self.price >= BigDecimal::from(10u64.pow(PRICE_INTEGER_DIGITS)) {
            return Err(DomainError::InvalidInput(format!("price {} is too large", self.price)));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderHistory {
    pub id: i64,
    pub order_id: u64,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessResult {
    pub processed: Vec<u64>,
    pub errors: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportResult {
    pub imported: u32,
    pub errors: Vec<u64>,
}

/// Accept-shaped input shared by AcceptOrder and ImportOrders. The package
/// name stays raw so the service validates it after the deadline check.
#[derive(Debug, Clone)]
pub struct AcceptOrderInput {
    pub order_id: u64,
    pub user_id: u64,
    pub weight: f64,
    pub price: BigDecimal,
    pub expires_at: DateTime<Utc>,
    pub package: String,
}

/// An import record that never became an [`AcceptOrderInput`], kept so the
/// import reports it in request order. `order_id` is 0 when unreadable.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedRecord {
    pub order_id: u64,
    pub error: DomainError,
}

/// Outcome of a status-changing call that returns only id and status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    pub order_id: u64,
    pub status: OrderStatus,
}
