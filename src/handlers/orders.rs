use std::str::FromStr;

use actix_web::{web, HttpResponse};
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::{IntoParams, ToSchema};

use crate::application::order_service::OrderService;
use crate::domain::errors::DomainError;
use crate::domain::order::{AcceptOrderInput, ActionType, Order, OrderHistory, RejectedRecord};
use crate::domain::ports::OrderRepository;
use crate::errors::AppError;

// ── Request / response DTOs ──────────────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
pub struct AcceptOrderRequest {
    pub order_id: u64,
    pub user_id: u64,
    /// Weight in kilograms.
    pub weight: f64,
    /// Decimal base price as a string to avoid floating-point issues, e.g. "99.90"
    pub price: String,
    /// Pickup deadline, must be in the future.
    pub expires_at: DateTime<Utc>,
    /// One of none, bag, box, tape, bag+tape, box+tape. Defaults to none.
    #[serde(default)]
    pub package: String,
}

impl AcceptOrderRequest {
    fn into_input(self) -> Result<AcceptOrderInput, DomainError> {
        let price = BigDecimal::from_str(&self.price)
            .map_err(|e| DomainError::InvalidInput(format!("Invalid price '{}': {}", self.price, e)))?;
        Ok(AcceptOrderInput {
            order_id: self.order_id,
            user_id: self.user_id,
            weight: self.weight,
            price,
            expires_at: self.expires_at,
            package: self.package,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderResponse {
    pub order_id: u64,
    pub user_id: u64,
    pub status: String,
    pub expires_at: String,
    pub package: String,
    pub weight: f64,
    pub total_price: String,
}

impl From<Order> for OrderResponse {
    fn from(o: Order) -> Self {
        Self {
            order_id: o.id,
            user_id: o.user_id,
            status: o.status.to_string(),
            expires_at: o.expires_at.to_rfc3339(),
            package: o.package_type.to_string(),
            weight: o.weight,
            total_price: o.price.to_string(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StatusResponse {
    pub order_id: u64,
    pub status: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ProcessOrdersRequest {
    pub user_id: u64,
    /// issue or return
    pub action: String,
    pub order_ids: Vec<u64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProcessOrdersResponse {
    pub processed: Vec<u64>,
    pub errors: Vec<u64>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ImportOrdersRequest {
    /// Decoded one by one so a malformed record fails alone.
    #[schema(value_type = Vec<AcceptOrderRequest>)]
    pub orders: Vec<Value>,
}

fn decode_import_record(record: Value) -> Result<AcceptOrderInput, RejectedRecord> {
    let order_id = record.get("order_id").and_then(Value::as_u64).unwrap_or(0);
    serde_json::from_value::<AcceptOrderRequest>(record)
        .map_err(|e| DomainError::InvalidInput(format!("malformed record: {e}")))
        .and_then(AcceptOrderRequest::into_input)
        .map_err(|error| RejectedRecord { order_id, error })
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ImportOrdersResponse {
    pub imported: u32,
    pub errors: Vec<u64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HistoryEntryResponse {
    pub id: i64,
    pub order_id: u64,
    pub status: String,
    pub created_at: String,
}

impl From<OrderHistory> for HistoryEntryResponse {
    fn from(h: OrderHistory) -> Self {
        Self {
            id: h.id,
            order_id: h.order_id,
            status: h.status.to_string(),
            created_at: h.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HistoryResponse {
    pub history: Vec<HistoryEntryResponse>,
}

// ── Pagination ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListOrdersParams {
    pub user_id: u64,
    /// Only orders physically at the pickup point.
    #[serde(default)]
    pub in_pvz_only: bool,
    /// Keep only the last N matching orders before paging. 0 keeps all.
    #[serde(default)]
    pub last_n: u32,
    /// Page number (0-based).
    #[serde(default)]
    pub page: u32,
    /// Items per page. Defaults to 20; 0 is rejected.
    #[serde(default = "default_limit")]
    pub limit: u32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ListOrdersResponse {
    pub orders: Vec<OrderResponse>,
    pub total: u32,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ScrollParams {
    pub user_id: u64,
    /// Id of the last order already seen, 0 to start.
    #[serde(default)]
    pub last_id: u64,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ScrollResponse {
    pub orders: Vec<OrderResponse>,
    /// Cursor for the next call, 0 at the end of the stream.
    pub next_last_id: u64,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ReturnsParams {
    #[serde(default)]
    pub page: u32,
    /// Items per page. 0 returns every returned order.
    #[serde(default)]
    pub limit: u32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReturnsResponse {
    pub returns: Vec<OrderResponse>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct HistoryParams {
    #[serde(default)]
    pub page: u32,
    /// Entries per page. 0 uses the server cap of 50.
    #[serde(default)]
    pub count: u32,
}

fn default_limit() -> u32 {
    20
}

fn to_responses(orders: Vec<Order>) -> Vec<OrderResponse> {
    orders.into_iter().map(OrderResponse::from).collect()
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// POST /orders
///
/// Accepts a parcel from a courier. The order, its first history row and an
/// outbox event are written in one database transaction.
#[utoipa::path(
    post,
    path = "/orders",
    request_body = AcceptOrderRequest,
    responses(
        (status = 201, description = "Order accepted", body = OrderResponse),
        (status = 400, description = "Validation, package or weight error"),
        (status = 409, description = "Order already exists"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "orders"
)]
pub async fn accept_order<R: OrderRepository>(
    service: web::Data<OrderService<R>>,
    body: web::Json<AcceptOrderRequest>,
) -> Result<HttpResponse, AppError> {
    let input = body.into_inner().into_input()?;

    let order = web::block(move || service.accept_order(input)).await??;

    Ok(HttpResponse::Created().json(OrderResponse::from(order)))
}

/// POST /orders/import
///
/// Accepts a batch of parcels; each record succeeds or fails on its own,
/// including records that do not decode.
#[utoipa::path(
    post,
    path = "/orders/import",
    request_body = ImportOrdersRequest,
    responses(
        (status = 200, description = "Import finished", body = ImportOrdersResponse),
    ),
    tag = "orders"
)]
pub async fn import_orders<R: OrderRepository>(
    service: web::Data<OrderService<R>>,
    body: web::Json<ImportOrdersRequest>,
) -> Result<HttpResponse, AppError> {
    let records: Vec<_> = body
        .into_inner()
        .orders
        .into_iter()
        .map(decode_import_record)
        .collect();

    let result = web::block(move || service.import_orders(records)).await?;

    Ok(HttpResponse::Ok().json(ImportOrdersResponse {
        imported: result.imported,
        errors: result.errors,
    }))
}

/// GET /orders/{id}
#[utoipa::path(
    get,
    path = "/orders/{id}",
    params(
        ("id" = u64, Path, description = "Order id"),
    ),
    responses(
        (status = 200, description = "Order found", body = OrderResponse),
        (status = 404, description = "Order not found"),
    ),
    tag = "orders"
)]
pub async fn get_order<R: OrderRepository>(
    service: web::Data<OrderService<R>>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let order_id = path.into_inner();

    let order = web::block(move || service.get_order(order_id)).await??;

    Ok(HttpResponse::Ok().json(OrderResponse::from(order)))
}

/// DELETE /orders/{id}
///
/// Hands an order back to the courier and deletes it.
#[utoipa::path(
    delete,
    path = "/orders/{id}",
    params(
        ("id" = u64, Path, description = "Order id"),
    ),
    responses(
        (status = 200, description = "Order returned to courier", body = StatusResponse),
        (status = 404, description = "Order not found"),
        (status = 422, description = "Order is with the client or its storage time has not expired"),
    ),
    tag = "orders"
)]
pub async fn return_order<R: OrderRepository>(
    service: web::Data<OrderService<R>>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let order_id = path.into_inner();

    let change = web::block(move || service.return_order(order_id)).await??;

    Ok(HttpResponse::Ok().json(StatusResponse {
        order_id: change.order_id,
        status: change.status.to_string(),
    }))
}

/// POST /orders/process
///
/// Issues orders to a client or takes them back. Per-id outcomes, never a
/// wholesale failure.
#[utoipa::path(
    post,
    path = "/orders/process",
    request_body = ProcessOrdersRequest,
    responses(
        (status = 200, description = "Per-order outcome", body = ProcessOrdersResponse),
    ),
    tag = "orders"
)]
pub async fn process_orders<R: OrderRepository>(
    service: web::Data<OrderService<R>>,
    body: web::Json<ProcessOrdersRequest>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();
    let action = ActionType::parse(&body.action);

    let result = web::block(move || service.process_orders(body.user_id, action, &body.order_ids)).await?;

    Ok(HttpResponse::Ok().json(ProcessOrdersResponse {
        processed: result.processed,
        errors: result.errors,
    }))
}

/// GET /orders
#[utoipa::path(
    get,
    path = "/orders",
    params(ListOrdersParams),
    responses(
        (status = 200, description = "Page of a user's orders", body = ListOrdersResponse),
        (status = 400, description = "limit is zero"),
    ),
    tag = "orders"
)]
pub async fn list_orders<R: OrderRepository>(
    service: web::Data<OrderService<R>>,
    query: web::Query<ListOrdersParams>,
) -> Result<HttpResponse, AppError> {
    let p = query.into_inner();

    let (orders, total) = web::block(move || {
        service.list_orders(p.user_id, p.in_pvz_only, p.last_n, p.page, p.limit)
    })
    .await??;

    Ok(HttpResponse::Ok().json(ListOrdersResponse {
        orders: to_responses(orders),
        total,
    }))
}

/// GET /orders/scroll
#[utoipa::path(
    get,
    path = "/orders/scroll",
    params(ScrollParams),
    responses(
        (status = 200, description = "Next slice of a user's orders", body = ScrollResponse),
    ),
    tag = "orders"
)]
pub async fn scroll_orders<R: OrderRepository>(
    service: web::Data<OrderService<R>>,
    query: web::Query<ScrollParams>,
) -> Result<HttpResponse, AppError> {
    let p = query.into_inner();

    let (orders, next_last_id) =
        web::block(move || service.scroll_orders(p.user_id, p.last_id, p.limit)).await??;

    Ok(HttpResponse::Ok().json(ScrollResponse {
        orders: to_responses(orders),
        next_last_id,
    }))
}

/// GET /returns
#[utoipa::path(
    get,
    path = "/returns",
    params(ReturnsParams),
    responses(
        (status = 200, description = "Orders returned by clients", body = ReturnsResponse),
    ),
    tag = "orders"
)]
pub async fn list_returns<R: OrderRepository>(
    service: web::Data<OrderService<R>>,
    query: web::Query<ReturnsParams>,
) -> Result<HttpResponse, AppError> {
    let p = query.into_inner();

    let returns = web::block(move || service.list_returns(p.page, p.limit)).await??;

    Ok(HttpResponse::Ok().json(ReturnsResponse {
        returns: to_responses(returns),
    }))
}

/// GET /history
#[utoipa::path(
    get,
    path = "/history",
    params(HistoryParams),
    responses(
        (status = 200, description = "Status changes, newest first", body = HistoryResponse),
    ),
    tag = "history"
)]
pub async fn get_history<R: OrderRepository>(
    service: web::Data<OrderService<R>>,
    query: web::Query<HistoryParams>,
) -> Result<HttpResponse, AppError> {
    let p = query.into_inner();

    let history = web::block(move || service.get_history(p.page, p.count)).await??;

    Ok(HttpResponse::Ok().json(HistoryResponse {
        history: history.into_iter().map(HistoryEntryResponse::from).collect(),
    }))
}

/// GET /orders/{id}/history
#[utoipa::path(
    get,
    path = "/orders/{id}/history",
    params(
        ("id" = u64, Path, description = "Order id"),
    ),
    responses(
        (status = 200, description = "Status changes of one order", body = HistoryResponse),
        (status = 404, description = "No history for this order"),
    ),
    tag = "history"
)]
pub async fn get_order_history<R: OrderRepository>(
    service: web::Data<OrderService<R>>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let order_id = path.into_inner();

    let history = web::block(move || service.get_order_history(order_id)).await??;

    Ok(HttpResponse::Ok().json(HistoryResponse {
        history: history.into_iter().map(HistoryEntryResponse::from).collect(),
    }))
}

/// GET /metrics
pub async fn metrics<R: OrderRepository>(
    service: web::Data<OrderService<R>>,
) -> Result<HttpResponse, AppError> {
    let body = service.metrics().encode().map_err(AppError::Internal)?;
    Ok(HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(body))
}
