pub mod application;
pub mod config;
pub mod db;
pub mod domain;
pub mod errors;
pub mod handlers;
pub mod infrastructure;
pub mod observability;
pub mod schema;

use actix_web::{middleware::Logger, web, App, HttpServer};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use application::order_service::OrderService;
use domain::errors::DomainError;
use domain::ports::OrderRepository;
use handlers::orders;

pub use db::{create_pool, DbPool};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

#[derive(OpenApi)]
#[openapi(
    paths(
        orders::accept_order,
        orders::import_orders,
        orders::get_order,
        orders::return_order,
        orders::process_orders,
        orders::list_orders,
        orders::scroll_orders,
        orders::list_returns,
        orders::get_history,
        orders::get_order_history,
    ),
    components(schemas(
        orders::AcceptOrderRequest,
        orders::OrderResponse,
        orders::StatusResponse,
        orders::ProcessOrdersRequest,
        orders::ProcessOrdersResponse,
        orders::ImportOrdersRequest,
        orders::ImportOrdersResponse,
        orders::ListOrdersResponse,
        orders::ScrollResponse,
        orders::ReturnsResponse,
        orders::HistoryEntryResponse,
        orders::HistoryResponse,
    )),
    tags(
        (name = "orders", description = "Pickup point order lifecycle"),
        (name = "history", description = "Order status history"),
    )
)]
pub struct ApiDoc;

/// Run any pending Diesel migrations against the pool's database.
pub fn run_migrations(pool: &DbPool) -> Result<(), DomainError> {
    let mut conn = pool.get()?;
    conn.run_pending_migrations(MIGRATIONS)
        .map_err(|e| DomainError::Internal(format!("failed to run migrations: {e}")))?;
    Ok(())
}

/// Registers every order route. `/orders/scroll` and the POST sub-paths are
/// listed before `/orders/{id}` so they are not captured as ids.
pub fn configure<R: OrderRepository>(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/orders")
            .route("", web::post().to(orders::accept_order::<R>))
            .route("", web::get().to(orders::list_orders::<R>))
            .route("/import", web::post().to(orders::import_orders::<R>))
            .route("/process", web::post().to(orders::process_orders::<R>))
            .route("/scroll", web::get().to(orders::scroll_orders::<R>))
            .route("/{id}", web::get().to(orders::get_order::<R>))
            .route("/{id}", web::delete().to(orders::return_order::<R>))
            .route("/{id}/history", web::get().to(orders::get_order_history::<R>)),
    )
    .route("/returns", web::get().to(orders::list_returns::<R>))
    .route("/history", web::get().to(orders::get_history::<R>))
    .route("/metrics", web::get().to(orders::metrics::<R>));
}

/// Build and return an actix-web `Server` bound to `host:port`.
///
/// The caller is responsible for `.await`-ing (or `tokio::spawn`-ing) the
/// returned server.
pub fn build_server<R: OrderRepository>(
    service: web::Data<OrderService<R>>,
    host: &str,
    port: u16,
) -> std::io::Result<actix_web::dev::Server> {
    let openapi = ApiDoc::openapi();
    Ok(HttpServer::new(move || {
        App::new()
            .app_data(service.clone())
            .wrap(Logger::default())
            .configure(configure::<R>)
            .service(SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", openapi.clone()))
    })
    .bind((host.to_string(), port))?
    .run())
}
