use std::io;
use std::sync::Arc;

use actix_web::web;
use pvz_service::application::order_service::OrderService;
use pvz_service::config::Config;
use pvz_service::domain::ports::HistoryCache;
use pvz_service::infrastructure::cache::{create_redis_pool, InMemoryHistoryCache, RedisHistoryCache};
use pvz_service::infrastructure::order_repo::DieselOrderRepository;
use pvz_service::observability::Metrics;
use pvz_service::{build_server, create_pool, run_migrations};

#[actix_web::main]
async fn main() -> io::Result<()> {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = Config::from_env().map_err(io::Error::other)?;

    let pool = create_pool(&config.database_url, config.db_pool_size).map_err(io::Error::other)?;
    run_migrations(&pool).map_err(io::Error::other)?;

    let cache: Arc<dyn HistoryCache> = match &config.redis_url {
        Some(url) => {
            log::info!("Using redis history cache");
            Arc::new(RedisHistoryCache::new(create_redis_pool(url).map_err(io::Error::other)?))
        }
        None => {
            log::info!("REDIS_URL not set, using in-process history cache");
            Arc::new(InMemoryHistoryCache::new())
        }
    };

    let service = OrderService::new(
        DieselOrderRepository::new(pool),
        cache,
        config.cache_ttl,
        Metrics::new(),
    );

    log::info!("Starting server at http://{}:{}", config.host, config.port);

    build_server(web::Data::new(service), &config.host, config.port)?.await
}
