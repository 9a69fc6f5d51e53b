pub mod cache;
pub mod memory_repo;
pub mod models;
pub mod order_repo;
