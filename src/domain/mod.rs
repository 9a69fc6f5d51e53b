pub mod errors;
pub mod event;
pub mod order;
pub mod pagination;
pub mod ports;
