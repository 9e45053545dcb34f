pub mod listing_store;
pub mod memory_store;
pub mod pool;
