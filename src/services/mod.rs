pub mod cache_service;
pub mod collection_service;
pub mod event_service;
pub mod filter_service;
pub mod import_service;
pub mod lifecycle_service;
pub mod listing_service;
pub mod local_collection_service;
