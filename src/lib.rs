pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tracing::info;

use crate::config::{Config, DataSource};
use crate::database::{
    listing_store::{ListingStore, PgListingStore},
    memory_store::MemoryListingStore,
    pool::{create_pool, run_migrations},
};
use crate::error::{Error, Result};
use crate::services::{
    cache_service::{CacheSlot, FileCacheSlot},
    collection_service::Collections,
    event_service::{EventSink, HttpEventSink, TracingEventSink},
    listing_service::{ListingService, ListingSettings},
    local_collection_service::LocalCollection,
};

#[derive(Clone)]
pub struct AppState {
    pub collections: Collections,
    pub settings: ListingSettings,
}

impl AppState {
    /// Wires the collections from already-built parts. Kinds listed in
    /// `local_kinds` get a file-backed collection under `local_dir`.
    pub fn new(
        store: Arc<dyn ListingStore>,
        cache: Arc<dyn CacheSlot>,
        events: Arc<dyn EventSink>,
        settings: ListingSettings,
        local_kinds: &[models::listing::ListingKind],
        local_dir: &std::path::Path,
    ) -> Self {
        let remote = Arc::new(ListingService::new(store, cache, events.clone(), settings));
        let locals = local_kinds
            .iter()
            .map(|kind| Arc::new(LocalCollection::new(*kind, local_dir, events.clone(), settings)))
            .collect();
        Self {
            collections: Collections::new(remote, locals),
            settings,
        }
    }

    pub async fn from_config(config: &Config) -> Result<Self> {
        let settings = ListingSettings::from_config(config);

        let store: Arc<dyn ListingStore> = match config.data_source {
            DataSource::Postgres => {
                let url = config.database_url.as_deref().ok_or_else(|| {
                    Error::Config("DATABASE_URL is required when DATA_SOURCE=postgres".to_string())
                })?;
                let pool = create_pool(url, settings.remote_timeout).await?;
                run_migrations(&pool).await?;
                info!("Using Postgres listing store");
                Arc::new(PgListingStore::new(pool))
            }
            DataSource::Memory => {
                info!("Using in-memory listing store; data is lost on restart");
                Arc::new(MemoryListingStore::new())
            }
        };

        let events: Arc<dyn EventSink> = match &config.analytics_endpoint {
            Some(endpoint) => {
                let client = Client::builder()
                    .timeout(Duration::from_secs(10))
                    .build()
                    .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;
                Arc::new(HttpEventSink::new(client, endpoint.clone()))
            }
            None => Arc::new(TracingEventSink),
        };

        Ok(Self::new(
            store,
            Arc::new(FileCacheSlot::new(&config.cache_dir)),
            events,
            settings,
            &config.local_only_kinds,
            &config.local_store_dir,
        ))
    }
}
