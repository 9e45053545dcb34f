use std::sync::Arc;

use serde_json::Value as JsonValue;
use tokio_util::sync::CancellationToken;

use crate::dto::listing_dto::{ListingInput, UpdateListingPayload};
use crate::error::{Error, Result};
use crate::models::listing::{Counter, Counters, Listing, ListingKind};
use crate::services::filter_service::Facets;
use crate::services::import_service::{BulkCreateReport, ImportMode, ImportReport};
use crate::services::lifecycle_service::CleanupSummary;
use crate::services::listing_service::{ListRequest, ListingPage, ListingService};
use crate::services::local_collection_service::LocalCollection;

/// Where one kind of listing is persisted.
#[derive(Clone)]
pub enum ListingCollection {
    Remote(Arc<ListingService>),
    Local(Arc<LocalCollection>),
}

impl ListingCollection {
    pub fn is_local(&self) -> bool {
        matches!(self, ListingCollection::Local(_))
    }

    pub async fn list(
        &self,
        kind: ListingKind,
        request: &ListRequest,
        cancel: &CancellationToken,
    ) -> Result<ListingPage> {
        match self {
            ListingCollection::Remote(svc) => svc.list(kind, request, cancel).await,
            ListingCollection::Local(local) => local.list(request).await,
        }
    }

    pub async fn facets(&self, kind: ListingKind, cancel: &CancellationToken) -> Result<Facets> {
        match self {
            ListingCollection::Remote(svc) => svc.facets(kind, cancel).await,
            ListingCollection::Local(local) => local.facets().await,
        }
    }

    pub async fn create(
        &self,
        kind: ListingKind,
        input: ListingInput,
        cancel: &CancellationToken,
    ) -> Result<Listing> {
        match self {
            ListingCollection::Remote(svc) => svc.create(kind, input, cancel).await,
            ListingCollection::Local(local) => local.add(input).await,
        }
    }

    pub async fn bulk_create(
        &self,
        kind: ListingKind,
        raw: &str,
        cancel: &CancellationToken,
    ) -> Result<BulkCreateReport> {
        match self {
            ListingCollection::Remote(svc) => svc.bulk_create(kind, raw, cancel).await,
            ListingCollection::Local(local) => local.add_many(raw).await,
        }
    }

    pub async fn import(
        &self,
        kind: ListingKind,
        raw: &str,
        mode: ImportMode,
        cancel: &CancellationToken,
    ) -> Result<ImportReport> {
        match self {
            ListingCollection::Remote(svc) => svc.import(kind, raw, mode, cancel).await,
            ListingCollection::Local(local) => local.import(raw, mode).await,
        }
    }

    pub async fn export(&self, kind: ListingKind, cancel: &CancellationToken) -> Result<JsonValue> {
        match self {
            ListingCollection::Remote(svc) => svc.export(kind, cancel).await,
            ListingCollection::Local(local) => local.export().await,
        }
    }

    pub async fn cleanup(
        &self,
        kind: ListingKind,
        cancel: &CancellationToken,
    ) -> Result<CleanupSummary> {
        match self {
            ListingCollection::Remote(svc) => svc.cleanup(kind, cancel).await,
            ListingCollection::Local(local) => local.cleanup().await,
        }
    }

    pub async fn admin_overview(
        &self,
        kind: ListingKind,
        cancel: &CancellationToken,
    ) -> Result<(CleanupSummary, Vec<Listing>)> {
        match self {
            ListingCollection::Remote(svc) => svc.admin_overview(kind, cancel).await,
            ListingCollection::Local(local) => local.admin_overview().await,
        }
    }

    /// Remote: deactivate everything. Local: remove everything.
    pub async fn clear(&self, kind: ListingKind, cancel: &CancellationToken) -> Result<u64> {
        match self {
            ListingCollection::Remote(svc) => svc.clear(kind, cancel).await,
            ListingCollection::Local(local) => local.clear().await,
        }
    }

    pub async fn purge_inactive(&self, kind: ListingKind, cancel: &CancellationToken) -> Result<u64> {
        match self {
            ListingCollection::Remote(svc) => svc.purge_inactive(kind, cancel).await,
            ListingCollection::Local(local) => local.purge_inactive().await,
        }
    }

    pub async fn get_for_view(&self, id: &str, cancel: &CancellationToken) -> Result<Listing> {
        match self {
            ListingCollection::Remote(svc) => svc.get_for_view(id, cancel).await,
            ListingCollection::Local(local) => local.get_for_view(id).await,
        }
    }

    pub async fn get_for_edit(&self, id: &str, cancel: &CancellationToken) -> Result<Listing> {
        match self {
            ListingCollection::Remote(svc) => svc.get_for_edit(id, cancel).await,
            ListingCollection::Local(local) => local.get(id).await,
        }
    }

    pub async fn update(
        &self,
        id: &str,
        patch: UpdateListingPayload,
        cancel: &CancellationToken,
    ) -> Result<Listing> {
        match self {
            ListingCollection::Remote(svc) => svc.update(id, patch, cancel).await,
            ListingCollection::Local(local) => local.update(id, patch).await,
        }
    }

    /// Returns `true` when the record was only flagged inactive.
    pub async fn delete(&self, id: &str, cancel: &CancellationToken) -> Result<bool> {
        match self {
            ListingCollection::Remote(svc) => svc.soft_delete(id, cancel).await.map(|_| true),
            ListingCollection::Local(local) => local.remove(id).await.map(|_| false),
        }
    }

    pub async fn record_interaction(
        &self,
        id: &str,
        counter: Counter,
        cancel: &CancellationToken,
    ) -> Result<Counters> {
        match self {
            ListingCollection::Remote(svc) => svc.record_interaction(id, counter, cancel).await,
            ListingCollection::Local(local) => local.record_interaction(id, counter).await,
        }
    }
}

/// One collection per listing kind.
#[derive(Clone)]
pub struct Collections {
    by_kind: [ListingCollection; 3],
    remote: Arc<ListingService>,
}

impl Collections {
    /// Routes every kind to `remote` except those backed by a local collection.
    pub fn new(remote: Arc<ListingService>, locals: Vec<Arc<LocalCollection>>) -> Self {
        let by_kind = ListingKind::ALL.map(|kind| {
            locals
                .iter()
                .find(|local| local.kind() == kind)
                .map(|local| ListingCollection::Local(local.clone()))
                .unwrap_or_else(|| ListingCollection::Remote(remote.clone()))
        });
        Self { by_kind, remote }
    }

    pub fn remote(&self) -> &ListingService {
        &self.remote
    }

    pub fn get(&self, kind: ListingKind) -> &ListingCollection {
        &self.by_kind[kind.index()]
    }

    /// Collection holding the record with this id. Ids without a known
    /// kind prefix (records imported from older tools) live remotely.
    pub fn for_id(&self, id: &str) -> Result<ListingCollection> {
        if id.trim().is_empty() {
            return Err(Error::BadRequest("listing id must not be empty".to_string()));
        }
        Ok(match ListingKind::from_id(id) {
            Some(kind) => self.get(kind).clone(),
            None => ListingCollection::Remote(self.remote.clone()),
        })
    }
}
