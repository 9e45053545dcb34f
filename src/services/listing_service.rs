use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value as JsonValue};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::config::Config;
use crate::database::listing_store::ListingStore;
use crate::dto::listing_dto::{IdAssignment, ListingInput, UpdateListingPayload};
use crate::error::{Error, Result};
use crate::models::listing::{Counter, Counters, Listing, ListingKind};
use crate::services::cache_service::{CacheSlot, CachedSnapshot};
use crate::services::event_service::{self, EventSink};
use crate::services::filter_service::{self, Facets, FilterSpec};
use crate::services::import_service::{
    self, BulkCreateReport, ImportMode, ImportReport,
};
use crate::services::lifecycle_service::{CleanupSummary, RetentionPolicy};
use crate::utils::time;
use crate::utils::validation::validate;

/// Tunables shared by the remote and local collections.
#[derive(Debug, Clone, Copy)]
pub struct ListingSettings {
    pub remote_timeout: Duration,
    pub list_fetch_cap: usize,
    pub retention: RetentionPolicy,
    pub new_badge_window: chrono::Duration,
}

impl Default for ListingSettings {
    fn default() -> Self {
        Self {
            remote_timeout: Duration::from_secs(12),
            list_fetch_cap: 1000,
            retention: RetentionPolicy::default(),
            new_badge_window: chrono::Duration::days(7),
        }
    }
}

impl ListingSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            remote_timeout: Duration::from_secs(config.remote_timeout_secs),
            list_fetch_cap: config.list_fetch_cap,
            retention: RetentionPolicy::days(config.retention_days),
            new_badge_window: chrono::Duration::days(config.new_badge_days),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ListRequest {
    pub filter: FilterSpec,
    pub page: Option<usize>,
    pub per_page: Option<usize>,
    /// Contact the remote store even if the kind is serving cached data.
    pub retry: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListingPage {
    pub items: Vec<Listing>,
    pub total: usize,
    pub page: usize,
    pub per_page: usize,
    pub total_pages: usize,
    pub cached: bool,
    pub cached_at: Option<i64>,
}

impl ListingPage {
    pub fn from_records(records: &[Listing], request: &ListRequest, cached_at: Option<i64>) -> Self {
        let (page, per_page) = filter_service::normalize_paging(request.page, request.per_page);
        let filtered = filter_service::apply(records, &request.filter, time::now(), page, per_page);
        Self {
            items: filtered.items,
            total: filtered.total,
            page: filtered.page,
            per_page: filtered.per_page,
            total_pages: filtered.total_pages,
            cached: cached_at.is_some(),
            cached_at,
        }
    }
}

/// Active records of one kind plus where they came from.
struct ActiveSet {
    records: Vec<Listing>,
    cached_at: Option<i64>,
}

/// The remote-store adapter: every read and write against the shared
/// listing collection, with cache fallback for reads.
pub struct ListingService {
    store: Arc<dyn ListingStore>,
    cache: Arc<dyn CacheSlot>,
    events: Arc<dyn EventSink>,
    settings: ListingSettings,
    degraded: [AtomicBool; 3],
}

impl ListingService {
    pub fn new(
        store: Arc<dyn ListingStore>,
        cache: Arc<dyn CacheSlot>,
        events: Arc<dyn EventSink>,
        settings: ListingSettings,
    ) -> Self {
        Self {
            store,
            cache,
            events,
            settings,
            degraded: std::array::from_fn(|_| AtomicBool::new(false)),
        }
    }

    /// True while `list` for this kind is answering from the cache slot.
    pub fn is_degraded(&self, kind: ListingKind) -> bool {
        self.degraded[kind.index()].load(Ordering::SeqCst)
    }

    fn set_degraded(&self, kind: ListingKind, degraded: bool) {
        let was = self.degraded[kind.index()].swap(degraded, Ordering::SeqCst);
        match (was, degraded) {
            (false, true) => warn!(kind = %kind, "remote store unreachable, serving cached listings"),
            (true, false) => info!(kind = %kind, "remote store reachable again"),
            _ => {}
        }
    }

    /// Runs one remote call under the configured timeout, giving up early
    /// when the caller goes away.
    async fn remote<T, F>(&self, op: &str, cancel: &CancellationToken, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let limit = self.settings.remote_timeout;
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled(format!("{} was cancelled", op))),
            res = tokio::time::timeout(limit, call) => match res {
                Ok(res) => res,
                Err(_) => Err(Error::Timeout(format!(
                    "{} did not complete within {}s",
                    op,
                    limit.as_secs()
                ))),
            },
        }
    }

    async fn cached(&self, kind: ListingKind) -> Option<CachedSnapshot> {
        match self.cache.get(kind).await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(kind = %kind, error = %err, "cache slot unreadable");
                None
            }
        }
    }

    async fn load_active(
        &self,
        kind: ListingKind,
        retry: bool,
        cancel: &CancellationToken,
    ) -> Result<ActiveSet> {
        if self.is_degraded(kind) && !retry {
            if let Some(snapshot) = self.cached(kind).await {
                return Ok(ActiveSet {
                    records: snapshot.listings,
                    cached_at: Some(snapshot.timestamp),
                });
            }
        }

        let fetched = self
            .remote(
                "list",
                cancel,
                self.store.fetch_active(kind, self.settings.list_fetch_cap),
            )
            .await;

        match fetched {
            Ok(records) => {
                self.set_degraded(kind, false);
                let snapshot = CachedSnapshot {
                    listings: records,
                    timestamp: time::now().timestamp_millis(),
                };
                if let Err(err) = self.cache.set(kind, &snapshot).await {
                    warn!(kind = %kind, error = %err, "failed to refresh cache slot");
                }
                Ok(ActiveSet {
                    records: snapshot.listings,
                    cached_at: None,
                })
            }
            Err(err @ Error::Cancelled(_)) => Err(err),
            Err(err) => match self.cached(kind).await {
                Some(snapshot) => {
                    warn!(kind = %kind, error = %err, "listing fetch failed");
                    self.set_degraded(kind, true);
                    Ok(ActiveSet {
                        records: snapshot.listings,
                        cached_at: Some(snapshot.timestamp),
                    })
                }
                None => {
                    error!(kind = %kind, error = %err, "listing fetch failed and no cache is available");
                    Err(err)
                }
            },
        }
    }

    #[instrument(skip(self, request, cancel), fields(kind = %kind))]
    pub async fn list(
        &self,
        kind: ListingKind,
        request: &ListRequest,
        cancel: &CancellationToken,
    ) -> Result<ListingPage> {
        let active = self.load_active(kind, request.retry, cancel).await?;
        Ok(ListingPage::from_records(&active.records, request, active.cached_at))
    }

    pub async fn facets(&self, kind: ListingKind, cancel: &CancellationToken) -> Result<Facets> {
        let active = self.load_active(kind, false, cancel).await?;
        Ok(filter_service::facets(&active.records))
    }

    #[instrument(skip(self, input, cancel), fields(kind = %kind))]
    pub async fn create(
        &self,
        kind: ListingKind,
        input: ListingInput,
        cancel: &CancellationToken,
    ) -> Result<Listing> {
        input.check()?;
        let listing = input.into_listing(kind, IdAssignment::Fresh, time::now().timestamp_millis());
        self.remote("create", cancel, self.store.insert(&listing))
            .await
            .inspect_err(|err| error!(kind = %kind, error = %err, "failed to create listing"))?;

        self.events.emit(
            event_service::LISTING_CREATED,
            json!({ "id": listing.id, "kind": kind, "title": listing.title }),
        );
        Ok(listing)
    }

    /// Public detail read. Counts a view; inactive records are hidden.
    pub async fn get_for_view(&self, id: &str, cancel: &CancellationToken) -> Result<Listing> {
        let mut listing = self
            .remote("read", cancel, self.store.fetch(id))
            .await?
            .filter(|l| l.is_active)
            .ok_or_else(|| Error::NotFound(format!("Listing {} not found", id)))?;

        if self
            .remote("record view", cancel, self.store.increment(id, Counter::Views))
            .await?
        {
            listing.counters.bump(Counter::Views);
        }
        self.events.emit(
            event_service::LISTING_VIEWED,
            json!({ "id": listing.id, "kind": listing.kind, "organization": listing.organization }),
        );
        Ok(listing)
    }

    /// Admin read. No side effects; inactive records included.
    pub async fn get_for_edit(&self, id: &str, cancel: &CancellationToken) -> Result<Listing> {
        self.remote("read", cancel, self.store.fetch(id))
            .await?
            .ok_or_else(|| Error::NotFound(format!("Listing {} not found", id)))
    }

    #[instrument(skip(self, patch, cancel))]
    pub async fn update(
        &self,
        id: &str,
        patch: UpdateListingPayload,
        cancel: &CancellationToken,
    ) -> Result<Listing> {
        validate(&patch)?;
        let mut listing = self.get_for_edit(id, cancel).await?;
        patch.apply_to(&mut listing, time::now().timestamp_millis())?;

        let listing = self
            .remote("update", cancel, self.store.save(&listing))
            .await?
            .ok_or_else(|| Error::NotFound(format!("Listing {} not found", id)))?;
        self.events.emit(
            event_service::LISTING_UPDATED,
            json!({ "id": listing.id, "kind": listing.kind }),
        );
        Ok(listing)
    }

    pub async fn soft_delete(&self, id: &str, cancel: &CancellationToken) -> Result<()> {
        if !self
            .remote("delete", cancel, self.store.set_active(id, false))
            .await?
        {
            return Err(Error::NotFound(format!("Listing {} not found", id)));
        }
        self.events
            .emit(event_service::LISTING_DELETED, json!({ "id": id, "soft": true }));
        Ok(())
    }

    /// Share, apply and save buttons on the public pages.
    pub async fn record_interaction(
        &self,
        id: &str,
        counter: Counter,
        cancel: &CancellationToken,
    ) -> Result<Counters> {
        let mut listing = self
            .remote("read", cancel, self.store.fetch(id))
            .await?
            .filter(|l| l.is_active)
            .ok_or_else(|| Error::NotFound(format!("Listing {} not found", id)))?;

        if !self
            .remote("record interaction", cancel, self.store.increment(id, counter))
            .await?
        {
            return Err(Error::NotFound(format!("Listing {} not found", id)));
        }
        listing.counters.bump(counter);
        self.events.emit(
            interaction_event(counter),
            json!({ "id": id, "kind": listing.kind, "count": listing.counters.get(counter) }),
        );
        Ok(listing.counters)
    }

    /// Adds every valid record as a new listing. No de-duplication.
    #[instrument(skip(self, raw, cancel), fields(kind = %kind))]
    pub async fn bulk_create(
        &self,
        kind: ListingKind,
        raw: &str,
        cancel: &CancellationToken,
    ) -> Result<BulkCreateReport> {
        let records = import_service::parse_document(kind, raw)?;
        let batch = import_service::normalize_batch(
            kind,
            records,
            IdAssignment::Fresh,
            time::now().timestamp_millis(),
        );

        if !batch.valid.is_empty() {
            self.remote("bulk create", cancel, self.store.insert_batch(&batch.valid))
                .await
                .inspect_err(|err| error!(kind = %kind, error = %err, "bulk create failed"))?;
        }

        let report = BulkCreateReport {
            success_count: batch.valid.len(),
            failed_count: batch.errors.len(),
            errors: batch.errors,
        };
        info!(kind = %kind, success = report.success_count, failed = report.failed_count, "bulk create finished");
        self.events.emit(
            event_service::LISTINGS_IMPORTED,
            json!({ "kind": kind, "mode": "bulk", "imported": report.success_count, "failed": report.failed_count }),
        );
        Ok(report)
    }

    /// Imports an export file. Merge appends unmatched records; replace
    /// deactivates the current active set once the incoming set is stored.
    #[instrument(skip(self, raw, cancel), fields(kind = %kind, mode = ?mode))]
    pub async fn import(
        &self,
        kind: ListingKind,
        raw: &str,
        mode: ImportMode,
        cancel: &CancellationToken,
    ) -> Result<ImportReport> {
        let records = import_service::parse_document(kind, raw)?;
        let now_ms = time::now().timestamp_millis();
        let batch =
            import_service::normalize_batch(kind, records, IdAssignment::KeepIncoming, now_ms);

        let existing = self
            .remote("import", cancel, self.store.fetch_all(kind))
            .await?;
        let (active, inactive): (Vec<Listing>, Vec<Listing>) =
            existing.into_iter().partition(|l| l.is_active);

        let mut report = ImportReport {
            mode,
            failed: batch.errors.len(),
            errors: batch.errors,
            ..ImportReport::default()
        };

        match mode {
            ImportMode::Merge => {
                let (accepted, skipped) = import_service::plan_merge(&active, batch.valid);
                let accepted = import_service::plan_replace(kind, &inactive, accepted, now_ms);
                if !accepted.is_empty() {
                    self.remote("import", cancel, self.store.insert_batch(&accepted))
                        .await?;
                }
                report.imported = accepted.len();
                report.skipped = skipped;
            }
            ImportMode::Replace => {
                let mut reserved = active.clone();
                reserved.extend(inactive);
                let incoming = import_service::plan_replace(kind, &reserved, batch.valid, now_ms);
                if !incoming.is_empty() {
                    self.remote("import", cancel, self.store.insert_batch(&incoming))
                        .await?;
                }
                let previous: Vec<String> = active.into_iter().map(|l| l.id).collect();
                report.replaced = self
                    .remote("import", cancel, self.store.deactivate_many(&previous))
                    .await?;
                report.imported = incoming.len();
            }
        }

        info!(kind = %kind, imported = report.imported, skipped = report.skipped, failed = report.failed, "import finished");
        self.events.emit(
            event_service::LISTINGS_IMPORTED,
            json!({
                "kind": kind,
                "mode": mode,
                "imported": report.imported,
                "skipped": report.skipped,
                "failed": report.failed,
            }),
        );
        Ok(report)
    }

    /// Every record of the kind, inactive included, in the import file shape.
    pub async fn export(&self, kind: ListingKind, cancel: &CancellationToken) -> Result<JsonValue> {
        let records = self
            .remote("export", cancel, self.store.fetch_all(kind))
            .await?;
        export_document(kind, &records)
    }

    /// Deactivates records older than the retention window.
    #[instrument(skip(self, cancel), fields(kind = %kind))]
    pub async fn cleanup(
        &self,
        kind: ListingKind,
        cancel: &CancellationToken,
    ) -> Result<CleanupSummary> {
        let records = self
            .remote("cleanup", cancel, self.store.fetch_all(kind))
            .await?;
        let before = records.iter().filter(|l| l.is_active).count();
        let expired = self.settings.retention.expired_ids(&records, time::now());

        let removed = if expired.is_empty() {
            0
        } else {
            self.remote("cleanup", cancel, self.store.deactivate_many(&expired))
                .await? as usize
        };

        let summary = CleanupSummary {
            before,
            after: before.saturating_sub(removed),
            removed,
        };
        info!(kind = %kind, before = summary.before, after = summary.after, removed = summary.removed, "cleanup finished");
        if removed > 0 {
            self.events.emit(
                event_service::LISTINGS_CLEANED,
                json!({
                    "kind": kind,
                    "removed": removed,
                    "retentionDays": self.settings.retention.window().num_days(),
                    "soft": true,
                }),
            );
        }
        Ok(summary)
    }

    /// Cleanup followed by the active set, for the admin table.
    pub async fn admin_overview(
        &self,
        kind: ListingKind,
        cancel: &CancellationToken,
    ) -> Result<(CleanupSummary, Vec<Listing>)> {
        let summary = self.cleanup(kind, cancel).await?;
        let active = self
            .remote(
                "list",
                cancel,
                self.store.fetch_active(kind, self.settings.list_fetch_cap),
            )
            .await?;
        Ok((summary, active))
    }

    /// Deactivates every active record of the kind and drops its cache slot.
    pub async fn clear(&self, kind: ListingKind, cancel: &CancellationToken) -> Result<u64> {
        let cleared = self
            .remote("clear", cancel, self.store.deactivate_kind(kind))
            .await?;
        if let Err(err) = self.cache.clear(kind).await {
            warn!(kind = %kind, error = %err, "failed to clear cache slot");
        }
        warn!(kind = %kind, cleared, "all listings deactivated");
        self.events.emit(
            event_service::LISTINGS_CLEARED,
            json!({ "kind": kind, "count": cleared, "soft": true }),
        );
        Ok(cleared)
    }

    /// Physically removes records that were soft deleted or expired.
    pub async fn purge_inactive(&self, kind: ListingKind, cancel: &CancellationToken) -> Result<u64> {
        let purged = self
            .remote("purge", cancel, self.store.purge_inactive(kind))
            .await?;
        info!(kind = %kind, purged, "inactive listings purged");
        Ok(purged)
    }
}

pub fn interaction_event(counter: Counter) -> &'static str {
    match counter {
        Counter::Views => event_service::LISTING_VIEWED,
        Counter::Shares => event_service::LISTING_SHARED,
        Counter::Applications => event_service::LISTING_APPLIED,
        Counter::Saves => event_service::LISTING_SAVED,
    }
}

/// `{"metadata": {...}, "<kind>": [...]}`, readable by `parse_document`.
pub fn export_document(kind: ListingKind, records: &[Listing]) -> Result<JsonValue> {
    let mut body = serde_json::Map::new();
    body.insert(
        "metadata".to_string(),
        json!({
            "kind": kind,
            "exportedAt": time::to_rfc3339(time::now()),
            "count": records.len(),
        }),
    );
    body.insert(kind.as_str().to_string(), serde_json::to_value(records)?);
    Ok(JsonValue::Object(body))
}
