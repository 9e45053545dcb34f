//! Collections that live only on this host, one JSON file per kind.
//!
//! These mirror the operations of the remote adapter but delete for real:
//! removal, cleanup and clear drop records from the file instead of
//! flagging them inactive.

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::{json, Value as JsonValue};
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use crate::dto::listing_dto::{IdAssignment, ListingInput, UpdateListingPayload};
use crate::error::{Error, Result};
use crate::models::listing::{Counter, Counters, Listing, ListingKind};
use crate::services::event_service::{self, EventSink};
use crate::services::filter_service::{self, Facets};
use crate::services::import_service::{self, BulkCreateReport, ImportMode, ImportReport};
use crate::services::lifecycle_service::CleanupSummary;
use crate::services::listing_service::{
    export_document, interaction_event, ListRequest, ListingPage, ListingSettings,
};
use crate::utils::time;
use crate::utils::validation::validate;

pub struct LocalCollection {
    kind: ListingKind,
    path: PathBuf,
    events: Arc<dyn EventSink>,
    settings: ListingSettings,
    // serializes read-modify-write cycles on the file
    lock: Mutex<()>,
}

impl LocalCollection {
    pub fn new(
        kind: ListingKind,
        dir: impl Into<PathBuf>,
        events: Arc<dyn EventSink>,
        settings: ListingSettings,
    ) -> Self {
        let path = dir.into().join(format!("{}.json", kind));
        Self {
            kind,
            path,
            events,
            settings,
            lock: Mutex::new(()),
        }
    }

    pub fn kind(&self) -> ListingKind {
        self.kind
    }

    async fn load(&self) -> Result<Vec<Listing>> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }
        serde_json::from_slice(&raw).map_err(|e| {
            Error::Internal(format!(
                "local {} collection at {} is corrupt: {}",
                self.kind,
                self.path.display(),
                e
            ))
        })
    }

    async fn store(&self, records: &[Listing]) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        let body = serde_json::to_vec_pretty(records)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    fn not_found(id: &str) -> Error {
        Error::NotFound(format!("Listing {} not found", id))
    }

    pub async fn list_all(&self) -> Result<Vec<Listing>> {
        let _guard = self.lock.lock().await;
        self.load().await
    }

    pub async fn list(&self, request: &ListRequest) -> Result<ListingPage> {
        let records = self.list_all().await?;
        Ok(ListingPage::from_records(&records, request, None))
    }

    pub async fn facets(&self) -> Result<Facets> {
        Ok(filter_service::facets(&self.list_all().await?))
    }

    #[instrument(skip(self, input), fields(kind = %self.kind))]
    pub async fn add(&self, input: ListingInput) -> Result<Listing> {
        input.check()?;
        let listing = input.into_listing(self.kind, IdAssignment::Fresh, time::now().timestamp_millis());

        let _guard = self.lock.lock().await;
        let mut records = self.load().await?;
        records.push(listing.clone());
        self.store(&records).await?;

        self.events.emit(
            event_service::LISTING_CREATED,
            json!({ "id": listing.id, "kind": self.kind, "title": listing.title }),
        );
        Ok(listing)
    }

    /// Bulk add. Every valid record becomes a new listing.
    pub async fn add_many(&self, raw: &str) -> Result<BulkCreateReport> {
        let records = import_service::parse_document(self.kind, raw)?;
        let batch = import_service::normalize_batch(
            self.kind,
            records,
            IdAssignment::Fresh,
            time::now().timestamp_millis(),
        );

        if !batch.valid.is_empty() {
            let _guard = self.lock.lock().await;
            let mut stored = self.load().await?;
            stored.extend(batch.valid.iter().cloned());
            self.store(&stored).await?;
        }

        let report = BulkCreateReport {
            success_count: batch.valid.len(),
            failed_count: batch.errors.len(),
            errors: batch.errors,
        };
        self.events.emit(
            event_service::LISTINGS_IMPORTED,
            json!({ "kind": self.kind, "mode": "bulk", "imported": report.success_count, "failed": report.failed_count }),
        );
        Ok(report)
    }

    pub async fn get(&self, id: &str) -> Result<Listing> {
        self.list_all()
            .await?
            .into_iter()
            .find(|l| l.id == id)
            .ok_or_else(|| Self::not_found(id))
    }

    async fn bump(&self, id: &str, counter: Counter) -> Result<Listing> {
        let _guard = self.lock.lock().await;
        let mut records = self.load().await?;
        let listing = records
            .iter_mut()
            .find(|l| l.id == id && l.is_active)
            .ok_or_else(|| Self::not_found(id))?;
        listing.counters.bump(counter);
        let listing = listing.clone();
        self.store(&records).await?;
        Ok(listing)
    }

    pub async fn get_for_view(&self, id: &str) -> Result<Listing> {
        let listing = self.bump(id, Counter::Views).await?;
        self.events.emit(
            event_service::LISTING_VIEWED,
            json!({ "id": listing.id, "kind": self.kind, "organization": listing.organization }),
        );
        Ok(listing)
    }

    pub async fn record_interaction(&self, id: &str, counter: Counter) -> Result<Counters> {
        let listing = self.bump(id, counter).await?;
        self.events
            .emit(
                interaction_event(counter),
                json!({ "id": id, "kind": self.kind, "count": listing.counters.get(counter) }),
            );
        Ok(listing.counters)
    }

    pub async fn update(&self, id: &str, patch: UpdateListingPayload) -> Result<Listing> {
        validate(&patch)?;
        let _guard = self.lock.lock().await;
        let mut records = self.load().await?;
        let listing = records
            .iter_mut()
            .find(|l| l.id == id)
            .ok_or_else(|| Self::not_found(id))?;
        patch.apply_to(listing, time::now().timestamp_millis())?;
        let listing = listing.clone();
        self.store(&records).await?;

        self.events.emit(
            event_service::LISTING_UPDATED,
            json!({ "id": listing.id, "kind": self.kind }),
        );
        Ok(listing)
    }

    /// Hard delete.
    pub async fn remove(&self, id: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut records = self.load().await?;
        let before = records.len();
        records.retain(|l| l.id != id);
        if records.len() == before {
            return Err(Self::not_found(id));
        }
        self.store(&records).await?;
        self.events
            .emit(event_service::LISTING_DELETED, json!({ "id": id, "soft": false }));
        Ok(())
    }

    /// Removes every record. Returns how many were dropped.
    pub async fn clear(&self) -> Result<u64> {
        let _guard = self.lock.lock().await;
        let removed = self.load().await?.len() as u64;
        self.store(&[]).await?;
        warn!(kind = %self.kind, removed, "local collection cleared");
        self.events.emit(
            event_service::LISTINGS_CLEARED,
            json!({ "kind": self.kind, "count": removed, "soft": false }),
        );
        Ok(removed)
    }

    #[instrument(skip(self, raw), fields(kind = %self.kind, mode = ?mode))]
    pub async fn import(&self, raw: &str, mode: ImportMode) -> Result<ImportReport> {
        let records = import_service::parse_document(self.kind, raw)?;
        let now_ms = time::now().timestamp_millis();
        let batch =
            import_service::normalize_batch(self.kind, records, IdAssignment::KeepIncoming, now_ms);

        let _guard = self.lock.lock().await;
        let existing = self.load().await?;
        let mut report = ImportReport {
            mode,
            failed: batch.errors.len(),
            errors: batch.errors,
            ..ImportReport::default()
        };

        let stored = match mode {
            ImportMode::Merge => {
                let (accepted, skipped) = import_service::plan_merge(&existing, batch.valid);
                report.imported = accepted.len();
                report.skipped = skipped;
                let mut stored = existing;
                stored.extend(accepted);
                stored
            }
            ImportMode::Replace => {
                let incoming = import_service::plan_replace(self.kind, &[], batch.valid, now_ms);
                report.imported = incoming.len();
                report.replaced = existing.len() as u64;
                incoming
            }
        };
        self.store(&stored).await?;

        info!(kind = %self.kind, imported = report.imported, skipped = report.skipped, failed = report.failed, "local import finished");
        self.events.emit(
            event_service::LISTINGS_IMPORTED,
            json!({
                "kind": self.kind,
                "mode": mode,
                "imported": report.imported,
                "skipped": report.skipped,
                "failed": report.failed,
            }),
        );
        Ok(report)
    }

    pub async fn export(&self) -> Result<JsonValue> {
        export_document(self.kind, &self.list_all().await?)
    }

    /// Physically removes records past the retention window.
    pub async fn cleanup(&self) -> Result<CleanupSummary> {
        let _guard = self.lock.lock().await;
        let mut records = self.load().await?;
        let before = records.iter().filter(|l| l.is_active).count();
        let now = time::now();
        let retention = self.settings.retention;
        records.retain(|l| !(l.is_active && retention.is_expired(l, now)));
        let after = records.iter().filter(|l| l.is_active).count();
        let removed = before - after;
        if removed > 0 {
            self.store(&records).await?;
            self.events.emit(
                event_service::LISTINGS_CLEANED,
                json!({
                    "kind": self.kind,
                    "removed": removed,
                    "retentionDays": retention.window().num_days(),
                    "soft": false,
                }),
            );
        }
        info!(kind = %self.kind, before, after, removed, "local cleanup finished");
        Ok(CleanupSummary {
            before,
            after,
            removed,
        })
    }

    pub async fn admin_overview(&self) -> Result<(CleanupSummary, Vec<Listing>)> {
        let summary = self.cleanup().await?;
        let mut active: Vec<Listing> = self
            .list_all()
            .await?
            .into_iter()
            .filter(|l| l.is_active)
            .collect();
        filter_service::sort_newest_first(&mut active);
        active.truncate(self.settings.list_fetch_cap);
        Ok((summary, active))
    }

    /// Drops records that an update marked inactive.
    pub async fn purge_inactive(&self) -> Result<u64> {
        let _guard = self.lock.lock().await;
        let mut records = self.load().await?;
        let before = records.len();
        records.retain(|l| l.is_active);
        let purged = (before - records.len()) as u64;
        if purged > 0 {
            self.store(&records).await?;
        }
        Ok(purged)
    }
}
