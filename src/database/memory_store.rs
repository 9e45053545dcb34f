use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;

use crate::database::listing_store::ListingStore;
use crate::error::{Error, Result};
use crate::models::listing::{Counter, Listing, ListingKind};
use crate::services::filter_service::sort_newest_first;

/// In-process document collection used for local development and tests.
///
/// It can be switched offline or slowed down to exercise the degraded
/// paths of the listing service.
#[derive(Default)]
pub struct MemoryListingStore {
    docs: RwLock<Vec<Listing>>,
    offline: AtomicBool,
    latency_ms: AtomicU64,
}

impl MemoryListingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_available(&self, available: bool) {
        self.offline.store(!available, Ordering::SeqCst);
    }

    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.docs.read().map(|docs| docs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    async fn reach(&self) -> Result<()> {
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::StoreUnavailable(
                "memory store is offline".to_string(),
            ));
        }
        Ok(())
    }

    fn read_docs(&self) -> Result<std::sync::RwLockReadGuard<'_, Vec<Listing>>> {
        self.docs
            .read()
            .map_err(|_| Error::Internal("listing store lock poisoned".to_string()))
    }

    fn write_docs(&self) -> Result<std::sync::RwLockWriteGuard<'_, Vec<Listing>>> {
        self.docs
            .write()
            .map_err(|_| Error::Internal("listing store lock poisoned".to_string()))
    }
}

fn duplicate(id: &str) -> Error {
    Error::BadRequest(format!("listing id '{}' already exists", id))
}

#[async_trait]
impl ListingStore for MemoryListingStore {
    async fn insert(&self, listing: &Listing) -> Result<()> {
        self.reach().await?;
        let mut docs = self.write_docs()?;
        if docs.iter().any(|d| d.id == listing.id) {
            return Err(duplicate(&listing.id));
        }
        docs.push(listing.clone());
        Ok(())
    }

    async fn insert_batch(&self, listings: &[Listing]) -> Result<()> {
        self.reach().await?;
        let mut docs = self.write_docs()?;
        let mut seen: HashSet<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        for listing in listings {
            if !seen.insert(listing.id.as_str()) {
                return Err(duplicate(&listing.id));
            }
        }
        drop(seen);
        docs.extend(listings.iter().cloned());
        Ok(())
    }

    async fn fetch(&self, id: &str) -> Result<Option<Listing>> {
        self.reach().await?;
        Ok(self.read_docs()?.iter().find(|d| d.id == id).cloned())
    }

    async fn fetch_active(&self, kind: ListingKind, cap: usize) -> Result<Vec<Listing>> {
        self.reach().await?;
        let mut active: Vec<Listing> = self
            .read_docs()?
            .iter()
            .filter(|d| d.kind == kind && d.is_active)
            .cloned()
            .collect();
        sort_newest_first(&mut active);
        active.truncate(cap);
        Ok(active)
    }

    async fn fetch_all(&self, kind: ListingKind) -> Result<Vec<Listing>> {
        self.reach().await?;
        Ok(self
            .read_docs()?
            .iter()
            .filter(|d| d.kind == kind)
            .cloned()
            .collect())
    }

    async fn save(&self, listing: &Listing) -> Result<Option<Listing>> {
        self.reach().await?;
        let mut docs = self.write_docs()?;
        Ok(docs.iter_mut().find(|d| d.id == listing.id).map(|slot| {
            let counters = slot.counters;
            *slot = listing.clone();
            slot.counters = counters;
            slot.clone()
        }))
    }

    async fn set_active(&self, id: &str, active: bool) -> Result<bool> {
        self.reach().await?;
        let mut docs = self.write_docs()?;
        match docs.iter_mut().find(|d| d.id == id) {
            Some(doc) => {
                doc.is_active = active;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn increment(&self, id: &str, counter: Counter) -> Result<bool> {
        self.reach().await?;
        let mut docs = self.write_docs()?;
        match docs.iter_mut().find(|d| d.id == id) {
            Some(doc) => {
                doc.counters.bump(counter);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn deactivate_many(&self, ids: &[String]) -> Result<u64> {
        self.reach().await?;
        let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let mut docs = self.write_docs()?;
        let mut changed = 0;
        for doc in docs.iter_mut().filter(|d| d.is_active && wanted.contains(d.id.as_str())) {
            doc.is_active = false;
            changed += 1;
        }
        Ok(changed)
    }

    async fn deactivate_kind(&self, kind: ListingKind) -> Result<u64> {
        self.reach().await?;
        let mut docs = self.write_docs()?;
        let mut changed = 0;
        for doc in docs.iter_mut().filter(|d| d.kind == kind && d.is_active) {
            doc.is_active = false;
            changed += 1;
        }
        Ok(changed)
    }

    async fn purge_inactive(&self, kind: ListingKind) -> Result<u64> {
        self.reach().await?;
        let mut docs = self.write_docs()?;
        let before = docs.len();
        docs.retain(|d| d.kind != kind || d.is_active);
        Ok((before - docs.len()) as u64)
    }
}
