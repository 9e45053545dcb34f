//! The on-device cache slot: one snapshot per listing kind, overwritten
//! wholesale after every successful remote read and served when the
//! remote store cannot be reached.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::{Map, Value as JsonValue};
use tracing::warn;

use crate::error::{Error, Result};
use crate::models::listing::{Listing, ListingKind};

#[derive(Debug, Clone, PartialEq)]
pub struct CachedSnapshot {
    pub listings: Vec<Listing>,
    /// Epoch milliseconds of the remote read that produced the snapshot.
    pub timestamp: i64,
}

impl CachedSnapshot {
    /// `{ "<kind>": [...], "timestamp": <ms> }`
    pub fn to_json(&self, kind: ListingKind) -> Result<JsonValue> {
        let mut body = Map::new();
        body.insert(kind.as_str().to_string(), serde_json::to_value(&self.listings)?);
        body.insert("timestamp".to_string(), JsonValue::from(self.timestamp));
        Ok(JsonValue::Object(body))
    }

    pub fn from_json(kind: ListingKind, value: JsonValue) -> Result<Self> {
        let JsonValue::Object(mut body) = value else {
            return Err(Error::Internal("cache slot is not a JSON object".to_string()));
        };
        let listings = body
            .remove(kind.as_str())
            .ok_or_else(|| Error::Internal(format!("cache slot has no '{}' array", kind)))?;
        let timestamp = body
            .get("timestamp")
            .and_then(JsonValue::as_i64)
            .ok_or_else(|| Error::Internal("cache slot has no timestamp".to_string()))?;
        Ok(Self {
            listings: serde_json::from_value(listings)?,
            timestamp,
        })
    }
}

#[async_trait]
pub trait CacheSlot: Send + Sync {
    async fn get(&self, kind: ListingKind) -> Result<Option<CachedSnapshot>>;
    async fn set(&self, kind: ListingKind, snapshot: &CachedSnapshot) -> Result<()>;
    async fn clear(&self, kind: ListingKind) -> Result<()>;
}

/// One JSON file per kind under a cache directory.
pub struct FileCacheSlot {
    dir: PathBuf,
}

impl FileCacheSlot {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, kind: ListingKind) -> PathBuf {
        self.dir.join(format!("{}_cache.json", kind))
    }
}

#[async_trait]
impl CacheSlot for FileCacheSlot {
    async fn get(&self, kind: ListingKind) -> Result<Option<CachedSnapshot>> {
        let path = self.path(kind);
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let parsed = serde_json::from_slice::<JsonValue>(&raw)
            .map_err(Error::from)
            .and_then(|value| CachedSnapshot::from_json(kind, value));
        match parsed {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(err) => {
                warn!(kind = %kind, path = %path.display(), error = %err, "ignoring unreadable cache slot");
                Ok(None)
            }
        }
    }

    async fn set(&self, kind: ListingKind, snapshot: &CachedSnapshot) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let body = serde_json::to_vec(&snapshot.to_json(kind)?)?;
        // write-then-rename so a reader never sees a half-written slot
        let path = self.path(kind);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn clear(&self, kind: ListingKind) -> Result<()> {
        match tokio::fs::remove_file(self.path(kind)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// Process-local slot. Stores the serialized form so behaviour matches
/// the file-backed slot.
#[derive(Default)]
pub struct MemoryCacheSlot {
    slots: RwLock<HashMap<ListingKind, JsonValue>>,
}

impl MemoryCacheSlot {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheSlot for MemoryCacheSlot {
    async fn get(&self, kind: ListingKind) -> Result<Option<CachedSnapshot>> {
        let value = {
            let slots = self
                .slots
                .read()
                .map_err(|_| Error::Internal("cache lock poisoned".to_string()))?;
            slots.get(&kind).cloned()
        };
        value.map(|v| CachedSnapshot::from_json(kind, v)).transpose()
    }

    async fn set(&self, kind: ListingKind, snapshot: &CachedSnapshot) -> Result<()> {
        let value = snapshot.to_json(kind)?;
        self.slots
            .write()
            .map_err(|_| Error::Internal("cache lock poisoned".to_string()))?
            .insert(kind, value);
        Ok(())
    }

    async fn clear(&self, kind: ListingKind) -> Result<()> {
        self.slots
            .write()
            .map_err(|_| Error::Internal("cache lock poisoned".to_string()))?
            .remove(&kind);
        Ok(())
    }
}
