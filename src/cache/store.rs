//! Cache storage backends.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use crate::cache::types::CacheEntry;
use crate::error::GatewayResult;
use crate::providers::types::CheckType;

/// Persistence for cache entries.
///
/// Entries are append-only apart from `mark_expired`, which clamps an
/// entry's windows, and `purge_expired`, which removes dead entries.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn insert(&self, entry: CacheEntry) -> GatewayResult<()>;

    /// Entries for `(entity, provider?, check_type)`, newest first.
    async fn find_for_check(
        &self,
        entity_id: &str,
        provider_id: Option<&str>,
        check_type: CheckType,
    ) -> GatewayResult<Vec<CacheEntry>>;

    /// All entries for `(entity, provider?)`, newest first.
    async fn find_all(
        &self,
        entity_id: &str,
        provider_id: Option<&str>,
    ) -> GatewayResult<Vec<CacheEntry>>;

    /// Clamp an entry's windows to `at`. Returns false if the id is unknown.
    async fn mark_expired(&self, id: Uuid, at: DateTime<Utc>) -> GatewayResult<bool>;

    /// Drop entries whose stale window ended before `now`. Returns the count.
    async fn purge_expired(&self, now: DateTime<Utc>) -> GatewayResult<usize>;
}

/// In-memory store keyed by entity id.
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    inner: DashMap<String, Vec<CacheEntry>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of entries.
    pub fn len(&self) -> usize {
        self.inner.iter().map(|r| r.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Load a snapshot written by [`save_to_file`](Self::save_to_file).
    /// A missing file yields an empty store.
    pub fn load_from_file(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let store = Self::new();
        let path = path.as_ref();
        if path.exists() {
            let reader = BufReader::new(File::open(path)?);
            let map: HashMap<String, Vec<CacheEntry>> = serde_json::from_reader(reader)?;
            for (entity_id, entries) in map {
                store.inner.insert(entity_id, entries);
            }
            tracing::info!(
                path = %path.display(),
                entries = store.len(),
                "Loaded cache snapshot"
            );
        }
        Ok(store)
    }

    /// Write every entry to `path` as JSON.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let path = path.as_ref();
        let map: HashMap<String, Vec<CacheEntry>> = self
            .inner
            .iter()
            .map(|r| (r.key().clone(), r.value().clone()))
            .collect();

        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(writer, &map)?;
        tracing::info!(path = %path.display(), entries = self.len(), "Saved cache snapshot");
        Ok(())
    }

    fn collect<F>(&self, entity_id: &str, filter: F) -> Vec<CacheEntry>
    where
        F: Fn(&CacheEntry) -> bool,
    {
        let Some(entries) = self.inner.get(entity_id) else {
            return Vec::new();
        };
        // Reverse insertion order first so equal timestamps still come out
        // newest-first after the stable sort.
        let mut out: Vec<CacheEntry> = entries
            .iter()
            .rev()
            .filter(|e| filter(e))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.acquired_at.cmp(&a.acquired_at));
        out
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn insert(&self, entry: CacheEntry) -> GatewayResult<()> {
        self.inner
            .entry(entry.entity_id.clone())
            .or_default()
            .push(entry);
        Ok(())
    }

    async fn find_for_check(
        &self,
        entity_id: &str,
        provider_id: Option<&str>,
        check_type: CheckType,
    ) -> GatewayResult<Vec<CacheEntry>> {
        Ok(self.collect(entity_id, |e| {
            e.check_type == check_type && provider_id.map_or(true, |p| e.provider_id == p)
        }))
    }

    async fn find_all(
        &self,
        entity_id: &str,
        provider_id: Option<&str>,
    ) -> GatewayResult<Vec<CacheEntry>> {
        Ok(self.collect(entity_id, |e| {
            provider_id.map_or(true, |p| e.provider_id == p)
        }))
    }

    async fn mark_expired(&self, id: Uuid, at: DateTime<Utc>) -> GatewayResult<bool> {
        for mut bucket in self.inner.iter_mut() {
            if let Some(entry) = bucket.value_mut().iter_mut().find(|e| e.id == id) {
                entry.fresh_until = entry.fresh_until.min(at);
                entry.stale_until = entry.stale_until.min(at);
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> GatewayResult<usize> {
        let mut removed = 0;
        for mut bucket in self.inner.iter_mut() {
            let before = bucket.value().len();
            bucket.value_mut().retain(|e| e.stale_until > now);
            removed += before - bucket.value().len();
        }
        self.inner.retain(|_, entries| !entries.is_empty());
        Ok(removed)
    }
}
