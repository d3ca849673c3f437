//! Time-boxed store of full search result sets.
//!
//! Every rendered search is snapshotted here under a generated id so the
//! caller can come back for detail on one item without re-querying upstream.
//! Entries expire lazily on lookup, and a background sweeper (see
//! [`ResultCache::start_eviction`]) removes expired entries and enforces the
//! entry cap.

use std::ops::Range;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::future::join_all;
use nanoid::nanoid;
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::data_models::{CachedResultSet, SearchMetadata, SearchResult};
use crate::storage::{KvStore, MemoryStore, StorageError};

pub const CACHE_ID_PREFIX: &str = "exa";
const CACHE_ID_SUFFIX_LEN: usize = 7;
const CACHE_ID_ALPHABET: [char; 36] = [
    'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's',
    't', 'u', 'v', 'w', 'x', 'y', 'z', '0', '1', '2', '3', '4', '5', '6', '7', '8', '9',
];

// `\d` would also accept non-ASCII digits
static CACHE_ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^exa-[0-9]+-[a-z0-9]+$").expect("cache id pattern is valid"));

const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(10);

pub fn generate_cache_id(created_at_millis: i64) -> String {
    format!(
        "{CACHE_ID_PREFIX}-{created_at_millis}-{}",
        nanoid!(CACHE_ID_SUFFIX_LEN, &CACHE_ID_ALPHABET)
    )
}

pub fn is_valid_cache_id(id: &str) -> bool {
    CACHE_ID_PATTERN.is_match(id)
}

/// Creation time embedded in a well-formed id.
pub fn created_at_from_id(id: &str) -> Option<i64> {
    if !is_valid_cache_id(id) {
        return None;
    }
    id.split('-').nth(1)?.parse().ok()
}

/// `[start, end)` clamped into `0..len`; empty when degenerate.
pub fn clamp_range(len: usize, start: usize, end: usize) -> Range<usize> {
    let end = end.min(len);
    let start = start.min(end);
    start..end
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("invalid cache id {0:?}: expected the format exa-<timestamp>-<alphanumeric>")]
    InvalidIdentifier(String),

    #[error("cache entry {0} not found or expired")]
    NotFound(String),

    #[error("index {index} is out of range for cache entry {cache_id}: valid range is 0 to {}", .len.saturating_sub(1))]
    IndexOutOfRange {
        cache_id: String,
        index: i64,
        len: usize,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub ttl: Duration,
    pub max_entries: usize,
    pub sweep_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(5 * 60),
            max_entries: 100,
            sweep_interval: Duration::from_secs(5 * 60),
        }
    }
}

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvictionReport {
    pub expired: usize,
    pub over_capacity: usize,
    pub remaining: usize,
}

struct Sweeper {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct ResultCache {
    store: Arc<dyn KvStore>,
    config: CacheConfig,
    sweeper: Mutex<Option<Sweeper>>,
}

impl ResultCache {
    pub fn new(store: Arc<dyn KvStore>, config: CacheConfig) -> Self {
        Self {
            store,
            config,
            sweeper: Mutex::new(None),
        }
    }

    pub fn in_memory(config: CacheConfig) -> Self {
        Self::new(Arc::new(MemoryStore::new()), config)
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    // =========================================================================
    // Writes
    // =========================================================================

    pub async fn store(
        &self,
        query: &str,
        results: Vec<SearchResult>,
        metadata: SearchMetadata,
    ) -> Result<String, CacheError> {
        self.store_with_ttl(query, results, metadata, self.config.ttl)
            .await
    }

    pub async fn store_with_ttl(
        &self,
        query: &str,
        results: Vec<SearchResult>,
        metadata: SearchMetadata,
        ttl: Duration,
    ) -> Result<String, CacheError> {
        let created_at = now_millis();
        let record = CachedResultSet {
            id: generate_cache_id(created_at),
            query: query.to_string(),
            created_at,
            ttl_ms: u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX),
            results,
            metadata,
        };
        self.persist(&record).await?;
        log::info!(
            "cached {} results for {:?} as {}",
            record.results.len(),
            record.query,
            record.id
        );
        Ok(record.id)
    }

    async fn persist(&self, record: &CachedResultSet) -> Result<(), CacheError> {
        let value = serde_json::to_string(record).map_err(StorageError::from)?;
        self.store.put(&record.id, value, record.ttl()).await?;
        Ok(())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    fn validate(cache_id: &str) -> Result<(), CacheError> {
        if is_valid_cache_id(cache_id) {
            Ok(())
        } else {
            Err(CacheError::InvalidIdentifier(cache_id.to_string()))
        }
    }

    async fn read_record(&self, key: &str) -> Result<Option<CachedResultSet>, StorageError> {
        match self.store.get(key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Fetches a whole result set. Expired entries are deleted here, on first
    /// access, and reported the same as missing ones.
    pub async fn lookup(&self, cache_id: &str) -> Result<CachedResultSet, CacheError> {
        Self::validate(cache_id)?;

        match self.read_record(cache_id).await {
            Ok(Some(record)) if !record.is_expired_at(now_millis()) => Ok(record),
            Ok(Some(_)) => {
                log::debug!("cache entry {cache_id} expired, deleting");
                self.store.delete(cache_id).await?;
                Err(CacheError::NotFound(cache_id.to_string()))
            }
            Ok(None) => Err(CacheError::NotFound(cache_id.to_string())),
            Err(StorageError::Serialization(e)) => {
                log::warn!("dropping unreadable cache entry {cache_id}: {e}");
                self.store.delete(cache_id).await?;
                Err(CacheError::NotFound(cache_id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get_by_index(
        &self,
        cache_id: &str,
        index: usize,
    ) -> Result<SearchResult, CacheError> {
        let record = self.lookup(cache_id).await?;
        let len = record.len();
        record
            .results
            .into_iter()
            .nth(index)
            .ok_or_else(|| CacheError::IndexOutOfRange {
                cache_id: cache_id.to_string(),
                index: i64::try_from(index).unwrap_or(i64::MAX),
                len,
            })
    }

    /// Results in `[start, end)`, clamped to the stored set. Bounds never
    /// fail; a degenerate range yields an empty vec.
    pub async fn get_range(
        &self,
        cache_id: &str,
        start: usize,
        end: usize,
    ) -> Result<Vec<SearchResult>, CacheError> {
        let record = self.lookup(cache_id).await?;
        Ok(record.results[clamp_range(record.len(), start, end)].to_vec())
    }

    /// Number of well-formed entries currently held, expired or not.
    pub async fn entry_count(&self) -> Result<usize, CacheError> {
        let keys = self.store.list_keys().await?;
        Ok(keys.iter().filter(|k| is_valid_cache_id(k)).count())
    }

    // =========================================================================
    // Eviction
    // =========================================================================

    /// Deletes expired entries, then the oldest survivors until at most
    /// `max_entries` remain. Keys not in the cache id format are left alone.
    pub async fn evict_expired(&self) -> Result<EvictionReport, CacheError> {
        let now = now_millis();
        let keys: Vec<String> = self
            .store
            .list_keys()
            .await?
            .into_iter()
            .filter(|k| is_valid_cache_id(k))
            .collect();

        let reads = keys.into_iter().map(|key| async move {
            let record = self.read_record(&key).await;
            (key, record)
        });

        let mut report = EvictionReport::default();
        let mut live: Vec<(i64, String)> = Vec::new();
        for (key, record) in join_all(reads).await {
            match record {
                Ok(Some(record)) if !record.is_expired_at(now) => {
                    live.push((record.created_at, key));
                }
                Ok(Some(_)) | Ok(None) => {
                    self.store.delete(&key).await?;
                    report.expired += 1;
                }
                Err(StorageError::Serialization(e)) => {
                    log::warn!("dropping unreadable cache entry {key}: {e}");
                    self.store.delete(&key).await?;
                    report.expired += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }

        if live.len() > self.config.max_entries {
            // newest first
            live.sort_by(|a, b| b.cmp(a));
            for (_, key) in live.drain(self.config.max_entries..) {
                self.store.delete(&key).await?;
                report.over_capacity += 1;
            }
        }
        report.remaining = live.len();

        Ok(report)
    }

    /// Spawns the periodic sweeper. Returns `false` if one is already running.
    ///
    /// The task holds only a weak reference, so it also winds down once the
    /// cache itself is dropped.
    pub fn start_eviction(self: &Arc<Self>) -> bool {
        let mut guard = self.sweeper.lock().unwrap_or_else(PoisonError::into_inner);
        if guard.is_some() {
            return false;
        }

        let period = self.config.sweep_interval.max(MIN_SWEEP_INTERVAL);
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let cache = Arc::downgrade(self);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                let Some(cache) = cache.upgrade() else {
                    break;
                };
                match cache.evict_expired().await {
                    Ok(report) if report.expired + report.over_capacity > 0 => {
                        log::info!(
                            "cache sweep removed {} expired and {} over capacity, {} remaining",
                            report.expired,
                            report.over_capacity,
                            report.remaining
                        );
                    }
                    Ok(_) => {}
                    Err(e) => log::warn!("cache sweep failed: {e}"),
                }
            }
            log::info!("cache sweeper stopped");
        });

        log::info!("cache sweeper started, interval {:?}", period);
        *guard = Some(Sweeper { cancel, handle });
        true
    }

    pub fn is_sweeping(&self) -> bool {
        self.sweeper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|s| !s.handle.is_finished())
    }

    /// Stops the sweeper and waits for it to exit.
    pub async fn shutdown(&self) {
        let sweeper = self
            .sweeper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(sweeper) = sweeper {
            sweeper.cancel.cancel();
            if let Err(e) = sweeper.handle.await {
                log::error!("cache sweeper panicked: {e}");
            }
        }
    }
}

impl Drop for ResultCache {
    fn drop(&mut self) {
        if let Some(sweeper) = self
            .sweeper
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            sweeper.cancel.cancel();
        }
    }
}
