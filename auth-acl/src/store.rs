use crate::error::StoreError;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

pub mod redis;

pub use self::redis::RedisStore;

/// Keys fetched per SCAN round trip during pattern invalidation
pub const SCAN_BATCH_SIZE: usize = 100;

/// Key-value store shared by every process using the permission layer.
/// Holds decision cache entries and consistency pins.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Set a value that expires after `ttl`
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;

    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// One step of a cursor-based scan. Returns the next cursor (0 when the
    /// scan is complete) and the matching keys visited in this step.
    async fn scan(
        &self,
        pattern: &str,
        cursor: u64,
        count: usize,
    ) -> Result<(u64, Vec<String>), StoreError>;

    /// Delete keys, returning how many existed
    async fn delete(&self, keys: &[String]) -> Result<u64, StoreError>;
}

/// Delete every key matching `pattern`, scanning in bounded batches
pub async fn delete_matching(store: &dyn KeyValueStore, pattern: &str) -> Result<u64, StoreError> {
    let mut cursor = 0;
    let mut deleted = 0;

    loop {
        let (next, keys) = store.scan(pattern, cursor, SCAN_BATCH_SIZE).await?;
        if !keys.is_empty() {
            deleted += store.delete(&keys).await?;
        }
        if next == 0 {
            break;
        }
        cursor = next;
    }

    Ok(deleted)
}

/// Escape glob metacharacters so an identifier only matches itself
pub fn escape_glob(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Glob matching with the subset of Redis semantics the cache relies on:
/// `*`, `?` and backslash escapes.
pub fn glob_match(pattern: &str, candidate: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let candidate: Vec<char> = candidate.chars().collect();
    glob_match_from(&pattern, &candidate)
}

fn glob_match_from(pattern: &[char], candidate: &[char]) -> bool {
    match pattern.split_first() {
        None => candidate.is_empty(),
        Some(('*', rest)) => (0..=candidate.len())
            .any(|skip| glob_match_from(rest, candidate.get(skip..).unwrap_or(&[]))),
        Some(('?', rest)) => match candidate.split_first() {
            Some((_, remaining)) => glob_match_from(rest, remaining),
            None => false,
        },
        Some(('\\', rest)) => match (rest.split_first(), candidate.split_first()) {
            (Some((literal, rest)), Some((c, remaining))) => {
                literal == c && glob_match_from(rest, remaining)
            }
            _ => false,
        },
        Some((literal, rest)) => match candidate.split_first() {
            Some((c, remaining)) => literal == c && glob_match_from(rest, remaining),
            None => false,
        },
    }
}

struct StoredValue {
    value: String,
    expires_at: Instant,
}

impl StoredValue {
    fn is_live(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// In-memory store for tests and single-process development.
///
/// Scan cursors name the last key visited, so keys deleted between steps
/// never shift the position of the ones still waiting to be visited.
pub struct InMemoryStore {
    entries: DashMap<String, StoredValue>,
    cursors: DashMap<u64, String>,
    next_cursor: AtomicU64,
    unavailable: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            cursors: DashMap::new(),
            next_cursor: AtomicU64::new(1),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Make every subsequent call fail, simulating a store outage
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of live keys
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|entry| entry.value().is_live()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn ensure_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Connection("in-memory store marked unavailable".to_string()));
        }
        Ok(())
    }

    fn live_keys_sorted(&self) -> Vec<String> {
        self.entries.retain(|_, stored| stored.is_live());
        let mut keys: Vec<String> = self.entries.iter().map(|entry| entry.key().clone()).collect();
        keys.sort();
        keys
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.ensure_available()?;
        Ok(self
            .entries
            .get(key)
            .filter(|stored| stored.is_live())
            .map(|stored| stored.value.clone()))
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        self.ensure_available()?;
        self.entries.insert(
            key.to_string(),
            StoredValue {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.get(key).await?.is_some())
    }

    async fn scan(
        &self,
        pattern: &str,
        cursor: u64,
        count: usize,
    ) -> Result<(u64, Vec<String>), StoreError> {
        self.ensure_available()?;

        let resume_after = match cursor {
            0 => None,
            id => match self.cursors.remove(&id) {
                Some((_, last)) => Some(last),
                None => return Ok((0, Vec::new())),
            },
        };

        let keys = self.live_keys_sorted();
        let start = match resume_after {
            Some(ref last) => keys.partition_point(|key| key <= last),
            None => 0,
        };
        let end = start.saturating_add(count.max(1)).min(keys.len());
        let visited = keys.get(start..end).unwrap_or(&[]);

        let matched = visited
            .iter()
            .filter(|key| glob_match(pattern, key))
            .cloned()
            .collect();
        let next = match visited.last() {
            Some(last) if end < keys.len() => {
                let id = self.next_cursor.fetch_add(1, Ordering::SeqCst);
                self.cursors.insert(id, last.clone());
                id
            }
            _ => 0,
        };

        Ok((next, matched))
    }

    async fn delete(&self, keys: &[String]) -> Result<u64, StoreError> {
        self.ensure_available()?;
        let mut removed = 0;
        for key in keys {
            if let Some((_, stored)) = self.entries.remove(key) {
                if stored.is_live() {
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }
}
