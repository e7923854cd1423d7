use crate::{
    models::{ObjectRef, SubjectRef},
    store::{delete_matching, escape_glob, KeyValueStore},
};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub const CACHE_KEY_PREFIX: &str = "acl:perm";

/// Used when the configured TTL is unset or not positive
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60);

/// Identifies one permission question:
/// `acl:perm:{subjectType}:{subjectID}:{objectType}:{objectID}:{relation}`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub subject_type: String,
    pub subject_id: String,
    pub object_type: String,
    pub object_id: String,
    pub relation: String,
}

impl CacheKey {
    pub fn new(subject: &SubjectRef, object: &ObjectRef, relation: &str) -> Self {
        let subject_id = match subject.relation {
            Some(ref userset) => format!("{}#{}", subject.subject_id, userset),
            None => subject.subject_id.clone(),
        };
        Self {
            subject_type: subject.subject_type.clone(),
            subject_id,
            object_type: object.object_type.clone(),
            object_id: object.object_id.clone(),
            relation: relation.to_string(),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}:{}:{}",
            CACHE_KEY_PREFIX,
            self.subject_type,
            self.subject_id,
            self.object_type,
            self.object_id,
            self.relation
        )
    }
}

/// Pattern covering every cached decision about an object
pub fn object_pattern(object: &ObjectRef) -> String {
    format!(
        "{}:*:{}:{}:*",
        CACHE_KEY_PREFIX,
        escape_glob(&object.object_type),
        escape_glob(&object.object_id)
    )
}

/// Pattern covering every cached decision about one subject on an object
pub fn subject_pattern(subject: &SubjectRef, object: &ObjectRef) -> String {
    format!(
        "{}:{}:{}:{}:*",
        CACHE_KEY_PREFIX,
        escape_glob(&subject.to_string()),
        escape_glob(&object.object_type),
        escape_glob(&object.object_id)
    )
}

/// TTL-bounded cache of allow/deny answers.
///
/// Never fails a caller: lookups that hit a store error are misses, and
/// store or invalidation failures are logged.
pub struct DecisionCache {
    backend: Option<Arc<dyn KeyValueStore>>,
    ttl: Duration,
}

impl DecisionCache {
    pub fn new(backend: Arc<dyn KeyValueStore>, ttl: Duration) -> Self {
        let ttl = if ttl.is_zero() { DEFAULT_CACHE_TTL } else { ttl };
        Self {
            backend: Some(backend),
            ttl,
        }
    }

    pub fn disabled() -> Self {
        Self {
            backend: None,
            ttl: DEFAULT_CACHE_TTL,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn lookup(&self, key: &CacheKey) -> Option<bool> {
        let backend = self.backend.as_ref()?;
        let key = key.to_string();

        match backend.get(&key).await {
            Ok(Some(raw)) => match raw.as_str() {
                "true" | "1" => {
                    debug!("Cache hit for permission check: {}", key);
                    Some(true)
                }
                "false" | "0" => {
                    debug!("Cache hit for permission check: {}", key);
                    Some(false)
                }
                other => {
                    warn!("Ignoring unreadable cache entry {} = {:?}", key, other);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!("Cache lookup failed for {}, treating as miss: {}", key, e);
                None
            }
        }
    }

    pub async fn store(&self, key: &CacheKey, allowed: bool) {
        let Some(backend) = self.backend.as_ref() else {
            return;
        };
        let key = key.to_string();
        let value = if allowed { "true" } else { "false" };
        if let Err(e) = backend.set_with_ttl(&key, value, self.ttl).await {
            warn!("Failed to cache decision {}: {}", key, e);
        }
    }

    /// Drop every cached decision about the object
    pub async fn invalidate_object(&self, object: &ObjectRef) {
        self.delete_pattern(&object_pattern(object)).await;
    }

    /// Drop the cached decisions about one subject on the object
    pub async fn invalidate_subject(&self, subject: &SubjectRef, object: &ObjectRef) {
        self.delete_pattern(&subject_pattern(subject, object)).await;
    }

    /// Invalidation run by every write: the whole object, then the subject's
    /// own entries
    pub async fn invalidate(&self, subject: &SubjectRef, object: &ObjectRef) {
        self.invalidate_object(object).await;
        self.invalidate_subject(subject, object).await;
    }

    async fn delete_pattern(&self, pattern: &str) {
        let Some(backend) = self.backend.as_ref() else {
            return;
        };
        match delete_matching(backend.as_ref(), pattern).await {
            Ok(deleted) => {
                debug!("Invalidated {} cached decision(s) matching {}", deleted, pattern)
            }
            Err(e) => warn!("Cache invalidation failed for {}: {}", pattern, e),
        }
    }
}
