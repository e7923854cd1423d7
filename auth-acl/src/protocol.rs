use crate::{
    error::{AclError, EngineError},
    models::*,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::{BTreeSet, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

pub mod http;

pub use self::http::HttpTransport;

/// Request/response protocol spoken by the authorization engine.
///
/// One implementation instance corresponds to one connection (primary or
/// replica); routing between them is done by [`crate::client::TupleClient`].
#[async_trait]
pub trait EngineTransport: Send + Sync {
    /// List every store known to the engine
    async fn list_stores(&self) -> Result<Vec<StoreInfo>, EngineError>;

    /// Ids of the authorization models defined in a store
    async fn read_authorization_models(&self, store_id: &str) -> Result<Vec<String>, EngineError>;

    async fn check(
        &self,
        model: &AuthorizationModel,
        key: &TupleKey,
        consistency: Consistency,
    ) -> Result<bool, EngineError>;

    /// Apply writes and deletes in one request
    async fn write(
        &self,
        model: &AuthorizationModel,
        writes: &[TupleKey],
        deletes: &[TupleKey],
    ) -> Result<(), EngineError>;

    /// Every stored tuple matching the filter
    async fn read(
        &self,
        model: &AuthorizationModel,
        filter: &TupleFilter,
        consistency: Consistency,
    ) -> Result<Vec<TupleKey>, EngineError>;

    /// Objects (as `type:id`) of `object_type` on which `user` holds `relation`
    async fn list_objects(
        &self,
        model: &AuthorizationModel,
        user: &str,
        relation: &str,
        object_type: &str,
        consistency: Consistency,
    ) -> Result<Vec<String>, EngineError>;
}

const MAX_USERSET_DEPTH: u32 = 10;

/// In-memory engine for tests and development.
///
/// Evaluates direct tuples, `type:*` wildcards and `type:id#relation`
/// usersets. It can also mimic two behaviors of a deployed engine that the
/// consistency layer has to defeat: an internal check-result cache that only
/// [`Consistency::HigherConsistency`] bypasses, and replica lag (a replica is
/// a separate instance that only catches up on [`InMemoryEngine::sync_from`]).
pub struct InMemoryEngine {
    stores: Vec<StoreInfo>,
    models: Vec<String>,
    types: Option<HashSet<String>>,
    tuples: Arc<DashMap<TupleKey, DateTime<Utc>>>,
    query_cache: Option<DashMap<TupleKey, bool>>,
    unavailable: AtomicBool,
    check_calls: AtomicUsize,
}

impl InMemoryEngine {
    /// One store holding one model
    pub fn new() -> Self {
        Self {
            stores: vec![StoreInfo {
                id: "01HSTORE0000000000000000000".to_string(),
                name: "acl".to_string(),
            }],
            models: vec!["01HMODEL0000000000000000000".to_string()],
            types: None,
            tuples: Arc::new(DashMap::new()),
            query_cache: None,
            unavailable: AtomicBool::new(false),
            check_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_stores(mut self, stores: Vec<StoreInfo>) -> Self {
        self.stores = stores;
        self
    }

    pub fn with_models(mut self, models: Vec<String>) -> Self {
        self.models = models;
        self
    }

    /// Restrict the model to the given object/subject types; anything else
    /// is answered with "type not found"
    pub fn with_types(mut self, types: &[&str]) -> Self {
        self.types = Some(types.iter().map(|t| t.to_string()).collect());
        self
    }

    /// Cache check results unless the request asks for higher consistency
    pub fn with_query_cache(mut self) -> Self {
        self.query_cache = Some(DashMap::new());
        self
    }

    /// A replica sharing this engine's store and models, holding a snapshot
    /// of the current tuples
    pub fn replica(&self) -> Self {
        let replica = Self {
            stores: self.stores.clone(),
            models: self.models.clone(),
            types: self.types.clone(),
            tuples: Arc::new(DashMap::new()),
            query_cache: None,
            unavailable: AtomicBool::new(false),
            check_calls: AtomicUsize::new(0),
        };
        replica.sync_from(self);
        replica
    }

    /// Replace this engine's tuples with the primary's (replication catch-up)
    pub fn sync_from(&self, primary: &InMemoryEngine) {
        self.tuples.clear();
        for entry in primary.tuples.iter() {
            self.tuples.insert(entry.key().clone(), *entry.value());
        }
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of check requests answered so far
    pub fn check_calls(&self) -> usize {
        self.check_calls.load(Ordering::SeqCst)
    }

    pub fn tuple_count(&self) -> usize {
        self.tuples.len()
    }

    pub fn contains(&self, key: &TupleKey) -> bool {
        self.tuples.contains_key(key)
    }

    /// Insert a tuple directly, bypassing request validation
    pub fn seed(&self, key: TupleKey) {
        self.tuples.insert(key, Utc::now());
    }

    fn ensure_available(&self) -> Result<(), EngineError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(EngineError::Unavailable("in-memory engine marked unavailable".to_string()));
        }
        Ok(())
    }

    fn ensure_model(&self, model: &AuthorizationModel) -> Result<(), EngineError> {
        let known_store = self.stores.iter().any(|s| s.id == model.store_id);
        if !known_store || !self.models.contains(&model.model_id) {
            return Err(EngineError::Rejected {
                code: "authorization_model_not_found".to_string(),
                message: format!("model {} not found in store {}", model.model_id, model.store_id),
            });
        }
        Ok(())
    }

    fn ensure_type(&self, type_name: &str) -> Result<(), EngineError> {
        match self.types {
            Some(ref types) if !types.contains(type_name) => {
                Err(EngineError::TypeNotFound(format!("type '{}' not found", type_name)))
            }
            _ => Ok(()),
        }
    }

    fn ensure_key_types(&self, key: &TupleKey) -> Result<(), EngineError> {
        let rejected = |e: AclError| EngineError::Rejected {
            code: "validation_error".to_string(),
            message: e.to_string(),
        };
        let object = ObjectRef::parse(&key.object).map_err(rejected)?;
        let subject = SubjectRef::parse(&key.user).map_err(rejected)?;
        self.ensure_type(&object.object_type)?;
        self.ensure_type(&subject.subject_type)
    }

    fn evaluate(&self, subject: &SubjectRef, relation: &str, object: &str, depth: u32) -> bool {
        if depth > MAX_USERSET_DEPTH {
            return false;
        }

        let direct = TupleKey {
            user: subject.to_string(),
            relation: relation.to_string(),
            object: object.to_string(),
        };
        if self.tuples.contains_key(&direct) {
            return true;
        }

        let wildcard = TupleKey {
            user: SubjectRef::wildcard(&subject.subject_type).to_string(),
            ..direct
        };
        if !subject.is_userset() && self.tuples.contains_key(&wildcard) {
            return true;
        }

        let usersets: Vec<SubjectRef> = self
            .tuples
            .iter()
            .filter(|entry| entry.key().relation == relation && entry.key().object == object)
            .filter_map(|entry| SubjectRef::parse(&entry.key().user).ok())
            .filter(|granted| granted.is_userset())
            .collect();

        usersets.iter().any(|userset| {
            let userset_object = format!("{}:{}", userset.subject_type, userset.subject_id);
            let userset_relation = userset.relation.as_deref().unwrap_or_default();
            self.evaluate(subject, userset_relation, &userset_object, depth + 1)
        })
    }
}

impl Default for InMemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EngineTransport for InMemoryEngine {
    async fn list_stores(&self) -> Result<Vec<StoreInfo>, EngineError> {
        self.ensure_available()?;
        Ok(self.stores.clone())
    }

    async fn read_authorization_models(&self, store_id: &str) -> Result<Vec<String>, EngineError> {
        self.ensure_available()?;
        if self.stores.iter().any(|s| s.id == store_id) {
            Ok(self.models.clone())
        } else {
            Ok(Vec::new())
        }
    }

    async fn check(
        &self,
        model: &AuthorizationModel,
        key: &TupleKey,
        consistency: Consistency,
    ) -> Result<bool, EngineError> {
        self.ensure_available()?;
        self.ensure_model(model)?;
        self.ensure_key_types(key)?;
        self.check_calls.fetch_add(1, Ordering::SeqCst);

        if consistency != Consistency::HigherConsistency {
            let cached = self
                .query_cache
                .as_ref()
                .and_then(|cache| cache.get(key).map(|v| *v));
            if let Some(allowed) = cached {
                debug!("In-memory engine served check from its query cache: {}", key);
                return Ok(allowed);
            }
        }

        let subject = SubjectRef::parse(&key.user).map_err(|e| EngineError::Rejected {
            code: "validation_error".to_string(),
            message: e.to_string(),
        })?;
        let allowed = self.evaluate(&subject, &key.relation, &key.object, 0);

        if let Some(ref cache) = self.query_cache {
            cache.insert(key.clone(), allowed);
        }
        Ok(allowed)
    }

    async fn write(
        &self,
        model: &AuthorizationModel,
        writes: &[TupleKey],
        deletes: &[TupleKey],
    ) -> Result<(), EngineError> {
        self.ensure_available()?;
        self.ensure_model(model)?;

        // Validate the whole request before applying any of it
        for key in writes {
            self.ensure_key_types(key)?;
            if self.tuples.contains_key(key) {
                return Err(EngineError::Rejected {
                    code: "write_failed_due_to_invalid_input".to_string(),
                    message: format!("cannot write a tuple which already exists: {}", key),
                });
            }
        }
        for key in deletes {
            if !self.tuples.contains_key(key) {
                return Err(EngineError::Rejected {
                    code: "write_failed_due_to_invalid_input".to_string(),
                    message: format!("cannot delete a tuple which does not exist: {}", key),
                });
            }
        }

        for key in deletes {
            self.tuples.remove(key);
        }
        let now = Utc::now();
        for key in writes {
            self.tuples.insert(key.clone(), now);
        }
        Ok(())
    }

    async fn read(
        &self,
        model: &AuthorizationModel,
        filter: &TupleFilter,
        _consistency: Consistency,
    ) -> Result<Vec<TupleKey>, EngineError> {
        self.ensure_available()?;
        self.ensure_model(model)?;

        let mut tuples: Vec<TupleKey> = self
            .tuples
            .iter()
            .filter(|entry| filter.matches(entry.key()))
            .map(|entry| entry.key().clone())
            .collect();
        tuples.sort_by(|a, b| (&a.user, &a.relation).cmp(&(&b.user, &b.relation)));
        Ok(tuples)
    }

    async fn list_objects(
        &self,
        model: &AuthorizationModel,
        user: &str,
        relation: &str,
        object_type: &str,
        _consistency: Consistency,
    ) -> Result<Vec<String>, EngineError> {
        self.ensure_available()?;
        self.ensure_model(model)?;
        self.ensure_type(object_type)?;

        let subject = SubjectRef::parse(user).map_err(|e| EngineError::Rejected {
            code: "validation_error".to_string(),
            message: e.to_string(),
        })?;
        self.ensure_type(&subject.subject_type)?;

        let prefix = format!("{}:", object_type);
        let candidates: BTreeSet<String> = self
            .tuples
            .iter()
            .filter(|entry| entry.key().object.starts_with(&prefix))
            .map(|entry| entry.key().object.clone())
            .collect();

        Ok(candidates
            .into_iter()
            .filter(|object| self.evaluate(&subject, relation, object, 0))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> AuthorizationModel {
        AuthorizationModel {
            store_id: "01HSTORE0000000000000000000".to_string(),
            model_id: "01HMODEL0000000000000000000".to_string(),
        }
    }

    fn key(user: &str, relation: &str, object: &str) -> TupleKey {
        TupleKey {
            user: user.to_string(),
            relation: relation.to_string(),
            object: object.to_string(),
        }
    }

    #[tokio::test]
    async fn test_in_memory_engine() {
        let engine = InMemoryEngine::new();
        let grant = key("user:alice", "reader", "pipeline:p1");

        assert!(!engine.check(&model(), &grant, Consistency::Unspecified).await.unwrap());

        engine.write(&model(), &[grant.clone()], &[]).await.unwrap();
        assert!(engine.check(&model(), &grant, Consistency::Unspecified).await.unwrap());

        let tuples = engine
            .read(&model(), &TupleFilter::object(&ObjectRef::new("pipeline", "p1")), Consistency::Unspecified)
            .await
            .unwrap();
        assert_eq!(tuples, vec![grant.clone()]);

        engine.write(&model(), &[], &[grant.clone()]).await.unwrap();
        assert_eq!(engine.tuple_count(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_write_and_missing_delete_are_rejected() {
        let engine = InMemoryEngine::new();
        let grant = key("user:alice", "reader", "pipeline:p1");

        engine.write(&model(), &[grant.clone()], &[]).await.unwrap();
        let err = engine.write(&model(), &[grant.clone()], &[]).await.unwrap_err();
        assert!(matches!(err, EngineError::Rejected { .. }));

        let missing = key("user:bob", "reader", "pipeline:p1");
        assert!(engine.write(&model(), &[], &[missing]).await.is_err());
    }

    #[tokio::test]
    async fn test_wildcard_and_userset_evaluation() {
        let engine = InMemoryEngine::new();
        engine.seed(key("user:*", "executor", "pipeline:public"));
        engine.seed(key("group:g1#member", "reader", "pipeline:p1"));
        engine.seed(key("user:carol", "member", "group:g1"));

        let public = key("user:anyone", "executor", "pipeline:public");
        assert!(engine.check(&model(), &public, Consistency::Unspecified).await.unwrap());

        let via_group = key("user:carol", "reader", "pipeline:p1");
        assert!(engine.check(&model(), &via_group, Consistency::Unspecified).await.unwrap());

        let outsider = key("user:dave", "reader", "pipeline:p1");
        assert!(!engine.check(&model(), &outsider, Consistency::Unspecified).await.unwrap());

        let objects = engine
            .list_objects(&model(), "user:carol", "reader", "pipeline", Consistency::Unspecified)
            .await
            .unwrap();
        assert_eq!(objects, vec!["pipeline:p1".to_string()]);
    }

    #[tokio::test]
    async fn test_query_cache_is_bypassed_by_higher_consistency() {
        let engine = InMemoryEngine::new().with_query_cache();
        let grant = key("user:alice", "reader", "pipeline:p1");

        assert!(!engine.check(&model(), &grant, Consistency::Unspecified).await.unwrap());
        engine.write(&model(), &[grant.clone()], &[]).await.unwrap();

        // Stale answer from the engine-side cache
        assert!(!engine.check(&model(), &grant, Consistency::Unspecified).await.unwrap());
        assert!(engine.check(&model(), &grant, Consistency::HigherConsistency).await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_type() {
        let engine = InMemoryEngine::new().with_types(&["user", "pipeline"]);
        let err = engine
            .check(&model(), &key("share_link:t1", "reader", "pipeline:p1"), Consistency::Unspecified)
            .await
            .unwrap_err();
        assert!(err.is_type_not_found());
    }
}
