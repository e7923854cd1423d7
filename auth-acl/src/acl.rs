use crate::{
    cache::{CacheKey, DecisionCache},
    client::{Route, TupleClient},
    config::{AclConfig, HeaderConfig},
    context::{AuthType, RequestContext},
    error::{AclError, EngineError, Result},
    models::*,
    pin::ConsistencyPinner,
    protocol::{EngineTransport, HttpTransport},
    store::{KeyValueStore, RedisStore},
};
use http::HeaderMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Wildcard grants that make a resource public
const PUBLIC_GRANTS: [(&str, &str); 3] = [
    ("user:*", relations::READER),
    ("visitor:*", relations::READER),
    ("user:*", relations::EXECUTOR),
];

const PUBLIC_SUBJECTS: [&str; 2] = ["user:*", "visitor:*"];

/// Whose pin decides how fresh a read has to be
#[derive(Debug, Clone, Copy)]
enum Freshness<'a> {
    /// The checked subject itself: a pinned subject reads from the primary
    /// with higher consistency
    Subject(&'a str),
    /// Only the caller's session: a pinned caller reads tuples from the
    /// primary
    Session(&'a str),
    /// Nobody in particular: wildcards, link codes and share tokens are
    /// never pinned, so their checks stay on the replica
    Any,
}

/// Permission front-end over the authorization engine.
///
/// Every permission question goes through the decision cache first; misses
/// are answered by the engine on the replica unless a pin says the subject
/// (or the caller) must read its own recent writes. Every write invalidates
/// the affected cache entries and pins the affected subjects before it
/// returns.
///
/// Operations are plain futures: dropping one cancels it, and each engine
/// request is bounded by the transport's configured timeout.
pub struct AclClient {
    client: TupleClient,
    cache: DecisionCache,
    pinner: ConsistencyPinner,
    headers: HeaderConfig,
}

impl AclClient {
    pub fn new(client: TupleClient, cache: DecisionCache, pinner: ConsistencyPinner) -> Self {
        Self {
            client,
            cache,
            pinner,
            headers: HeaderConfig::default(),
        }
    }

    /// Use custom request header names for [`AclClient::context_from_headers`]
    pub fn with_headers(mut self, headers: HeaderConfig) -> Self {
        self.headers = headers;
        self
    }

    /// Connect to the engine(s) and the Redis store described by `config`.
    ///
    /// Fails if the engine does not expose exactly one store with at least one
    /// authorization model, or if Redis is configured but unreachable.
    pub async fn from_config(config: &AclConfig) -> Result<Self> {
        config.validate()?;

        let timeout = config.openfga.request_timeout();
        let primary: Arc<dyn EngineTransport> = Arc::new(
            HttpTransport::new(&config.openfga.host, config.openfga.port, timeout)
                .map_err(|e| AclError::Configuration(e.to_string()))?,
        );

        let replica_config = &config.openfga.replica;
        let replica: Option<Arc<dyn EngineTransport>> = if replica_config.is_configured() {
            let transport = HttpTransport::new(&replica_config.host, replica_config.port, timeout)
                .map_err(|e| AclError::Configuration(e.to_string()))?;
            Some(Arc::new(transport))
        } else {
            None
        };

        let client = TupleClient::connect(primary, replica).await?;

        let store: Option<Arc<dyn KeyValueStore>> = match config.redis.url {
            Some(ref url) => {
                let redis = RedisStore::connect(url)
                    .await
                    .map_err(|e| AclError::Configuration(e.to_string()))?;
                Some(Arc::new(redis))
            }
            None => None,
        };

        let cache = match store {
            Some(ref store) if config.cache.enabled => {
                DecisionCache::new(store.clone(), config.cache.effective_ttl())
            }
            _ => DecisionCache::disabled(),
        };
        let pinner = ConsistencyPinner::new(store, replica_config.pin_time_frame());

        info!(
            "ACL client ready (replica: {}, cache: {}, pinning: {})",
            client.has_replica(),
            cache.is_enabled(),
            pinner.is_enabled()
        );

        Ok(Self::new(client, cache, pinner).with_headers(config.headers.clone()))
    }

    pub fn tuple_client(&self) -> &TupleClient {
        &self.client
    }

    pub fn cache(&self) -> &DecisionCache {
        &self.cache
    }

    pub fn pinner(&self) -> &ConsistencyPinner {
        &self.pinner
    }

    /// Extract the caller identity using the configured header names
    pub fn context_from_headers(&self, headers: &HeaderMap) -> RequestContext {
        RequestContext::from_headers(headers, &self.headers)
    }

    // =============================================================================
    // Permission Checks
    // =============================================================================

    /// Check whether the caller holds `relation` on the object
    pub async fn check_permission(
        &self,
        ctx: &RequestContext,
        object_type: &str,
        object_id: &str,
        relation: &str,
    ) -> Result<bool> {
        let subject = ctx.acting_subject()?;
        let object = ObjectRef::new(object_type, object_id);
        let freshness = match subject.pin_id() {
            Some(id) => Freshness::Subject(id),
            None => Freshness::Any,
        };
        self.check_subject(&subject, &object, relation, freshness).await
    }

    /// Check an explicit subject token (`type:id` or `type:id#relation`)
    pub async fn check_permission_for(
        &self,
        subject_token: &str,
        object_type: &str,
        object_id: &str,
        relation: &str,
    ) -> Result<bool> {
        let subject = SubjectRef::parse(subject_token)?;
        let object = ObjectRef::new(object_type, object_id);
        let freshness = match subject.pin_id() {
            Some(id) => Freshness::Subject(id),
            None => Freshness::Any,
        };
        self.check_subject(&subject, &object, relation, freshness).await
    }

    /// Whether every user may execute the object
    pub async fn check_public_executable(
        &self,
        object_type: &str,
        object_id: &str,
    ) -> Result<bool> {
        let object = ObjectRef::new(object_type, object_id);
        self.check_subject(
            &SubjectRef::wildcard(subject_types::USER),
            &object,
            relations::EXECUTOR,
            Freshness::Any,
        )
        .await
    }

    /// Check the shareable-link code carried by the request. No code means
    /// no access.
    pub async fn check_link_permission(
        &self,
        ctx: &RequestContext,
        object_type: &str,
        object_id: &str,
        relation: &str,
    ) -> Result<bool> {
        let Some(code) = ctx.share_code.as_deref().filter(|code| !code.is_empty()) else {
            return Ok(false);
        };
        let object = ObjectRef::new(object_type, object_id);
        self.check_token_subject(&SubjectRef::link_code(code), &object, relation)
            .await
    }

    /// Check a share token, given explicitly or taken from the request
    pub async fn check_share_link_permission(
        &self,
        ctx: &RequestContext,
        object_type: &str,
        object_id: &str,
        relation: &str,
        share_token: Option<&str>,
    ) -> Result<bool> {
        let token = share_token
            .or(ctx.share_token.as_deref())
            .filter(|token| !token.is_empty());
        let Some(token) = token else {
            return Ok(false);
        };
        let object = ObjectRef::new(object_type, object_id);
        self.check_token_subject(&SubjectRef::share_link(token), &object, relation)
            .await
    }

    /// Allow a user to act on behalf of an organization only if they are one
    /// of its members
    pub async fn check_requester_permission(&self, ctx: &RequestContext) -> Result<()> {
        let Some(requester) = ctx.requester_uid.as_deref().filter(|uid| !uid.is_empty()) else {
            return Ok(());
        };
        if ctx.auth_type != Some(AuthType::User) {
            return Ok(());
        }
        let user_uid = ctx
            .user_uid
            .as_deref()
            .ok_or_else(|| {
                AclError::Unauthenticated("user auth type without a user uid".to_string())
            })?;
        if requester == user_uid {
            return Ok(());
        }

        let member = self
            .check_subject(
                &SubjectRef::user(user_uid),
                &ObjectRef::new(subject_types::ORGANIZATION, requester),
                relations::MEMBER,
                Freshness::Subject(user_uid),
            )
            .await?;

        if member {
            Ok(())
        } else {
            Err(AclError::PermissionDenied(format!(
                "user {} is not a member of organization {}",
                user_uid, requester
            )))
        }
    }

    /// Ids of the objects of `object_type` the caller (or, for `is_public`,
    /// every user) holds `relation` on
    pub async fn list_permissions(
        &self,
        ctx: &RequestContext,
        object_type: &str,
        relation: &str,
        is_public: bool,
    ) -> Result<Vec<String>> {
        let subject = if is_public {
            SubjectRef::wildcard(subject_types::USER)
        } else {
            ctx.acting_subject()?
        };
        let freshness = match subject.pin_id() {
            Some(id) => Freshness::Subject(id),
            None => Freshness::Any,
        };
        let (route, consistency) = self.resolve_freshness(freshness).await;

        match self
            .client
            .list_objects(route, &subject, relation, object_type, consistency)
            .await
        {
            Ok(ids) => Ok(ids),
            Err(e) if e.is_type_not_found() => {
                debug!(
                    "Listing {} on {} for {}: type not in model",
                    relation, object_type, subject
                );
                Ok(Vec::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    // =============================================================================
    // Tuple Management
    // =============================================================================

    /// Record the owner of an object. A no-op when the object already has one.
    pub async fn set_owner(
        &self,
        ctx: &RequestContext,
        object_type: &str,
        object_id: &str,
        owner_type: &str,
        owner_id: &str,
    ) -> Result<()> {
        let object = ObjectRef::new(object_type, object_id);
        let owner = SubjectRef::new(singular_type(owner_type), owner_id);

        let filter = TupleFilter::object(&object).with_relation(relations::OWNER);
        let existing = self
            .client
            .read(Route::Primary, &filter, Consistency::HigherConsistency)
            .await?;
        if !existing.is_empty() {
            debug!("{} already has an owner, leaving it unchanged", object);
            return Ok(());
        }

        self.client
            .write(&[TupleKey::new(&owner, relations::OWNER, &object)])
            .await?;
        self.cache.invalidate(&owner, &object).await;
        self.pin_affected(ctx, [&owner]).await;
        Ok(())
    }

    pub async fn get_owner(
        &self,
        ctx: &RequestContext,
        object_type: &str,
        object_id: &str,
    ) -> Result<Owner> {
        let object = ObjectRef::new(object_type, object_id);
        let filter = TupleFilter::object(&object).with_relation(relations::OWNER);
        let (route, consistency) = self.resolve_freshness(session_freshness(ctx)).await;

        let tuples = self.client.read(route, &filter, consistency).await?;
        let tuple = tuples
            .first()
            .ok_or_else(|| AclError::NotFound(format!("owner of {}", object)))?;

        let owner = tuple.subject()?;
        Ok(Owner {
            owner_type: owner.subject_type,
            owner_id: owner.subject_id,
        })
    }

    /// Remove every tuple that references the object. Used when the object
    /// itself is deleted.
    pub async fn purge(
        &self,
        ctx: &RequestContext,
        object_type: &str,
        object_id: &str,
    ) -> Result<()> {
        let object = ObjectRef::new(object_type, object_id);
        let tuples = self
            .client
            .read(
                Route::Primary,
                &TupleFilter::object(&object),
                Consistency::HigherConsistency,
            )
            .await?;

        self.cache.invalidate_object(&object).await;
        if tuples.is_empty() {
            debug!("Nothing to purge for {}", object);
            return Ok(());
        }

        self.client.delete(&tuples).await?;
        // Drop anything re-cached while the delete was in flight
        self.cache.invalidate_object(&object).await;

        let subjects: Vec<SubjectRef> = tuples.iter().filter_map(|t| t.subject().ok()).collect();
        self.pin_affected(ctx, subjects.iter()).await;
        info!("Purged {} tuple(s) of {}", tuples.len(), object);
        Ok(())
    }

    /// Grant (`enable`) or revoke one relation for a subject token on an
    /// object. Other relations the subject holds are left alone.
    pub async fn set_resource_permission(
        &self,
        ctx: &RequestContext,
        object_type: &str,
        object_id: &str,
        subject_token: &str,
        relation: &str,
        enable: bool,
    ) -> Result<()> {
        let subject = SubjectRef::parse(subject_token)?;
        let object = ObjectRef::new(object_type, object_id);
        let key = TupleKey::new(&subject, relation, &object);

        if let Err(e) = self.client.delete(std::slice::from_ref(&key)).await {
            debug!("No existing tuple replaced for {}: {}", key, e);
        }
        if enable {
            self.client.write(std::slice::from_ref(&key)).await?;
        }

        self.cache.invalidate(&subject, &object).await;
        self.pin_affected(ctx, [&subject]).await;
        Ok(())
    }

    /// Revoke every standard role the subject holds on the object
    pub async fn delete_resource_permission(
        &self,
        ctx: &RequestContext,
        object_type: &str,
        object_id: &str,
        subject_token: &str,
    ) -> Result<()> {
        let subject = SubjectRef::parse(subject_token)?;
        let object = ObjectRef::new(object_type, object_id);

        for role in relations::STANDARD_ROLES {
            let key = TupleKey::new(&subject, role, &object);
            match self.client.delete(std::slice::from_ref(&key)).await {
                Ok(()) => debug!("Revoked {}", key),
                Err(EngineError::Unavailable(reason)) => {
                    warn!("Could not revoke {}: {}", key, reason)
                }
                Err(e) => debug!("Skipping {}: {}", key, e),
            }
        }

        self.cache.invalidate(&subject, &object).await;
        self.pin_affected(ctx, [&subject]).await;
        Ok(())
    }

    /// Make the object readable by every user and visitor, and executable by
    /// every user
    pub async fn set_public_permission(
        &self,
        ctx: &RequestContext,
        object_type: &str,
        object_id: &str,
    ) -> Result<()> {
        for (subject, relation) in PUBLIC_GRANTS {
            self.set_resource_permission(ctx, object_type, object_id, subject, relation, true)
                .await?;
        }
        Ok(())
    }

    pub async fn delete_public_permission(
        &self,
        ctx: &RequestContext,
        object_type: &str,
        object_id: &str,
    ) -> Result<()> {
        for subject in PUBLIC_SUBJECTS {
            self.delete_resource_permission(ctx, object_type, object_id, subject)
                .await?;
        }
        Ok(())
    }

    // =============================================================================
    // Internals
    // =============================================================================

    async fn check_subject(
        &self,
        subject: &SubjectRef,
        object: &ObjectRef,
        relation: &str,
        freshness: Freshness<'_>,
    ) -> Result<bool> {
        let key = CacheKey::new(subject, object, relation);
        if let Some(allowed) = self.cache.lookup(&key).await {
            return Ok(allowed);
        }

        let (route, consistency) = self.resolve_freshness(freshness).await;
        let allowed = self
            .client
            .check(route, subject, relation, object, consistency)
            .await?;

        self.cache.store(&key, allowed).await;
        Ok(allowed)
    }

    /// Link-code and share-token checks: a model without the token type
    /// denies instead of failing
    async fn check_token_subject(
        &self,
        subject: &SubjectRef,
        object: &ObjectRef,
        relation: &str,
    ) -> Result<bool> {
        match self
            .check_subject(subject, object, relation, Freshness::Any)
            .await
        {
            Err(AclError::Engine(e)) if e.is_type_not_found() => {
                debug!("{} is not a type in the model, denying", subject.subject_type);
                Ok(false)
            }
            other => other,
        }
    }

    async fn resolve_freshness(&self, freshness: Freshness<'_>) -> (Route, Consistency) {
        let pinned = match freshness {
            Freshness::Subject(id) | Freshness::Session(id) => self.pinner.is_pinned(id).await,
            Freshness::Any => false,
        };
        match freshness {
            Freshness::Subject(_) if pinned => (Route::Primary, Consistency::HigherConsistency),
            Freshness::Session(_) if pinned => (Route::Primary, Consistency::Unspecified),
            _ => (Route::Replica, Consistency::Unspecified),
        }
    }

    /// Pin every concrete subject affected by a write, plus the caller
    async fn pin_affected<'s>(
        &self,
        ctx: &RequestContext,
        subjects: impl IntoIterator<Item = &'s SubjectRef>,
    ) {
        let mut ids: BTreeSet<&str> = subjects
            .into_iter()
            .filter_map(SubjectRef::pin_id)
            .collect();
        if let Some(caller) = ctx.routing_id() {
            ids.insert(caller);
        }
        for id in ids {
            self.pinner.pin(id).await;
        }
    }
}

fn session_freshness(ctx: &RequestContext) -> Freshness<'_> {
    match ctx.routing_id() {
        Some(id) => Freshness::Session(id),
        None => Freshness::Any,
    }
}
