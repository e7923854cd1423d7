use crate::{
    error::{AclError, EngineError},
    models::*,
    protocol::EngineTransport,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The engine rejects write requests carrying more tuple keys than this
pub const MAX_TUPLES_PER_WRITE: usize = 100;

/// Which connection a read should be served from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Primary,
    Replica,
}

/// Typed client over the primary and (optional) replica engine connections.
///
/// The store and model identifiers are resolved once in [`TupleClient::connect`]
/// and stay fixed for the life of the client; picking up a new model means
/// building a new client.
pub struct TupleClient {
    primary: Arc<dyn EngineTransport>,
    replica: Option<Arc<dyn EngineTransport>>,
    model: AuthorizationModel,
}

/// Run a read against the routed connection. A replica that cannot be
/// reached falls back to the primary once.
macro_rules! routed {
    ($client:expr, $route:expr, $op:literal, |$conn:ident| $call:expr) => {{
        match $client.replica_for($route) {
            Some($conn) => match $call.await {
                Err(EngineError::Unavailable(replica_reason)) => {
                    warn!("Replica unavailable for {}, using primary: {}", $op, replica_reason);
                    let $conn = $client.primary.as_ref();
                    $call.await.map_err(|err| neither_responded(err, &replica_reason))
                }
                other => other,
            },
            None => {
                let $conn = $client.primary.as_ref();
                $call.await
            }
        }
    }};
}

impl TupleClient {
    /// Discover the store and its latest model on the primary connection.
    ///
    /// Exactly one store must exist and it must hold at least one model;
    /// anything else is a deployment error reported as
    /// [`AclError::Configuration`].
    pub async fn connect(
        primary: Arc<dyn EngineTransport>,
        replica: Option<Arc<dyn EngineTransport>>,
    ) -> Result<Self, AclError> {
        let model = resolve_model(primary.as_ref()).await?;
        info!(
            "Resolved authorization model {} in store {}",
            model.model_id, model.store_id
        );
        Ok(Self::with_model(primary, replica, model))
    }

    /// Build a client for an already-resolved model
    pub fn with_model(
        primary: Arc<dyn EngineTransport>,
        replica: Option<Arc<dyn EngineTransport>>,
        model: AuthorizationModel,
    ) -> Self {
        Self { primary, replica, model }
    }

    pub fn model(&self) -> &AuthorizationModel {
        &self.model
    }

    pub fn has_replica(&self) -> bool {
        self.replica.is_some()
    }

    fn replica_for(&self, route: Route) -> Option<&dyn EngineTransport> {
        match route {
            Route::Replica => self.replica.as_deref(),
            Route::Primary => None,
        }
    }

    pub async fn check(
        &self,
        route: Route,
        subject: &SubjectRef,
        relation: &str,
        object: &ObjectRef,
        consistency: Consistency,
    ) -> Result<bool, EngineError> {
        let key = TupleKey::new(subject, relation, object);
        debug!("Check {} on {:?} ({:?})", key, route, consistency);
        routed!(self, route, "check", |conn| conn.check(&self.model, &key, consistency))
    }

    pub async fn read(
        &self,
        route: Route,
        filter: &TupleFilter,
        consistency: Consistency,
    ) -> Result<Vec<TupleKey>, EngineError> {
        routed!(self, route, "read", |conn| conn.read(&self.model, filter, consistency))
    }

    /// Object ids (without the type prefix) of `object_type` on which the
    /// subject holds `relation`
    pub async fn list_objects(
        &self,
        route: Route,
        subject: &SubjectRef,
        relation: &str,
        object_type: &str,
        consistency: Consistency,
    ) -> Result<Vec<String>, EngineError> {
        let user = subject.to_string();
        let objects = routed!(self, route, "list_objects", |conn| conn
            .list_objects(&self.model, &user, relation, object_type, consistency))?;

        let prefix = format!("{}:", object_type);
        Ok(objects
            .into_iter()
            .map(|object| match object.strip_prefix(&prefix) {
                Some(id) => id.to_string(),
                None => object,
            })
            .collect())
    }

    /// Write tuples on the primary, in batches the engine accepts
    pub async fn write(&self, tuples: &[TupleKey]) -> Result<(), EngineError> {
        for batch in tuples.chunks(MAX_TUPLES_PER_WRITE) {
            info!(
                "Writing {} tuple(s), first: {}",
                batch.len(),
                batch.first().map(ToString::to_string).unwrap_or_default()
            );
            self.primary.write(&self.model, batch, &[]).await?;
        }
        Ok(())
    }

    /// Delete tuples on the primary, in batches the engine accepts
    pub async fn delete(&self, tuples: &[TupleKey]) -> Result<(), EngineError> {
        for batch in tuples.chunks(MAX_TUPLES_PER_WRITE) {
            info!(
                "Deleting {} tuple(s), first: {}",
                batch.len(),
                batch.first().map(ToString::to_string).unwrap_or_default()
            );
            self.primary.write(&self.model, &[], batch).await?;
        }
        Ok(())
    }
}

fn neither_responded(primary_err: EngineError, replica_reason: &str) -> EngineError {
    match primary_err {
        EngineError::Unavailable(primary_reason) => EngineError::Unavailable(format!(
            "neither connection responded (primary: {}; replica: {})",
            primary_reason, replica_reason
        )),
        other => other,
    }
}

/// Locate the single store and its most recently created model
pub async fn resolve_model(primary: &dyn EngineTransport) -> Result<AuthorizationModel, AclError> {
    let stores = primary.list_stores().await?;
    let store = match stores.as_slice() {
        [store] => store,
        [] => {
            return Err(AclError::Configuration(
                "no store found in the authorization engine".to_string(),
            ))
        }
        many => {
            return Err(AclError::Configuration(format!(
                "expected exactly one store in the authorization engine, found {}",
                many.len()
            )))
        }
    };

    // Model ids are ULIDs, which sort by creation time
    let model_id = primary
        .read_authorization_models(&store.id)
        .await?
        .into_iter()
        .max()
        .ok_or_else(|| {
            AclError::Configuration(format!("no authorization model found in store {}", store.id))
        })?;

    Ok(AuthorizationModel {
        store_id: store.id.clone(),
        model_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::InMemoryEngine;

    #[tokio::test]
    async fn test_connect_picks_latest_model() {
        let engine = InMemoryEngine::new().with_models(vec![
            "01HAAAAAAAAAAAAAAAAAAAAAAA".to_string(),
            "01HCCCCCCCCCCCCCCCCCCCCCCC".to_string(),
            "01HBBBBBBBBBBBBBBBBBBBBBBB".to_string(),
        ]);
        let client = TupleClient::connect(Arc::new(engine), None).await.unwrap();
        assert_eq!(client.model().model_id, "01HCCCCCCCCCCCCCCCCCCCCCCC");
    }

    #[tokio::test]
    async fn test_connect_requires_exactly_one_store() {
        let none = InMemoryEngine::new().with_stores(vec![]);
        let err = TupleClient::connect(Arc::new(none), None).await.err().unwrap();
        assert!(matches!(err, AclError::Configuration(_)));

        let two = InMemoryEngine::new().with_stores(vec![
            StoreInfo { id: "s1".to_string(), name: "a".to_string() },
            StoreInfo { id: "s2".to_string(), name: "b".to_string() },
        ]);
        let err = TupleClient::connect(Arc::new(two), None).await.err().unwrap();
        assert!(matches!(err, AclError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_connect_requires_a_model() {
        let engine = InMemoryEngine::new().with_models(vec![]);
        let err = TupleClient::connect(Arc::new(engine), None).await.err().unwrap();
        assert!(matches!(err, AclError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_replica_outage_falls_back_to_primary() {
        let primary = Arc::new(InMemoryEngine::new());
        let replica = Arc::new(primary.replica());
        replica.set_unavailable(true);

        let client = TupleClient::connect(primary.clone(), Some(replica.clone())).await.unwrap();
        let object = ObjectRef::new("pipeline", "p1");
        let subject = SubjectRef::user("u1");
        client
            .write(&[TupleKey::new(&subject, relations::READER, &object)])
            .await
            .unwrap();

        let allowed = client
            .check(Route::Replica, &subject, relations::READER, &object, Consistency::Unspecified)
            .await
            .unwrap();
        assert!(allowed);

        primary.set_unavailable(true);
        let err = client
            .check(Route::Replica, &subject, relations::READER, &object, Consistency::Unspecified)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_large_deletes_are_batched() {
        let primary = Arc::new(InMemoryEngine::new());
        let client = TupleClient::connect(primary.clone(), None).await.unwrap();
        let object = ObjectRef::new("pipeline", "p1");
        let tuples: Vec<TupleKey> = (0..(MAX_TUPLES_PER_WRITE * 2 + 1))
            .map(|i| TupleKey::new(&SubjectRef::user(&format!("u{}", i)), relations::READER, &object))
            .collect();

        client.write(&tuples).await.unwrap();
        assert_eq!(primary.tuple_count(), tuples.len());

        client.delete(&tuples).await.unwrap();
        assert_eq!(primary.tuple_count(), 0);
    }

    #[tokio::test]
    async fn test_list_objects_strips_type_prefix() {
        let primary = Arc::new(InMemoryEngine::new());
        let client = TupleClient::connect(primary.clone(), None).await.unwrap();
        primary.seed(TupleKey::new(&SubjectRef::user("u1"), relations::READER, &ObjectRef::new("pipeline", "p1")));

        let ids = client
            .list_objects(Route::Primary, &SubjectRef::user("u1"), relations::READER, "pipeline", Consistency::Unspecified)
            .await
            .unwrap();
        assert_eq!(ids, vec!["p1".to_string()]);
    }
}
