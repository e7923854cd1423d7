//! Permission Workflow Tests
//!
//! These tests drive the ACL client against an in-memory engine whose primary
//! keeps an internal query cache and whose replica only catches up when told
//! to, with an in-memory store holding cached decisions and pins:
//! 1. Ownership assignment
//! 2. Read-after-write under replica lag
//! 3. Decision caching and invalidation
//! 4. Public access through wildcards
//! 5. Link and share-token access
//! 6. Organization impersonation
//! 7. Purge and listing
//! 8. Outages

#![allow(clippy::unwrap_used)]

use auth_acl::protocol::InMemoryEngine;
use auth_acl::store::InMemoryStore;
use auth_acl::*;
use http::{HeaderMap, HeaderValue};
use std::sync::Arc;
use std::time::Duration;

struct Deployment {
    acl: AclClient,
    primary: Arc<InMemoryEngine>,
    replica: Arc<InMemoryEngine>,
    store: Arc<InMemoryStore>,
}

impl Deployment {
    /// Let the replica catch up with the primary
    fn replicate(&self) {
        self.replica.sync_from(&self.primary);
    }
}

async fn deploy(engine: InMemoryEngine) -> Deployment {
    deploy_with_pin_frame(engine, Some(Duration::from_secs(5))).await
}

async fn deploy_with_pin_frame(engine: InMemoryEngine, pin_frame: Option<Duration>) -> Deployment {
    let primary = Arc::new(engine.with_query_cache());
    let replica = Arc::new(primary.replica());
    let store = Arc::new(InMemoryStore::new());

    let client = TupleClient::connect(primary.clone(), Some(replica.clone()))
        .await
        .unwrap();
    let cache = DecisionCache::new(store.clone(), Duration::from_secs(60));
    let pinner = ConsistencyPinner::new(Some(store.clone()), pin_frame);

    Deployment {
        acl: AclClient::new(client, cache, pinner),
        primary,
        replica,
        store,
    }
}

fn tuple(subject: &str, relation: &str, object: &str) -> TupleKey {
    TupleKey::new(
        &SubjectRef::parse(subject).unwrap(),
        relation,
        &ObjectRef::parse(object).unwrap(),
    )
}

// ============================================================================
// TEST 1: Ownership
// ============================================================================

#[tokio::test]
async fn test_set_owner_keeps_the_first_owner() {
    let d = deploy(InMemoryEngine::new()).await;
    let alice = RequestContext::user("alice");

    d.acl.set_owner(&alice, "pipeline", "p1", "users", "alice").await.unwrap();
    d.acl.set_owner(&alice, "pipeline", "p1", "users", "alice").await.unwrap();
    d.acl
        .set_owner(&RequestContext::user("bob"), "pipeline", "p1", "users", "bob")
        .await
        .unwrap();

    assert_eq!(d.primary.tuple_count(), 1);
    assert!(d.primary.contains(&tuple("user:alice", "owner", "pipeline:p1")));

    // alice was pinned by the write, so the read sees it before replication
    let owner = d.acl.get_owner(&alice, "pipeline", "p1").await.unwrap();
    assert_eq!(
        owner,
        Owner {
            owner_type: "user".to_string(),
            owner_id: "alice".to_string(),
        }
    );
}

#[tokio::test]
async fn test_get_owner_errors() {
    let d = deploy(InMemoryEngine::new()).await;
    let ctx = RequestContext::anonymous();

    let err = d.acl.get_owner(&ctx, "pipeline", "missing").await.unwrap_err();
    assert!(err.is_not_found());

    d.primary.seed(TupleKey {
        user: "alice".to_string(),
        relation: "owner".to_string(),
        object: "pipeline:p2".to_string(),
    });
    d.replicate();
    let err = d.acl.get_owner(&ctx, "pipeline", "p2").await.unwrap_err();
    assert!(matches!(err, AclError::MalformedSubject(_)));
}

// ============================================================================
// TEST 2: Read-After-Write
// ============================================================================

#[tokio::test]
async fn test_grant_is_visible_immediately_despite_cached_denial() {
    let d = deploy(InMemoryEngine::new()).await;
    let owner = RequestContext::user("owner");
    let u2 = RequestContext::user("u2");
    let p1 = ObjectRef::new("pipeline", "p1");

    // Warm every layer with a denial: the decision cache, the replica and
    // the query cache of the primary
    assert!(!d.acl.check_permission(&u2, "pipeline", "p1", "reader").await.unwrap());
    let denied = d
        .acl
        .tuple_client()
        .check(Route::Primary, &SubjectRef::user("u2"), "reader", &p1, Consistency::Unspecified)
        .await
        .unwrap();
    assert!(!denied);

    d.acl
        .set_resource_permission(&owner, "pipeline", "p1", "user:u2", "reader", true)
        .await
        .unwrap();

    // The grantee is pinned, not only the granter
    assert!(d.acl.pinner().is_pinned("u2").await);
    assert!(d.acl.pinner().is_pinned("owner").await);

    // The replica has not caught up
    assert!(d.acl.check_permission(&u2, "pipeline", "p1", "reader").await.unwrap());
}

#[tokio::test]
async fn test_without_pinning_replica_lag_is_visible() {
    let d = deploy_with_pin_frame(InMemoryEngine::new(), None).await;
    let owner = RequestContext::user("owner");
    let u2 = RequestContext::user("u2");

    d.acl
        .set_resource_permission(&owner, "pipeline", "p1", "user:u2", "reader", true)
        .await
        .unwrap();
    assert!(!d.acl.pinner().is_pinned("u2").await);

    // Served by the lagging replica; the stale answer is cached until the next write
    assert!(!d.acl.check_permission(&u2, "pipeline", "p1", "reader").await.unwrap());

    d.replicate();
    d.acl.cache().invalidate_object(&ObjectRef::new("pipeline", "p1")).await;
    assert!(d.acl.check_permission(&u2, "pipeline", "p1", "reader").await.unwrap());
}

#[tokio::test]
async fn test_pins_expire_after_time_frame() {
    let d = deploy_with_pin_frame(InMemoryEngine::new(), Some(Duration::from_millis(50))).await;
    let owner = RequestContext::user("owner");

    d.acl
        .set_resource_permission(&owner, "pipeline", "p1", "user:u2", "reader", true)
        .await
        .unwrap();
    assert!(d.acl.pinner().is_pinned("u2").await);

    tokio::time::sleep(Duration::from_millis(80)).await;
    assert!(!d.acl.pinner().is_pinned("u2").await);
}

// ============================================================================
// TEST 3: Decision Cache
// ============================================================================

#[tokio::test]
async fn test_repeated_checks_are_served_from_cache() {
    let d = deploy(InMemoryEngine::new()).await;
    let u1 = RequestContext::user("u1");
    d.primary.seed(tuple("user:u1", "reader", "pipeline:p1"));
    d.replicate();

    assert!(d.acl.check_permission(&u1, "pipeline", "p1", "reader").await.unwrap());
    assert!(d.acl.check_permission(&u1, "pipeline", "p1", "reader").await.unwrap());

    assert_eq!(d.replica.check_calls(), 1);
    assert_eq!(d.primary.check_calls(), 0);

    let key = CacheKey::new(&SubjectRef::user("u1"), &ObjectRef::new("pipeline", "p1"), "reader");
    assert_eq!(d.acl.cache().lookup(&key).await, Some(true));
}

#[tokio::test]
async fn test_revoke_invalidates_cached_grant() {
    let d = deploy(InMemoryEngine::new()).await;
    let owner = RequestContext::user("owner");
    let u1 = RequestContext::user("u1");

    d.acl
        .set_resource_permission(&owner, "pipeline", "p1", "user:u1", "writer", true)
        .await
        .unwrap();
    assert!(d.acl.check_permission(&u1, "pipeline", "p1", "writer").await.unwrap());

    d.acl
        .set_resource_permission(&owner, "pipeline", "p1", "user:u1", "writer", false)
        .await
        .unwrap();
    assert!(!d.acl.check_permission(&u1, "pipeline", "p1", "writer").await.unwrap());
    assert_eq!(d.primary.tuple_count(), 0);
}

#[tokio::test]
async fn test_set_permission_leaves_other_relations() {
    let d = deploy(InMemoryEngine::new()).await;
    let owner = RequestContext::user("owner");
    let u1 = RequestContext::user("u1");

    for relation in ["reader", "executor"] {
        d.acl
            .set_resource_permission(&owner, "pipeline", "p1", "user:u1", relation, true)
            .await
            .unwrap();
    }
    // Granting the same relation twice replaces the tuple instead of failing
    d.acl
        .set_resource_permission(&owner, "pipeline", "p1", "user:u1", "reader", true)
        .await
        .unwrap();

    assert_eq!(d.primary.tuple_count(), 2);
    assert!(d.acl.check_permission(&u1, "pipeline", "p1", "executor").await.unwrap());
    assert!(d.acl.check_permission(&u1, "pipeline", "p1", "reader").await.unwrap());
}

#[tokio::test]
async fn test_delete_resource_permission_revokes_every_role() {
    let d = deploy(InMemoryEngine::new()).await;
    let owner = RequestContext::user("owner");
    let u1 = RequestContext::user("u1");

    for relation in ["admin", "reader"] {
        d.acl
            .set_resource_permission(&owner, "pipeline", "p1", "user:u1", relation, true)
            .await
            .unwrap();
        assert!(d.acl.check_permission(&u1, "pipeline", "p1", relation).await.unwrap());
    }

    // writer and executor were never granted; their failures are skipped
    d.acl
        .delete_resource_permission(&owner, "pipeline", "p1", "user:u1")
        .await
        .unwrap();

    assert_eq!(d.primary.tuple_count(), 0);
    for relation in ["admin", "writer", "executor", "reader"] {
        assert!(!d.acl.check_permission(&u1, "pipeline", "p1", relation).await.unwrap());
    }
}

#[tokio::test]
async fn test_writes_only_invalidate_their_object() {
    let d = deploy(InMemoryEngine::new()).await;
    let owner = RequestContext::user("owner");
    let u1 = RequestContext::user("u1");

    assert!(!d.acl.check_permission(&u1, "pipeline", "p2", "reader").await.unwrap());
    assert!(!d.acl.check_permission(&u1, "pipeline", "p1", "reader").await.unwrap());

    d.acl
        .set_resource_permission(&owner, "pipeline", "p1", "user:u1", "reader", true)
        .await
        .unwrap();

    let p1 = CacheKey::new(&SubjectRef::user("u1"), &ObjectRef::new("pipeline", "p1"), "reader");
    let p2 = CacheKey::new(&SubjectRef::user("u1"), &ObjectRef::new("pipeline", "p2"), "reader");
    assert_eq!(d.acl.cache().lookup(&p1).await, None);
    assert_eq!(d.acl.cache().lookup(&p2).await, Some(false));
}

#[tokio::test]
async fn test_one_write_invalidates_every_cached_decision_of_the_object() {
    let d = deploy(InMemoryEngine::new()).await;
    let owner = RequestContext::user("owner");
    let users = 300;

    for i in 0..users {
        let ctx = RequestContext::user(&format!("u{}", i));
        assert!(!d.acl.check_permission(&ctx, "pipeline", "p1", "reader").await.unwrap());
    }
    assert_eq!(d.store.len(), users);

    d.acl
        .set_resource_permission(&owner, "pipeline", "p1", "user:*", "reader", true)
        .await
        .unwrap();
    d.replicate();

    for i in 0..users {
        let subject = SubjectRef::user(&format!("u{}", i));
        let key = CacheKey::new(&subject, &ObjectRef::new("pipeline", "p1"), "reader");
        assert_eq!(d.acl.cache().lookup(&key).await, None, "u{} kept a stale decision", i);
    }
    assert!(d
        .acl
        .check_permission(&RequestContext::user("u250"), "pipeline", "p1", "reader")
        .await
        .unwrap());
}

#[tokio::test]
async fn test_malformed_subject_token_is_rejected() {
    let d = deploy(InMemoryEngine::new()).await;
    let owner = RequestContext::user("owner");

    let err = d
        .acl
        .set_resource_permission(&owner, "pipeline", "p1", "u1", "reader", true)
        .await
        .unwrap_err();
    assert!(matches!(err, AclError::MalformedSubject(_)));
    assert_eq!(d.primary.tuple_count(), 0);
}

// ============================================================================
// TEST 4: Public Access
// ============================================================================

#[tokio::test]
async fn test_public_permission_uses_wildcards() {
    let d = deploy(InMemoryEngine::new()).await;
    let owner = RequestContext::user("owner");
    let visitor = RequestContext::visitor("v1");

    assert!(!d.acl.check_public_executable("pipeline", "p1").await.unwrap());

    d.acl.set_public_permission(&owner, "pipeline", "p1").await.unwrap();
    d.replicate();

    assert!(d.primary.contains(&tuple("user:*", "reader", "pipeline:p1")));
    assert!(d.primary.contains(&tuple("user:*", "executor", "pipeline:p1")));
    assert!(d.primary.contains(&tuple("visitor:*", "reader", "pipeline:p1")));
    assert_eq!(d.primary.tuple_count(), 3);

    // The cached denial under the wildcard key was invalidated
    assert!(d.acl.check_public_executable("pipeline", "p1").await.unwrap());
    assert!(d.acl.check_permission(&visitor, "pipeline", "p1", "reader").await.unwrap());
    assert!(!d.acl.check_permission(&visitor, "pipeline", "p1", "executor").await.unwrap());
    assert!(d
        .acl
        .check_permission(&RequestContext::user("anyone"), "pipeline", "p1", "executor")
        .await
        .unwrap());

    // Wildcards are never pinned
    assert!(!d.acl.pinner().is_pinned("*").await);

    d.acl.delete_public_permission(&owner, "pipeline", "p1").await.unwrap();
    d.replicate();

    assert_eq!(d.primary.tuple_count(), 0);
    assert!(!d.acl.check_public_executable("pipeline", "p1").await.unwrap());
    assert!(!d.acl.check_permission(&visitor, "pipeline", "p1", "reader").await.unwrap());
}

#[tokio::test]
async fn test_userset_grants() {
    let d = deploy(InMemoryEngine::new()).await;
    let owner = RequestContext::user("owner");
    d.primary.seed(tuple("user:u1", "member", "group:g1"));

    d.acl
        .set_resource_permission(&owner, "pipeline", "p1", "group:g1#member", "reader", true)
        .await
        .unwrap();
    d.replicate();

    assert!(d
        .acl
        .check_permission_for("group:g1#member", "pipeline", "p1", "reader")
        .await
        .unwrap());
    assert!(d
        .acl
        .check_permission(&RequestContext::user("u1"), "pipeline", "p1", "reader")
        .await
        .unwrap());
    assert!(!d
        .acl
        .check_permission(&RequestContext::user("u2"), "pipeline", "p1", "reader")
        .await
        .unwrap());
}

#[tokio::test]
async fn test_userset_grant_is_visible_immediately() {
    let d = deploy(InMemoryEngine::new()).await;
    let owner = RequestContext::user("owner");

    // Warm the decision cache and the primary's query cache with a denial
    assert!(!d
        .acl
        .check_permission_for("group:g1#member", "pipeline", "p1", "reader")
        .await
        .unwrap());
    let denied = d
        .acl
        .tuple_client()
        .check(
            Route::Primary,
            &SubjectRef::userset("group", "g1", "member"),
            "reader",
            &ObjectRef::new("pipeline", "p1"),
            Consistency::Unspecified,
        )
        .await
        .unwrap();
    assert!(!denied);

    d.acl
        .set_resource_permission(&owner, "pipeline", "p1", "group:g1#member", "reader", true)
        .await
        .unwrap();
    assert!(d.acl.pinner().is_pinned("g1").await);

    // The replica has not caught up
    assert!(d
        .acl
        .check_permission_for("group:g1#member", "pipeline", "p1", "reader")
        .await
        .unwrap());
}

// ============================================================================
// TEST 5: Links and Share Tokens
// ============================================================================

#[tokio::test]
async fn test_link_code_grants_access() {
    let d = deploy(InMemoryEngine::new()).await;
    let owner = RequestContext::user("owner");

    d.acl
        .set_resource_permission(&owner, "pipeline", "p1", "code:abc", "reader", true)
        .await
        .unwrap();
    d.replicate();

    let with_code = RequestContext::visitor("v1").with_share_code("abc");
    let wrong_code = RequestContext::visitor("v1").with_share_code("xyz");
    let without_code = RequestContext::visitor("v1");

    assert!(d.acl.check_link_permission(&with_code, "pipeline", "p1", "reader").await.unwrap());
    assert!(!d.acl.check_link_permission(&with_code, "pipeline", "p1", "writer").await.unwrap());
    assert!(!d.acl.check_link_permission(&wrong_code, "pipeline", "p1", "reader").await.unwrap());
    assert!(!d.acl.check_link_permission(&without_code, "pipeline", "p1", "reader").await.unwrap());
}

#[tokio::test]
async fn test_share_token_from_argument_or_request() {
    let d = deploy(InMemoryEngine::new()).await;
    let owner = RequestContext::user("owner");

    d.acl
        .set_resource_permission(&owner, "pipeline", "p1", "share_link:tok1", "reader", true)
        .await
        .unwrap();
    d.replicate();

    let anonymous = RequestContext::anonymous();
    let carrying = RequestContext::anonymous().with_share_token("tok1");

    assert!(d
        .acl
        .check_share_link_permission(&anonymous, "pipeline", "p1", "reader", Some("tok1"))
        .await
        .unwrap());
    assert!(d
        .acl
        .check_share_link_permission(&carrying, "pipeline", "p1", "reader", None)
        .await
        .unwrap());
    assert!(!d
        .acl
        .check_share_link_permission(&anonymous, "pipeline", "p1", "reader", None)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_unmodeled_types_deny_instead_of_failing() {
    let engine = InMemoryEngine::new().with_types(&["user", "visitor", "pipeline"]);
    let d = deploy(engine).await;
    let ctx = RequestContext::user("u1").with_share_code("abc").with_share_token("tok1");

    assert!(!d.acl.check_link_permission(&ctx, "pipeline", "p1", "reader").await.unwrap());
    assert!(!d
        .acl
        .check_share_link_permission(&ctx, "pipeline", "p1", "reader", None)
        .await
        .unwrap());
    assert!(d
        .acl
        .list_permissions(&ctx, "dashboard", "reader", false)
        .await
        .unwrap()
        .is_empty());

    // A regular check on an unknown type is still an error
    let err = d.acl.check_permission(&ctx, "dashboard", "d1", "reader").await.unwrap_err();
    assert!(matches!(err, AclError::Engine(_)));
}

// ============================================================================
// TEST 6: Organization Impersonation
// ============================================================================

#[tokio::test]
async fn test_requester_must_be_organization_member() {
    let d = deploy(InMemoryEngine::new()).await;
    d.primary.seed(tuple("user:alice", "member", "organization:acme"));
    d.replicate();

    let alice = RequestContext::user("alice").with_requester("acme");
    d.acl.check_requester_permission(&alice).await.unwrap();

    let bob = RequestContext::user("bob").with_requester("acme");
    let err = d.acl.check_requester_permission(&bob).await.unwrap_err();
    assert!(err.is_permission_denied());

    // Acting as yourself, or without a requester, needs no membership
    d.acl
        .check_requester_permission(&RequestContext::user("bob").with_requester("bob"))
        .await
        .unwrap();
    d.acl
        .check_requester_permission(&RequestContext::user("bob"))
        .await
        .unwrap();
    // Only authenticated users impersonate
    d.acl
        .check_requester_permission(&RequestContext::visitor("v1").with_requester("acme"))
        .await
        .unwrap();
}

// ============================================================================
// TEST 7: Purge and Listing
// ============================================================================

#[tokio::test]
async fn test_purge_removes_every_tuple_of_the_object() {
    let d = deploy(InMemoryEngine::new()).await;
    let owner = RequestContext::user("owner");
    let u1 = RequestContext::user("u1");

    d.acl.set_owner(&owner, "pipeline", "p1", "users", "owner").await.unwrap();
    d.acl
        .set_resource_permission(&owner, "pipeline", "p1", "user:u1", "reader", true)
        .await
        .unwrap();
    d.acl.set_public_permission(&owner, "pipeline", "p1").await.unwrap();
    d.acl
        .set_resource_permission(&owner, "pipeline", "p2", "user:u1", "reader", true)
        .await
        .unwrap();
    assert!(d.acl.check_permission(&u1, "pipeline", "p1", "reader").await.unwrap());

    d.acl.purge(&owner, "pipeline", "p1").await.unwrap();

    assert_eq!(d.primary.tuple_count(), 1);
    assert!(d.primary.contains(&tuple("user:u1", "reader", "pipeline:p2")));
    assert!(!d.acl.check_permission(&u1, "pipeline", "p1", "reader").await.unwrap());
    assert!(d.acl.get_owner(&owner, "pipeline", "p1").await.unwrap_err().is_not_found());

    // Nothing left to purge
    d.acl.purge(&owner, "pipeline", "p1").await.unwrap();
}

#[tokio::test]
async fn test_purge_handles_more_tuples_than_one_write() {
    let d = deploy(InMemoryEngine::new()).await;
    for i in 0..250 {
        d.primary.seed(tuple(&format!("user:u{}", i), "reader", "pipeline:big"));
    }

    d.acl.purge(&RequestContext::user("owner"), "pipeline", "big").await.unwrap();
    assert_eq!(d.primary.tuple_count(), 0);
}

#[tokio::test]
async fn test_list_permissions() {
    let d = deploy(InMemoryEngine::new()).await;
    let owner = RequestContext::user("owner");
    let u1 = RequestContext::user("u1");

    for id in ["p1", "p2"] {
        d.acl
            .set_resource_permission(&owner, "pipeline", id, "user:u1", "reader", true)
            .await
            .unwrap();
    }
    d.acl.set_public_permission(&owner, "pipeline", "p4").await.unwrap();
    d.replicate();

    let mine = d.acl.list_permissions(&u1, "pipeline", "reader", false).await.unwrap();
    assert_eq!(mine, vec!["p1", "p2", "p4"]);

    let public = d.acl.list_permissions(&u1, "pipeline", "executor", true).await.unwrap();
    assert_eq!(public, vec!["p4"]);
}

// ============================================================================
// TEST 8: Identity and Outages
// ============================================================================

#[tokio::test]
async fn test_missing_identity_is_unauthenticated() {
    let d = deploy(InMemoryEngine::new()).await;
    let anonymous = RequestContext::anonymous();

    let err = d.acl.check_permission(&anonymous, "pipeline", "p1", "reader").await.unwrap_err();
    assert!(err.is_unauthenticated());

    let err = d.acl.list_permissions(&anonymous, "pipeline", "reader", false).await.unwrap_err();
    assert!(err.is_unauthenticated());
}

#[tokio::test]
async fn test_identity_from_headers() {
    let d = deploy(InMemoryEngine::new()).await;
    d.primary.seed(tuple("visitor:v7", "reader", "pipeline:p1"));
    d.replicate();

    let mut headers = HeaderMap::new();
    headers.insert("x-auth-type", HeaderValue::from_static("visitor"));
    headers.insert("x-visitor-uid", HeaderValue::from_static("v7"));

    let ctx = d.acl.context_from_headers(&headers);
    assert!(d.acl.check_permission(&ctx, "pipeline", "p1", "reader").await.unwrap());
}

#[tokio::test]
async fn test_store_outage_fails_open() {
    let d = deploy(InMemoryEngine::new()).await;
    let owner = RequestContext::user("owner");
    let u2 = RequestContext::user("u2");

    d.store.set_unavailable(true);

    d.acl
        .set_resource_permission(&owner, "pipeline", "p1", "user:u2", "reader", true)
        .await
        .unwrap();
    // The pin could not be written, but an unreadable pin routes to the primary
    assert!(d.acl.check_permission(&u2, "pipeline", "p1", "reader").await.unwrap());
    assert!(!d.acl.check_permission(&u2, "pipeline", "p1", "writer").await.unwrap());
}

#[tokio::test]
async fn test_engine_outage_fails_closed() {
    let d = deploy(InMemoryEngine::new()).await;
    let u1 = RequestContext::user("u1");
    d.primary.seed(tuple("user:u1", "reader", "pipeline:p1"));
    d.replicate();

    d.primary.set_unavailable(true);
    d.replica.set_unavailable(true);

    let err = d.acl.check_permission(&u1, "pipeline", "p1", "reader").await.unwrap_err();
    assert!(matches!(err, AclError::EngineUnavailable(_)));
    assert!(d.store.is_empty());

    let err = d
        .acl
        .set_resource_permission(&RequestContext::user("owner"), "pipeline", "p1", "user:u2", "reader", true)
        .await
        .unwrap_err();
    assert!(matches!(err, AclError::EngineUnavailable(_)));

    // A replica outage alone is absorbed by the primary
    d.primary.set_unavailable(false);
    assert!(d.acl.check_permission(&u1, "pipeline", "p1", "reader").await.unwrap());
}
