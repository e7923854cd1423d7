//! Relationship-based permission checks for RustCare services
//!
//! This crate fronts an OpenFGA-compatible authorization engine and provides:
//! - Typed tuple reads, writes and checks over a primary and an optional replica
//! - A TTL-bounded decision cache with pattern invalidation on every write
//! - Read-after-write pinning, so a subject whose permissions just changed is
//!   answered by the primary until the replica has caught up
//! - Ownership, sharing, public-access and organization-impersonation rules
//!   on top of the raw engine
//!
//! # Core Concepts
//!
//! - **Object**: A protected resource, `type:id` (e.g. `pipeline:p1`)
//! - **Subject**: Who is asking, `type:id`, `type:*` or `type:id#relation`
//! - **Relation**: A named role (`owner`, `admin`, `writer`, `executor`, `reader`)
//! - **Tuple**: "subject has relation on object", as stored by the engine
//!
//! # Example
//!
//! ```rust,no_run
//! use auth_acl::{AclClient, AclConfig, RequestContext};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AclConfig::load(Some("config/acl.yaml"))?;
//!     let acl = AclClient::from_config(&config).await?;
//!
//!     let ctx = RequestContext::user("alice");
//!     acl.set_owner(&ctx, "pipeline", "p1", "users", "alice").await?;
//!
//!     let allowed = acl.check_permission(&ctx, "pipeline", "p1", "reader").await?;
//!     println!("alice can read p1: {}", allowed);
//!
//!     Ok(())
//! }
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod acl;
pub mod cache;
pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod models;
pub mod pin;
pub mod protocol;
pub mod store;

pub use acl::AclClient;
pub use cache::{CacheKey, DecisionCache};
pub use client::{Route, TupleClient};
pub use config::AclConfig;
pub use context::{AuthType, RequestContext};
pub use error::*;
pub use models::*;
pub use pin::ConsistencyPinner;
