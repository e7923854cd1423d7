use crate::error::AclError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variables prefixed with this override file values,
/// e.g. `ACL__OPENFGA__HOST=fga.internal`
pub const ENV_PREFIX: &str = "ACL";

/// Permission layer configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AclConfig {
    /// Authorization engine connections
    #[serde(default)]
    pub openfga: OpenFgaConfig,

    /// Decision cache settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// Key-value store holding cache entries and consistency pins
    #[serde(default)]
    pub redis: RedisConfig,

    /// Request headers carrying caller identity
    #[serde(default)]
    pub headers: HeaderConfig,
}

/// Primary engine connection plus the optional replica
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OpenFgaConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Deadline applied to every engine request
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default)]
    pub replica: ReplicaConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ReplicaConfig {
    /// Empty when no replica is deployed
    #[serde(default)]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Seconds a subject stays pinned to the primary after a write that
    /// affects it. Zero or negative disables pinning.
    #[serde(default)]
    pub replication_time_frame: i64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Seconds; unset or non-positive falls back to 60
    #[serde(default = "default_cache_ttl")]
    pub ttl: i64,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RedisConfig {
    /// `redis://` URL; caching and pinning are off without it
    pub url: Option<String>,
}

/// Names of the request headers the permission layer reads
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HeaderConfig {
    #[serde(default = "default_user_uid_header")]
    pub user_uid: String,

    #[serde(default = "default_visitor_uid_header")]
    pub visitor_uid: String,

    #[serde(default = "default_auth_type_header")]
    pub auth_type: String,

    #[serde(default = "default_requester_uid_header")]
    pub requester_uid: String,

    #[serde(default = "default_share_code_header")]
    pub share_code: String,

    #[serde(default = "default_share_token_header")]
    pub share_token: String,
}

// Default value functions

fn default_host() -> String { "localhost".to_string() }
fn default_port() -> u16 { 8080 }
fn default_request_timeout() -> u64 { 5 }
fn default_cache_ttl() -> i64 { 60 }

fn default_user_uid_header() -> String { "x-user-uid".to_string() }
fn default_visitor_uid_header() -> String { "x-visitor-uid".to_string() }
fn default_auth_type_header() -> String { "x-auth-type".to_string() }
fn default_requester_uid_header() -> String { "x-requester-uid".to_string() }
fn default_share_code_header() -> String { "x-share-code".to_string() }
fn default_share_token_header() -> String { "x-share-token".to_string() }

impl Default for OpenFgaConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
            replica: ReplicaConfig::default(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            ttl: default_cache_ttl(),
        }
    }
}

impl Default for HeaderConfig {
    fn default() -> Self {
        Self {
            user_uid: default_user_uid_header(),
            visitor_uid: default_visitor_uid_header(),
            auth_type: default_auth_type_header(),
            requester_uid: default_requester_uid_header(),
            share_code: default_share_code_header(),
            share_token: default_share_token_header(),
        }
    }
}

impl OpenFgaConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

impl ReplicaConfig {
    pub fn is_configured(&self) -> bool {
        !self.host.trim().is_empty()
    }

    /// How long a pin lasts, or `None` when pinning is disabled
    pub fn pin_time_frame(&self) -> Option<Duration> {
        u64::try_from(self.replication_time_frame)
            .ok()
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

impl CacheConfig {
    pub fn effective_ttl(&self) -> Duration {
        match u64::try_from(self.ttl) {
            Ok(secs) if secs > 0 => Duration::from_secs(secs),
            _ => Duration::from_secs(60),
        }
    }
}

impl AclConfig {
    /// Layer an optional config file (YAML, TOML or JSON by extension) and
    /// `ACL__`-prefixed environment variables over the defaults
    pub fn load(path: Option<&str>) -> Result<Self, AclError> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            if Path::new(path).exists() {
                builder = builder.add_source(config::File::with_name(path));
            } else {
                tracing::debug!("Config file {} not found, using defaults and environment", path);
            }
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let loaded: AclConfig = builder
            .build()
            .and_then(|cfg| cfg.try_deserialize())
            .map_err(|e| AclError::Configuration(format!("Failed to load configuration: {}", e)))?;

        loaded.validate()?;
        Ok(loaded)
    }

    pub fn validate(&self) -> Result<(), AclError> {
        if self.openfga.host.trim().is_empty() {
            return Err(AclError::Configuration("openfga.host must be set".to_string()));
        }
        if self.openfga.port == 0 {
            return Err(AclError::Configuration("openfga.port must be non-zero".to_string()));
        }
        if self.openfga.replica.is_configured() && self.openfga.replica.port == 0 {
            return Err(AclError::Configuration(
                "openfga.replica.port must be non-zero".to_string(),
            ));
        }
        if self.cache.enabled && self.redis.url.is_none() {
            return Err(AclError::Configuration(
                "cache.enabled requires redis.url".to_string(),
            ));
        }
        Ok(())
    }
}
