use thiserror::Error;

/// Errors surfaced by the permission layer to its callers
#[derive(Error, Debug)]
pub enum AclError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Malformed subject: {0}")]
    MalformedSubject(String),

    #[error("Engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("Engine error: {0}")]
    Engine(EngineError),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl AclError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, AclError::NotFound(_))
    }

    pub fn is_permission_denied(&self) -> bool {
        matches!(self, AclError::PermissionDenied(_))
    }

    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, AclError::Unauthenticated(_))
    }
}

impl From<EngineError> for AclError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Unavailable(msg) => AclError::EngineUnavailable(msg),
            other => AclError::Engine(other),
        }
    }
}

/// Conditions reported by the authorization engine or its transport
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("engine unreachable: {0}")]
    Unavailable(String),

    #[error("type not found: {0}")]
    TypeNotFound(String),

    #[error("request rejected ({code}): {message}")]
    Rejected { code: String, message: String },

    #[error("invalid engine response: {0}")]
    InvalidResponse(String),
}

impl EngineError {
    /// Whether the engine answered that the object or subject type is not part
    /// of the authorization model
    pub fn is_type_not_found(&self) -> bool {
        matches!(self, EngineError::TypeNotFound(_))
    }
}

/// Failures of the key-value store backing the decision cache and pins
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store backend error: {0}")]
    Backend(String),

    #[error("Store connection failed: {0}")]
    Connection(String),
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_connection_refusal() || err.is_connection_dropped() || err.is_io_error() {
            StoreError::Connection(err.to_string())
        } else {
            StoreError::Backend(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, AclError>;
