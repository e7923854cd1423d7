use crate::store::KeyValueStore;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Marks subjects whose permissions changed recently so their reads skip the
/// replica (and the engine's query cache) until replication has caught up.
pub struct ConsistencyPinner {
    store: Option<Arc<dyn KeyValueStore>>,
    time_frame: Option<Duration>,
}

impl ConsistencyPinner {
    /// `time_frame` of `None` or zero disables pinning
    pub fn new(store: Option<Arc<dyn KeyValueStore>>, time_frame: Option<Duration>) -> Self {
        Self {
            store,
            time_frame: time_frame.filter(|frame| !frame.is_zero()),
        }
    }

    /// A pinner that never pins
    pub fn disabled() -> Self {
        Self {
            store: None,
            time_frame: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.store.is_some() && self.time_frame.is_some()
    }

    pub fn pin_key(subject_id: &str) -> String {
        format!("db_pin_user:{}:openfga", subject_id)
    }

    /// Pin a subject for the replication time-frame. Best-effort: a failure
    /// is logged and the subject falls back to replica reads.
    pub async fn pin(&self, subject_id: &str) {
        let (Some(store), Some(time_frame)) = (self.store.as_ref(), self.time_frame) else {
            return;
        };
        if subject_id.is_empty() {
            return;
        }

        let key = Self::pin_key(subject_id);
        match store.set_with_ttl(&key, &Utc::now().to_rfc3339(), time_frame).await {
            Ok(()) => debug!("Pinned {} for {:?}", subject_id, time_frame),
            Err(e) => warn!("Failed to pin {}: {}", subject_id, e),
        }
    }

    /// Whether reads for this subject must go to the primary.
    ///
    /// An unreachable store answers `true`: routing to the primary is always
    /// correct, only slower.
    pub async fn is_pinned(&self, subject_id: &str) -> bool {
        let Some(store) = self.store.as_ref() else {
            return false;
        };
        if self.time_frame.is_none() || subject_id.is_empty() {
            return false;
        }

        match store.exists(&Self::pin_key(subject_id)).await {
            Ok(pinned) => pinned,
            Err(e) => {
                warn!("Pin lookup for {} failed, routing to primary: {}", subject_id, e);
                true
            }
        }
    }
}
