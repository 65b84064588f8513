use std::sync::Arc;

use sharekeep_core::paths;
use sharekeep_core::validation::validate_user_id;
use sharekeep_core::Clock;
use sharekeep_storage::{Storage, StorageUsage, UsageUpdate};

use crate::LedgerError;

/// What happened to one storage event. Never surfaced to the event sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    Applied(StorageUsage),
    /// The object does not live under a user prefix.
    Ignored,
    /// The counter update failed; the event is lost.
    Dropped,
}

/// Authoritative per-user byte counters, driven by object-store events.
#[derive(Clone)]
pub struct QuotaLedger {
    storage: Arc<dyn Storage>,
    clock: Arc<dyn Clock>,
}

impl QuotaLedger {
    pub fn new(storage: Arc<dyn Storage>, clock: Arc<dyn Clock>) -> Self {
        Self { storage, clock }
    }

    pub async fn on_object_finalized(&self, path: &str, size: u64) -> EventOutcome {
        self.apply(path, UsageUpdate::Finalized(size)).await
    }

    pub async fn on_object_deleted(&self, path: &str, size: u64) -> EventOutcome {
        self.apply(path, UsageUpdate::Deleted(size)).await
    }

    /// The caller's own counter; `None` until their first upload event.
    pub async fn usage(&self, caller_id: &str) -> Result<Option<StorageUsage>, LedgerError> {
        validate_user_id(caller_id)?;
        Ok(self.storage.get_usage(caller_id).await?)
    }

    async fn apply(&self, path: &str, update: UsageUpdate) -> EventOutcome {
        let Some(user_id) = paths::object_owner(path).filter(|id| validate_user_id(id).is_ok())
        else {
            tracing::debug!(path, "storage event outside user prefix ignored");
            return EventOutcome::Ignored;
        };

        match self
            .storage
            .update_usage(user_id, update, self.clock.now())
            .await
        {
            Ok(usage) => {
                tracing::info!(
                    counter = %paths::storage_usage(user_id),
                    update = ?update,
                    bytes_used = usage.bytes_used,
                    "storage usage updated"
                );
                EventOutcome::Applied(usage)
            }
            Err(error) => {
                tracing::error!(
                    counter = %paths::storage_usage(user_id),
                    update = ?update,
                    error = %error,
                    "storage usage update dropped"
                );
                EventOutcome::Dropped
            }
        }
    }
}
