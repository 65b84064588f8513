use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use sharekeep_core::ManualClock;
use sharekeep_storage::{
    BatchStorage, InviteRecord, SharedSpaceRef, StorageError, StorageUsage, UsageUpdate,
    WriteBatch,
};
#[allow(unused_imports)]
pub(crate) use sharekeep_storage::{
    InviteStorage, MembershipStorage, MemoryStorage, SpaceRecord, SpaceStorage, UsageStorage,
};
use tokio::sync::Barrier;

use crate::{QuotaLedger, SharingService};

pub(crate) const OWNER: &str = "owner-1";
pub(crate) const GUEST: &str = "guest-1";
pub(crate) const OTHER: &str = "guest-2";
pub(crate) const SPACE: &str = "chores";
pub(crate) const SPACE_NAME: &str = "Weekend chores";

pub(crate) fn start() -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(1_717_200_000)
}

pub(crate) fn days(n: u64) -> Duration {
    Duration::from_secs(n * 86_400)
}

pub(crate) fn test_clock() -> ManualClock {
    ManualClock::new(start())
}

pub(crate) struct Fixture {
    pub storage: Arc<MemoryStorage>,
    pub clock: Arc<ManualClock>,
    pub service: SharingService,
    pub quota: QuotaLedger,
}

impl Fixture {
    /// Memory-backed services with one space owned by [`OWNER`].
    pub async fn new() -> Self {
        let storage = Arc::new(MemoryStorage::new());
        let clock = Arc::new(test_clock());
        storage
            .put_space(OWNER, SPACE, SPACE_NAME)
            .await
            .expect("seed space");
        Self {
            service: SharingService::new(storage.clone(), clock.clone()),
            quota: QuotaLedger::new(storage.clone(), clock.clone()),
            storage,
            clock,
        }
    }

    pub async fn invite(&self, role: &str, ttl_days: Option<u32>) -> String {
        self.service
            .create_invite(OWNER, SPACE, role, ttl_days)
            .await
            .expect("create invite")
            .code
    }

    pub async fn join(&self, user_id: &str, role: &str) {
        let code = self.invite(role, None).await;
        self.service
            .accept_invite(user_id, user_id, &code)
            .await
            .expect("accept invite");
    }

    pub async fn space(&self) -> SpaceRecord {
        self.storage
            .get_space(OWNER, SPACE)
            .await
            .expect("get space")
    }
}

/// Memory storage that can serve one outdated invite or space read and hold
/// commits until several callers reach them, so tests can order the steps
/// of competing requests.
pub(crate) struct Interleaved {
    inner: Arc<MemoryStorage>,
    stale_invite: Mutex<Option<InviteRecord>>,
    stale_space: Mutex<Option<SpaceRecord>>,
    commit_gate: Option<Barrier>,
}

impl Interleaved {
    pub fn new(inner: Arc<MemoryStorage>) -> Self {
        Self {
            inner,
            stale_invite: Mutex::new(None),
            stale_space: Mutex::new(None),
            commit_gate: None,
        }
    }

    /// The next `get_invite` returns `invite` instead of the stored one.
    pub fn with_stale_invite(self, invite: InviteRecord) -> Self {
        *self.stale_invite.lock().expect("stale invite") = Some(invite);
        self
    }

    /// The next `get_space` returns `space` instead of the stored one.
    pub fn with_stale_space(self, space: SpaceRecord) -> Self {
        *self.stale_space.lock().expect("stale space") = Some(space);
        self
    }

    /// Every commit waits until `callers` commits are pending.
    pub fn with_commit_gate(mut self, callers: usize) -> Self {
        self.commit_gate = Some(Barrier::new(callers));
        self
    }
}

#[async_trait]
impl SpaceStorage for Interleaved {
    async fn ping(&self) -> Result<(), StorageError> {
        self.inner.ping().await
    }

    async fn get_space(&self, owner_id: &str, space_id: &str) -> Result<SpaceRecord, StorageError> {
        let stale = self.stale_space.lock().expect("stale space").take();
        match stale {
            Some(space) => Ok(space),
            None => self.inner.get_space(owner_id, space_id).await,
        }
    }

    async fn put_space(
        &self,
        owner_id: &str,
        space_id: &str,
        name: &str,
    ) -> Result<SpaceRecord, StorageError> {
        self.inner.put_space(owner_id, space_id, name).await
    }
}

#[async_trait]
impl InviteStorage for Interleaved {
    async fn get_invite(&self, code: &str) -> Result<InviteRecord, StorageError> {
        let stale = self.stale_invite.lock().expect("stale invite").take();
        match stale {
            Some(invite) => Ok(invite),
            None => self.inner.get_invite(code).await,
        }
    }

    async fn list_active_invites(
        &self,
        owner_id: &str,
        space_id: &str,
        now: SystemTime,
    ) -> Result<Vec<InviteRecord>, StorageError> {
        self.inner.list_active_invites(owner_id, space_id, now).await
    }
}

#[async_trait]
impl MembershipStorage for Interleaved {
    async fn shared_with_me(&self, user_id: &str) -> Result<Vec<SharedSpaceRef>, StorageError> {
        self.inner.shared_with_me(user_id).await
    }
}

#[async_trait]
impl BatchStorage for Interleaved {
    async fn commit(&self, batch: &WriteBatch) -> Result<(), StorageError> {
        if let Some(gate) = &self.commit_gate {
            gate.wait().await;
        }
        self.inner.commit(batch).await
    }
}

#[async_trait]
impl UsageStorage for Interleaved {
    async fn get_usage(&self, user_id: &str) -> Result<Option<StorageUsage>, StorageError> {
        self.inner.get_usage(user_id).await
    }

    async fn update_usage(
        &self,
        user_id: &str,
        update: UsageUpdate,
        now: SystemTime,
    ) -> Result<StorageUsage, StorageError> {
        self.inner.update_usage(user_id, update, now).await
    }
}
