#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::time::SystemTime;

use async_trait::async_trait;
use sharekeep_core::Role;

mod batch;
pub mod memory;
pub mod postgres;

pub use batch::{Mutation, WriteBatch};
pub use memory::MemoryStorage;
pub use postgres::PostgresStorage;

/// Largest byte count a usage counter can hold (the Postgres column is BIGINT).
pub const MAX_TRACKED_BYTES: u64 = i64::MAX as u64;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("space not found")]
    SpaceNotFound,
    #[error("invite not found")]
    InviteNotFound,
    #[error("invite code already in use")]
    InviteCodeTaken,
    #[error("invite already consumed")]
    InviteAlreadyConsumed,
    #[error("collaborator already exists")]
    CollaboratorExists,
    #[error("collaborator not found")]
    CollaboratorNotFound,
    #[error("space membership changed during the batch")]
    MembershipChanged,
    #[error("invalid stored record: {0}")]
    InvalidRecord(String),
    #[error("storage unavailable")]
    Unavailable,
    #[error("database error: {0}")]
    Database(String),
    #[error("migration error: {0}")]
    Migration(String),
    #[error("DATABASE_URL is not set")]
    MissingDatabaseUrl,
}

// ---------------------------------------------------------------------------
// Domain types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InviteRecord {
    pub code: String,
    pub owner_id: String,
    pub space_id: String,
    pub space_name: String,
    pub role: Role,
    pub created_at: SystemTime,
    pub expires_at: SystemTime,
    pub consumer_id: Option<String>,
}

impl InviteRecord {
    /// An invite is usable strictly before its expiry instant.
    #[must_use]
    pub fn is_expired(&self, now: SystemTime) -> bool {
        now >= self.expires_at
    }

    #[must_use]
    pub fn is_active(&self, now: SystemTime) -> bool {
        self.consumer_id.is_none() && !self.is_expired(now)
    }
}

/// One entry of a space's membership map.
///
/// `space_name` is the space name as it was when access was granted; the
/// reverse-index tuple is rebuilt from it, so it is never refreshed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collaborator {
    pub role: Role,
    pub display_name: String,
    pub space_name: String,
    pub added_at: SystemTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpaceRecord {
    pub owner_id: String,
    pub space_id: String,
    pub name: String,
    pub is_shared: bool,
    pub collaborators: BTreeMap<String, Collaborator>,
}

/// Entry of a user's "shared with me" set. Matched by exact value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SharedSpaceRef {
    pub owner_id: String,
    pub space_id: String,
    pub space_name: String,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageUsage {
    pub user_id: String,
    pub bytes_used: u64,
    pub updated_at: SystemTime,
}

/// Change applied to a usage counter inside its read-modify-write
/// transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageUpdate {
    Finalized(u64),
    Deleted(u64),
}

impl UsageUpdate {
    /// Deletes floor at zero so duplicate or reordered delete events cannot
    /// drive the counter negative.
    #[must_use]
    pub fn apply(self, current: u64) -> u64 {
        match self {
            Self::Finalized(size) => current.saturating_add(size).min(MAX_TRACKED_BYTES),
            Self::Deleted(size) => current.saturating_sub(size),
        }
    }
}

// ---------------------------------------------------------------------------
// Domain-specific storage traits
// ---------------------------------------------------------------------------

#[async_trait]
pub trait SpaceStorage: Send + Sync {
    async fn ping(&self) -> Result<(), StorageError>;
    /// Reads `users/{owner_id}/spaces/{space_id}` with its membership map.
    async fn get_space(&self, owner_id: &str, space_id: &str) -> Result<SpaceRecord, StorageError>;
    /// Creates the space or renames it. Membership is untouched.
    async fn put_space(
        &self,
        owner_id: &str,
        space_id: &str,
        name: &str,
    ) -> Result<SpaceRecord, StorageError>;
}

#[async_trait]
pub trait InviteStorage: Send + Sync {
    async fn get_invite(&self, code: &str) -> Result<InviteRecord, StorageError>;
    /// Unconsumed invites for the space that have not expired at `now`,
    /// oldest first.
    async fn list_active_invites(
        &self,
        owner_id: &str,
        space_id: &str,
        now: SystemTime,
    ) -> Result<Vec<InviteRecord>, StorageError>;
}

#[async_trait]
pub trait MembershipStorage: Send + Sync {
    async fn shared_with_me(&self, user_id: &str) -> Result<Vec<SharedSpaceRef>, StorageError>;
}

#[async_trait]
pub trait BatchStorage: Send + Sync {
    /// Applies every mutation in order, all-or-nothing. The first failing
    /// mutation aborts the batch and its error is returned.
    async fn commit(&self, batch: &WriteBatch) -> Result<(), StorageError>;
}

#[async_trait]
pub trait UsageStorage: Send + Sync {
    async fn get_usage(&self, user_id: &str) -> Result<Option<StorageUsage>, StorageError>;
    /// Read-modify-write of the user's counter in one transaction. A missing
    /// counter reads as zero and is created.
    async fn update_usage(
        &self,
        user_id: &str,
        update: UsageUpdate,
        now: SystemTime,
    ) -> Result<StorageUsage, StorageError>;
}

/// Unified supertrait for code that needs access to all storage domains.
pub trait Storage:
    SpaceStorage + InviteStorage + MembershipStorage + BatchStorage + UsageStorage
{
}

impl<T> Storage for T where
    T: SpaceStorage + InviteStorage + MembershipStorage + BatchStorage + UsageStorage
{
}

// ---------------------------------------------------------------------------
// Migration helpers
// ---------------------------------------------------------------------------

pub async fn migrate() -> Result<(), StorageError> {
    let database_url =
        std::env::var("DATABASE_URL").map_err(|_| StorageError::MissingDatabaseUrl)?;
    let pool = sqlx::PgPool::connect(&database_url)
        .await
        .map_err(|error| StorageError::Database(error.to_string()))?;
    migrate_with_pool(&pool).await?;
    pool.close().await;
    Ok(())
}

pub async fn migrate_with_pool(pool: &sqlx::PgPool) -> Result<(), StorageError> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|error| StorageError::Migration(error.to_string()))?;
    Ok(())
}
