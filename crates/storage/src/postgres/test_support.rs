use std::time::{Duration, SystemTime, UNIX_EPOCH};

use sqlx::postgres::PgPoolOptions;

// Re-export the domain traits and types so test modules can
// `use super::super::test_support::*` and call every trait method.
#[allow(unused_imports)]
pub(super) use super::PostgresStorage;
#[allow(unused_imports)]
pub(super) use crate::{
    BatchStorage, Collaborator, InviteRecord, InviteStorage, MembershipStorage, Mutation,
    SharedSpaceRef, SpaceStorage, StorageError, UsageStorage, UsageUpdate, WriteBatch,
};
#[allow(unused_imports)]
pub(super) use sharekeep_core::Role;

pub(super) async fn test_storage() -> Option<PostgresStorage> {
    let database_url = match std::env::var("DATABASE_URL") {
        Ok(value) => value,
        Err(_) => return None,
    };

    // Each test gets its own schema for full isolation when running in parallel.
    let schema = format!("test_{}", uuid::Uuid::new_v4().simple());
    let mut opts: sqlx::postgres::PgConnectOptions =
        database_url.parse().expect("parse DATABASE_URL");
    opts = opts.options([("search_path", schema.as_str())]);
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect_with(opts)
        .await
        .expect("connect test database");
    sqlx::query(&format!("CREATE SCHEMA \"{schema}\""))
        .execute(&pool)
        .await
        .expect("create test schema");

    crate::migrate_with_pool(&pool)
        .await
        .expect("apply migrations");
    Some(PostgresStorage::from_pool(pool))
}

/// Midnight UTC on 2024-06-01 plus `n` days.
pub(super) fn days(n: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(1_717_200_000 + n * 86_400)
}

pub(super) async fn commit(
    storage: &PostgresStorage,
    mutations: Vec<Mutation>,
) -> Result<(), StorageError> {
    storage.commit(&WriteBatch::from(mutations)).await
}

pub(super) fn invite_input(
    code: &str,
    owner_id: &str,
    space_id: &str,
    created_at: SystemTime,
    expires_at: SystemTime,
) -> InviteRecord {
    InviteRecord {
        code: code.to_owned(),
        owner_id: owner_id.to_owned(),
        space_id: space_id.to_owned(),
        space_name: "Chores".to_owned(),
        role: Role::Viewer,
        created_at,
        expires_at,
        consumer_id: None,
    }
}

pub(super) fn collaborator(role: Role, space_name: &str) -> Collaborator {
    Collaborator {
        role,
        display_name: "Guest".to_owned(),
        space_name: space_name.to_owned(),
        added_at: days(0),
    }
}

pub(super) fn shared_ref(owner_id: &str, space_id: &str, space_name: &str, role: Role) -> SharedSpaceRef {
    SharedSpaceRef {
        owner_id: owner_id.to_owned(),
        space_id: space_id.to_owned(),
        space_name: space_name.to_owned(),
        role,
    }
}
