use std::time::SystemTime;

use async_trait::async_trait;

use super::{
    database_error, parse_role, system_time_to_unix_micros, unix_micros_to_system_time,
    PostgresStorage,
};
use crate::{InviteRecord, InviteStorage, StorageError};

#[async_trait]
impl InviteStorage for PostgresStorage {
    async fn get_invite(&self, code: &str) -> Result<InviteRecord, StorageError> {
        let row = sqlx::query_as::<_, InviteRow>(
            r#"
            SELECT
                code,
                owner_id,
                space_id,
                space_name,
                role,
                (EXTRACT(EPOCH FROM created_at) * 1000000)::BIGINT AS created_at_us,
                (EXTRACT(EPOCH FROM expires_at) * 1000000)::BIGINT AS expires_at_us,
                consumer_id
            FROM invites
            WHERE code = $1
            "#,
        )
        .bind(code)
        .fetch_one(&self.pool)
        .await
        .map_err(|error| match error {
            sqlx::Error::RowNotFound => StorageError::InviteNotFound,
            _ => database_error(error),
        })?;

        InviteRecord::try_from(row)
    }

    async fn list_active_invites(
        &self,
        owner_id: &str,
        space_id: &str,
        now: SystemTime,
    ) -> Result<Vec<InviteRecord>, StorageError> {
        let now_us = system_time_to_unix_micros(now)?;
        let rows = sqlx::query_as::<_, InviteRow>(
            r#"
            SELECT
                code,
                owner_id,
                space_id,
                space_name,
                role,
                (EXTRACT(EPOCH FROM created_at) * 1000000)::BIGINT AS created_at_us,
                (EXTRACT(EPOCH FROM expires_at) * 1000000)::BIGINT AS expires_at_us,
                consumer_id
            FROM invites
            WHERE owner_id = $1
              AND space_id = $2
              AND consumer_id IS NULL
              AND expires_at > to_timestamp(($3::double precision) / 1000000.0)
            ORDER BY created_at ASC, code ASC
            "#,
        )
        .bind(owner_id)
        .bind(space_id)
        .bind(now_us)
        .fetch_all(&self.pool)
        .await
        .map_err(database_error)?;

        rows.into_iter().map(InviteRecord::try_from).collect()
    }
}

#[derive(Debug, sqlx::FromRow)]
struct InviteRow {
    code: String,
    owner_id: String,
    space_id: String,
    space_name: String,
    role: String,
    created_at_us: i64,
    expires_at_us: i64,
    consumer_id: Option<String>,
}

impl TryFrom<InviteRow> for InviteRecord {
    type Error = StorageError;

    fn try_from(value: InviteRow) -> Result<Self, Self::Error> {
        Ok(Self {
            role: parse_role(&value.role)?,
            created_at: unix_micros_to_system_time(value.created_at_us)?,
            expires_at: unix_micros_to_system_time(value.expires_at_us)?,
            code: value.code,
            owner_id: value.owner_id,
            space_id: value.space_id,
            space_name: value.space_name,
            consumer_id: value.consumer_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::super::test_support::*;

    #[tokio::test]
    async fn created_invite_roundtrips() {
        let Some(storage) = test_storage().await else {
            return;
        };
        let invite = invite_input("ABCDEFGH", "owner-1", "chores", days(0), days(7));
        commit(&storage, vec![Mutation::CreateInvite(invite.clone())])
            .await
            .expect("create invite");

        let fetched = storage.get_invite("ABCDEFGH").await.expect("get invite");
        assert_eq!(fetched, invite);
    }

    #[tokio::test]
    async fn get_invite_returns_not_found() {
        let Some(storage) = test_storage().await else {
            return;
        };
        let error = storage.get_invite("ZZZZZZZZ").await.expect_err("missing");
        assert_eq!(error, StorageError::InviteNotFound);
    }

    #[tokio::test]
    async fn list_active_invites_skips_consumed_and_expired() {
        let Some(storage) = test_storage().await else {
            return;
        };
        commit(
            &storage,
            vec![
                Mutation::CreateInvite(invite_input("AAAAAAAA", "owner-1", "s1", days(0), days(7))),
                Mutation::CreateInvite(invite_input("BBBBBBBB", "owner-1", "s1", days(1), days(2))),
                Mutation::CreateInvite(invite_input("CCCCCCCC", "owner-1", "s1", days(2), days(9))),
                Mutation::CreateInvite(invite_input("DDDDDDDD", "owner-1", "s2", days(0), days(9))),
                Mutation::ConsumeInvite {
                    code: "CCCCCCCC".to_owned(),
                    consumer_id: "guest".to_owned(),
                },
            ],
        )
        .await
        .expect("seed invites");

        let active = storage
            .list_active_invites("owner-1", "s1", days(3))
            .await
            .expect("list invites");
        let codes: Vec<_> = active.iter().map(|invite| invite.code.as_str()).collect();
        assert_eq!(codes, vec!["AAAAAAAA"]);

        let boundary = storage
            .list_active_invites("owner-1", "s1", days(2) - Duration::from_micros(1))
            .await
            .expect("list invites");
        assert_eq!(boundary.len(), 2);
    }
}
