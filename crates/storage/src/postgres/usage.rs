use std::time::SystemTime;

use async_trait::async_trait;

use super::{
    database_error, system_time_to_unix_micros, unix_micros_to_system_time, PostgresStorage,
};
use crate::{StorageError, StorageUsage, UsageStorage, UsageUpdate};

#[async_trait]
impl UsageStorage for PostgresStorage {
    async fn get_usage(&self, user_id: &str) -> Result<Option<StorageUsage>, StorageError> {
        let row = sqlx::query_as::<_, UsageRow>(
            r#"
            SELECT
                user_id,
                bytes_used,
                (EXTRACT(EPOCH FROM updated_at) * 1000000)::BIGINT AS updated_at_us
            FROM user_storage
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(database_error)?;

        row.map(StorageUsage::try_from).transpose()
    }

    async fn update_usage(
        &self,
        user_id: &str,
        update: UsageUpdate,
        now: SystemTime,
    ) -> Result<StorageUsage, StorageError> {
        let now_us = system_time_to_unix_micros(now)?;
        let mut tx = self.pool.begin().await.map_err(database_error)?;

        sqlx::query(
            r#"
            INSERT INTO user_storage (user_id, bytes_used, updated_at)
            VALUES ($1, 0, to_timestamp(($2::double precision) / 1000000.0))
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(now_us)
        .execute(tx.as_mut())
        .await
        .map_err(database_error)?;

        let current: i64 =
            sqlx::query_scalar("SELECT bytes_used FROM user_storage WHERE user_id = $1 FOR UPDATE")
                .bind(user_id)
                .fetch_one(tx.as_mut())
                .await
                .map_err(database_error)?;
        let current = u64::try_from(current)
            .map_err(|_| StorageError::InvalidRecord("negative bytes_used".to_owned()))?;
        let next = i64::try_from(update.apply(current))
            .map_err(|_| StorageError::InvalidRecord("bytes_used out of range".to_owned()))?;

        let row = sqlx::query_as::<_, UsageRow>(
            r#"
            UPDATE user_storage
            SET bytes_used = $2,
                updated_at = to_timestamp(($3::double precision) / 1000000.0)
            WHERE user_id = $1
            RETURNING
                user_id,
                bytes_used,
                (EXTRACT(EPOCH FROM updated_at) * 1000000)::BIGINT AS updated_at_us
            "#,
        )
        .bind(user_id)
        .bind(next)
        .bind(now_us)
        .fetch_one(tx.as_mut())
        .await
        .map_err(database_error)?;

        tx.commit().await.map_err(database_error)?;
        StorageUsage::try_from(row)
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UsageRow {
    user_id: String,
    bytes_used: i64,
    updated_at_us: i64,
}

impl TryFrom<UsageRow> for StorageUsage {
    type Error = StorageError;

    fn try_from(value: UsageRow) -> Result<Self, Self::Error> {
        Ok(Self {
            bytes_used: u64::try_from(value.bytes_used)
                .map_err(|_| StorageError::InvalidRecord("negative bytes_used".to_owned()))?,
            updated_at: unix_micros_to_system_time(value.updated_at_us)?,
            user_id: value.user_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::super::test_support::*;

    #[tokio::test]
    async fn usage_counter_adds_and_floors_at_zero() {
        let Some(storage) = test_storage().await else {
            return;
        };
        assert!(storage.get_usage("u1").await.expect("get").is_none());

        for update in [
            UsageUpdate::Finalized(500),
            UsageUpdate::Finalized(1500),
            UsageUpdate::Deleted(500),
        ] {
            storage.update_usage("u1", update, days(1)).await.expect("update");
        }
        let usage = storage.get_usage("u1").await.expect("get").expect("usage");
        assert_eq!(usage.bytes_used, 1500);
        assert_eq!(usage.updated_at, days(1));

        let floored = storage
            .update_usage("u1", UsageUpdate::Deleted(10_000), days(2))
            .await
            .expect("update");
        assert_eq!(floored.bytes_used, 0);
    }

    #[tokio::test]
    async fn concurrent_updates_are_not_lost() {
        let Some(storage) = test_storage().await else {
            return;
        };
        let storage = Arc::new(storage);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let storage = Arc::clone(&storage);
            handles.push(tokio::spawn(async move {
                storage
                    .update_usage("u1", UsageUpdate::Finalized(10), days(1))
                    .await
            }));
        }
        for handle in handles {
            handle.await.expect("join").expect("update");
        }

        let usage = storage.get_usage("u1").await.expect("get").expect("usage");
        assert_eq!(usage.bytes_used, 80);
    }
}
