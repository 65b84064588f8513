use std::collections::BTreeMap;

use async_trait::async_trait;
use sqlx::{Executor, Postgres};

use super::{database_error, parse_role, unix_micros_to_system_time, PostgresStorage};
use crate::{Collaborator, SpaceRecord, SpaceStorage, StorageError};

#[async_trait]
impl SpaceStorage for PostgresStorage {
    async fn ping(&self) -> Result<(), StorageError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(database_error)?;
        Ok(())
    }

    async fn get_space(&self, owner_id: &str, space_id: &str) -> Result<SpaceRecord, StorageError> {
        let mut tx = self.pool.begin().await.map_err(database_error)?;
        // The shared flag and the membership rows must come from one snapshot.
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ")
            .execute(tx.as_mut())
            .await
            .map_err(database_error)?;

        let row = sqlx::query_as::<_, SpaceRow>(
            r#"
            SELECT owner_id, space_id, name, is_shared
            FROM spaces
            WHERE owner_id = $1 AND space_id = $2
            "#,
        )
        .bind(owner_id)
        .bind(space_id)
        .fetch_one(tx.as_mut())
        .await
        .map_err(|error| match error {
            sqlx::Error::RowNotFound => StorageError::SpaceNotFound,
            _ => database_error(error),
        })?;

        let collaborators = load_collaborators(tx.as_mut(), owner_id, space_id).await?;
        tx.commit().await.map_err(database_error)?;
        Ok(row.into_record(collaborators))
    }

    async fn put_space(
        &self,
        owner_id: &str,
        space_id: &str,
        name: &str,
    ) -> Result<SpaceRecord, StorageError> {
        let mut tx = self.pool.begin().await.map_err(database_error)?;
        // The upsert locks the row, so membership cannot change before commit.
        let row = sqlx::query_as::<_, SpaceRow>(
            r#"
            INSERT INTO spaces (owner_id, space_id, name)
            VALUES ($1, $2, $3)
            ON CONFLICT (owner_id, space_id) DO UPDATE SET name = EXCLUDED.name
            RETURNING owner_id, space_id, name, is_shared
            "#,
        )
        .bind(owner_id)
        .bind(space_id)
        .bind(name)
        .fetch_one(tx.as_mut())
        .await
        .map_err(database_error)?;

        let collaborators = load_collaborators(tx.as_mut(), owner_id, space_id).await?;
        tx.commit().await.map_err(database_error)?;
        Ok(row.into_record(collaborators))
    }
}

pub(super) async fn load_collaborators<'e, E>(
    executor: E,
    owner_id: &str,
    space_id: &str,
) -> Result<BTreeMap<String, Collaborator>, StorageError>
where
    E: Executor<'e, Database = Postgres>,
{
    let rows = sqlx::query_as::<_, CollaboratorRow>(
        r#"
        SELECT
            user_id,
            role,
            display_name,
            space_name,
            (EXTRACT(EPOCH FROM added_at) * 1000000)::BIGINT AS added_at_us
        FROM space_collaborators
        WHERE owner_id = $1 AND space_id = $2
        "#,
    )
    .bind(owner_id)
    .bind(space_id)
    .fetch_all(executor)
    .await
    .map_err(database_error)?;

    rows.into_iter()
        .map(|row| {
            let user_id = row.user_id.clone();
            Collaborator::try_from(row).map(|collaborator| (user_id, collaborator))
        })
        .collect()
}

#[derive(Debug, sqlx::FromRow)]
struct SpaceRow {
    owner_id: String,
    space_id: String,
    name: String,
    is_shared: bool,
}

impl SpaceRow {
    fn into_record(self, collaborators: BTreeMap<String, Collaborator>) -> SpaceRecord {
        SpaceRecord {
            owner_id: self.owner_id,
            space_id: self.space_id,
            name: self.name,
            is_shared: self.is_shared,
            collaborators,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CollaboratorRow {
    user_id: String,
    role: String,
    display_name: String,
    space_name: String,
    added_at_us: i64,
}

impl TryFrom<CollaboratorRow> for Collaborator {
    type Error = StorageError;

    fn try_from(value: CollaboratorRow) -> Result<Self, Self::Error> {
        Ok(Self {
            role: parse_role(&value.role)?,
            display_name: value.display_name,
            space_name: value.space_name,
            added_at: unix_micros_to_system_time(value.added_at_us)?,
        })
    }
}
