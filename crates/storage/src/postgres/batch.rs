use async_trait::async_trait;
use sqlx::{Postgres, Transaction};

use super::{
    database_error, is_foreign_key_violation, is_unique_violation, system_time_to_unix_micros,
    PostgresStorage,
};
use crate::{BatchStorage, Mutation, StorageError, WriteBatch};

#[async_trait]
impl BatchStorage for PostgresStorage {
    async fn commit(&self, batch: &WriteBatch) -> Result<(), StorageError> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await.map_err(database_error)?;

        // Serializes batches that touch the same space, so membership checks
        // and the is_shared recount see every earlier committed batch.
        for (owner_id, space_id) in batch.space_keys() {
            lock_space(&mut tx, owner_id, space_id).await?;
        }

        for mutation in batch.mutations() {
            apply(&mut tx, mutation).await?;
        }

        tx.commit().await.map_err(database_error)?;
        Ok(())
    }
}

async fn lock_space(
    tx: &mut Transaction<'_, Postgres>,
    owner_id: &str,
    space_id: &str,
) -> Result<(), StorageError> {
    sqlx::query("SELECT 1 FROM spaces WHERE owner_id = $1 AND space_id = $2 FOR UPDATE")
        .bind(owner_id)
        .bind(space_id)
        .fetch_one(tx.as_mut())
        .await
        .map_err(|error| match error {
            sqlx::Error::RowNotFound => StorageError::SpaceNotFound,
            _ => database_error(error),
        })?;
    Ok(())
}

async fn apply(
    tx: &mut Transaction<'_, Postgres>,
    mutation: &Mutation,
) -> Result<(), StorageError> {
    match mutation {
        Mutation::CreateInvite(invite) => {
            let created_at_us = system_time_to_unix_micros(invite.created_at)?;
            let expires_at_us = system_time_to_unix_micros(invite.expires_at)?;
            sqlx::query(
                r#"
                INSERT INTO invites (
                    code, owner_id, space_id, space_name, role, created_at, expires_at, consumer_id
                )
                VALUES (
                    $1, $2, $3, $4, $5,
                    to_timestamp(($6::double precision) / 1000000.0),
                    to_timestamp(($7::double precision) / 1000000.0),
                    $8
                )
                "#,
            )
            .bind(&invite.code)
            .bind(&invite.owner_id)
            .bind(&invite.space_id)
            .bind(&invite.space_name)
            .bind(invite.role.as_str())
            .bind(created_at_us)
            .bind(expires_at_us)
            .bind(invite.consumer_id.as_deref())
            .execute(tx.as_mut())
            .await
            .map_err(|error| {
                if is_unique_violation(&error) {
                    StorageError::InviteCodeTaken
                } else {
                    database_error(error)
                }
            })?;
        }
        Mutation::ConsumeInvite { code, consumer_id } => {
            let result = sqlx::query(
                "UPDATE invites SET consumer_id = $2 WHERE code = $1 AND consumer_id IS NULL",
            )
            .bind(code)
            .bind(consumer_id)
            .execute(tx.as_mut())
            .await
            .map_err(database_error)?;
            if result.rows_affected() == 0 {
                let exists: bool =
                    sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM invites WHERE code = $1)")
                        .bind(code)
                        .fetch_one(tx.as_mut())
                        .await
                        .map_err(database_error)?;
                return Err(if exists {
                    StorageError::InviteAlreadyConsumed
                } else {
                    StorageError::InviteNotFound
                });
            }
        }
        Mutation::DeleteInvite { code, owner_id } => {
            let result = sqlx::query("DELETE FROM invites WHERE code = $1 AND owner_id = $2")
                .bind(code)
                .bind(owner_id)
                .execute(tx.as_mut())
                .await
                .map_err(database_error)?;
            if result.rows_affected() == 0 {
                return Err(StorageError::InviteNotFound);
            }
        }
        Mutation::DeleteSpaceInvites { owner_id, space_id } => {
            sqlx::query("DELETE FROM invites WHERE owner_id = $1 AND space_id = $2")
                .bind(owner_id)
                .bind(space_id)
                .execute(tx.as_mut())
                .await
                .map_err(database_error)?;
        }
        Mutation::PutCollaborator {
            owner_id,
            space_id,
            user_id,
            collaborator,
        } => {
            let added_at_us = system_time_to_unix_micros(collaborator.added_at)?;
            sqlx::query(
                r#"
                INSERT INTO space_collaborators (
                    owner_id, space_id, user_id, role, display_name, space_name, added_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, to_timestamp(($7::double precision) / 1000000.0))
                "#,
            )
            .bind(owner_id)
            .bind(space_id)
            .bind(user_id)
            .bind(collaborator.role.as_str())
            .bind(&collaborator.display_name)
            .bind(&collaborator.space_name)
            .bind(added_at_us)
            .execute(tx.as_mut())
            .await
            .map_err(|error| {
                if is_unique_violation(&error) {
                    StorageError::CollaboratorExists
                } else if is_foreign_key_violation(&error) {
                    StorageError::SpaceNotFound
                } else {
                    database_error(error)
                }
            })?;
        }
        Mutation::RemoveCollaborator {
            owner_id,
            space_id,
            user_id,
            role,
            space_name,
        } => {
            let stored = sqlx::query_as::<_, (String, String)>(
                r#"
                DELETE FROM space_collaborators
                WHERE owner_id = $1 AND space_id = $2 AND user_id = $3
                RETURNING role, space_name
                "#,
            )
            .bind(owner_id)
            .bind(space_id)
            .bind(user_id)
            .fetch_optional(tx.as_mut())
            .await
            .map_err(database_error)?;
            match stored {
                None => return Err(StorageError::CollaboratorNotFound),
                Some((stored_role, stored_name))
                    if stored_role != role.as_str() || stored_name != *space_name =>
                {
                    return Err(StorageError::MembershipChanged);
                }
                Some(_) => {}
            }
        }
        Mutation::AddSharedSpace { user_id, entry } => {
            sqlx::query(
                r#"
                INSERT INTO shared_spaces (user_id, owner_id, space_id, space_name, role)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(user_id)
            .bind(&entry.owner_id)
            .bind(&entry.space_id)
            .bind(&entry.space_name)
            .bind(entry.role.as_str())
            .execute(tx.as_mut())
            .await
            .map_err(database_error)?;
        }
        Mutation::RemoveSharedSpace { user_id, entry } => {
            sqlx::query(
                r#"
                DELETE FROM shared_spaces
                WHERE user_id = $1
                  AND owner_id = $2
                  AND space_id = $3
                  AND space_name = $4
                  AND role = $5
                "#,
            )
            .bind(user_id)
            .bind(&entry.owner_id)
            .bind(&entry.space_id)
            .bind(&entry.space_name)
            .bind(entry.role.as_str())
            .execute(tx.as_mut())
            .await
            .map_err(database_error)?;
        }
        Mutation::RefreshSharedFlag { owner_id, space_id } => {
            let result = sqlx::query(
                r#"
                UPDATE spaces
                SET is_shared = EXISTS (
                    SELECT 1 FROM space_collaborators c
                    WHERE c.owner_id = spaces.owner_id AND c.space_id = spaces.space_id
                )
                WHERE owner_id = $1 AND space_id = $2
                "#,
            )
            .bind(owner_id)
            .bind(space_id)
            .execute(tx.as_mut())
            .await
            .map_err(database_error)?;
            if result.rows_affected() == 0 {
                return Err(StorageError::SpaceNotFound);
            }
        }
        Mutation::RequireNoCollaborators { owner_id, space_id } => {
            let has_members: bool = sqlx::query_scalar(
                "SELECT EXISTS (SELECT 1 FROM space_collaborators WHERE owner_id = $1 AND space_id = $2)",
            )
            .bind(owner_id)
            .bind(space_id)
            .fetch_one(tx.as_mut())
            .await
            .map_err(database_error)?;
            if has_members {
                return Err(StorageError::MembershipChanged);
            }
        }
        Mutation::DeleteSpace { owner_id, space_id } => {
            let result = sqlx::query("DELETE FROM spaces WHERE owner_id = $1 AND space_id = $2")
                .bind(owner_id)
                .bind(space_id)
                .execute(tx.as_mut())
                .await
                .map_err(database_error)?;
            if result.rows_affected() == 0 {
                return Err(StorageError::SpaceNotFound);
            }
        }
    }
    Ok(())
}
