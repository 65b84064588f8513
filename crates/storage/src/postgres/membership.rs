use async_trait::async_trait;

use super::{database_error, parse_role, PostgresStorage};
use crate::{MembershipStorage, SharedSpaceRef, StorageError};

#[async_trait]
impl MembershipStorage for PostgresStorage {
    async fn shared_with_me(&self, user_id: &str) -> Result<Vec<SharedSpaceRef>, StorageError> {
        let rows = sqlx::query_as::<_, SharedSpaceRow>(
            r#"
            SELECT owner_id, space_id, space_name, role
            FROM shared_spaces
            WHERE user_id = $1
            ORDER BY owner_id, space_id, space_name, role
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(database_error)?;

        rows.into_iter().map(SharedSpaceRef::try_from).collect()
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SharedSpaceRow {
    owner_id: String,
    space_id: String,
    space_name: String,
    role: String,
}

impl TryFrom<SharedSpaceRow> for SharedSpaceRef {
    type Error = StorageError;

    fn try_from(value: SharedSpaceRow) -> Result<Self, Self::Error> {
        Ok(Self {
            role: parse_role(&value.role)?,
            owner_id: value.owner_id,
            space_id: value.space_id,
            space_name: value.space_name,
        })
    }
}
