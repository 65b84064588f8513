#![forbid(unsafe_code)]

mod batch;
mod invites;
mod membership;
mod spaces;
mod usage;

#[cfg(test)]
mod test_support;

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use sharekeep_core::Role;
use sqlx::PgPool;

use crate::StorageError;

#[derive(Clone)]
pub struct PostgresStorage {
    pool: PgPool,
}

impl PostgresStorage {
    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|error| StorageError::Database(error.to_string()))?;
        Ok(Self { pool })
    }

    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

// ---------------------------------------------------------------------------
// Shared helpers used across multiple domain modules
// ---------------------------------------------------------------------------

pub(crate) fn database_error(error: sqlx::Error) -> StorageError {
    match error {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StorageError::Unavailable
        }
        _ => StorageError::Database(error.to_string()),
    }
}

pub(crate) fn is_unique_violation(error: &sqlx::Error) -> bool {
    has_sqlstate(error, "23505")
}

pub(crate) fn is_foreign_key_violation(error: &sqlx::Error) -> bool {
    has_sqlstate(error, "23503")
}

fn has_sqlstate(error: &sqlx::Error, code: &str) -> bool {
    matches!(
        error,
        sqlx::Error::Database(db_error) if db_error.code().as_deref() == Some(code)
    )
}

pub(crate) fn parse_role(value: &str) -> Result<Role, StorageError> {
    value
        .parse()
        .map_err(|_| StorageError::InvalidRecord(format!("unknown role {value:?}")))
}

pub(crate) fn system_time_to_unix_micros(value: SystemTime) -> Result<i64, StorageError> {
    match value.duration_since(UNIX_EPOCH) {
        Ok(duration) => i64::try_from(duration.as_micros())
            .map_err(|_| StorageError::InvalidRecord("timestamp out of range".to_owned())),
        Err(error) => {
            let micros = i64::try_from(error.duration().as_micros())
                .map_err(|_| StorageError::InvalidRecord("timestamp out of range".to_owned()))?;
            Ok(-micros)
        }
    }
}

pub(crate) fn unix_micros_to_system_time(value: i64) -> Result<SystemTime, StorageError> {
    let duration = Duration::from_micros(value.unsigned_abs());
    if value >= 0 {
        Ok(UNIX_EPOCH + duration)
    } else {
        UNIX_EPOCH
            .checked_sub(duration)
            .ok_or_else(|| StorageError::InvalidRecord("timestamp out of range".to_owned()))
    }
}
