use std::sync::Arc;

use sharekeep_core::validation::{validate_space_id, validate_space_name, validate_user_id};
use sharekeep_core::{paths, Clock};
use sharekeep_storage::{Mutation, SharedSpaceRef, SpaceRecord, Storage, WriteBatch};

use crate::invite_code::{InviteCodes, RandomInviteCodes};
use crate::membership::purge_mutations;
use crate::LedgerError;

/// Invite ledger and access grant manager over one storage handle.
///
/// Every method takes the verified caller id first. Ownership is never taken
/// from the request: owner-scoped reads use the caller id as the owner key,
/// so a space that belongs to someone else simply does not exist.
#[derive(Clone)]
pub struct SharingService {
    pub(crate) storage: Arc<dyn Storage>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) codes: Arc<dyn InviteCodes>,
}

impl SharingService {
    pub fn new(storage: Arc<dyn Storage>, clock: Arc<dyn Clock>) -> Self {
        Self {
            storage,
            clock,
            codes: Arc::new(RandomInviteCodes),
        }
    }

    #[must_use]
    pub fn with_invite_codes(mut self, codes: Arc<dyn InviteCodes>) -> Self {
        self.codes = codes;
        self
    }

    pub async fn ping(&self) -> Result<(), LedgerError> {
        self.storage.ping().await.map_err(LedgerError::from)
    }

    pub async fn get_space(
        &self,
        caller_id: &str,
        space_id: &str,
    ) -> Result<SpaceRecord, LedgerError> {
        validate_user_id(caller_id)?;
        validate_space_id(space_id)?;
        Ok(self.storage.get_space(caller_id, space_id).await?)
    }

    /// Creates the caller's space or renames it. Existing grants keep the
    /// name they were made under.
    pub async fn put_space(
        &self,
        caller_id: &str,
        space_id: &str,
        name: &str,
    ) -> Result<SpaceRecord, LedgerError> {
        validate_user_id(caller_id)?;
        validate_space_id(space_id)?;
        validate_space_name(name)?;
        Ok(self.storage.put_space(caller_id, space_id, name).await?)
    }

    pub async fn shared_with_me(&self, caller_id: &str) -> Result<Vec<SharedSpaceRef>, LedgerError> {
        validate_user_id(caller_id)?;
        Ok(self.storage.shared_with_me(caller_id).await?)
    }

    /// Removes every collaborator and outstanding invite of the caller's
    /// space, keeping the space itself. Returns how many members were removed.
    pub async fn purge_space_sharing(
        &self,
        caller_id: &str,
        space_id: &str,
    ) -> Result<usize, LedgerError> {
        let space = self.get_space(caller_id, space_id).await?;
        let mut batch = WriteBatch::from(purge_mutations(&space));
        batch.push(Mutation::RefreshSharedFlag {
            owner_id: space.owner_id.clone(),
            space_id: space.space_id.clone(),
        });
        self.commit_purge(&batch).await?;

        tracing::info!(
            space = %paths::space(caller_id, space_id),
            removed = space.collaborators.len(),
            "space sharing purged"
        );
        Ok(space.collaborators.len())
    }

    /// Deletes the caller's space together with all of its sharing state.
    pub async fn delete_space(&self, caller_id: &str, space_id: &str) -> Result<(), LedgerError> {
        let space = self.get_space(caller_id, space_id).await?;
        let mut batch = WriteBatch::from(purge_mutations(&space));
        batch.push(Mutation::DeleteSpace {
            owner_id: space.owner_id.clone(),
            space_id: space.space_id.clone(),
        });
        self.commit_purge(&batch).await?;

        tracing::info!(space = %paths::space(caller_id, space_id), "space deleted");
        Ok(())
    }

    async fn commit_purge(&self, batch: &WriteBatch) -> Result<(), LedgerError> {
        // A member leaving or joining after the read invalidates the batch.
        self.storage.commit(batch).await.map_err(|error| {
            match LedgerError::from(error) {
                LedgerError::CollaboratorNotFound | LedgerError::AlreadyMember => {
                    LedgerError::MembershipChanged
                }
                other => other,
            }
        })
    }
}
