use sharekeep_core::paths;
use sharekeep_core::validation::{validate_space_id, validate_user_id};
use sharekeep_storage::{Mutation, WriteBatch};

use crate::membership::removal_mutations;
use crate::{LedgerError, SharingService};

impl SharingService {
    /// Owner removes a collaborator from their space.
    pub async fn revoke_access(
        &self,
        caller_id: &str,
        space_id: &str,
        target_user_id: &str,
    ) -> Result<(), LedgerError> {
        validate_user_id(caller_id)?;
        validate_space_id(space_id)?;
        validate_user_id(target_user_id)?;

        self.remove_member(caller_id, space_id, target_user_id).await?;
        tracing::info!(
            space = %paths::space(caller_id, space_id),
            user_id = %target_user_id,
            "access revoked"
        );
        Ok(())
    }

    /// Collaborator removes themselves from someone else's space.
    pub async fn leave_space(
        &self,
        caller_id: &str,
        owner_id: &str,
        space_id: &str,
    ) -> Result<(), LedgerError> {
        validate_user_id(caller_id)?;
        validate_user_id(owner_id)?;
        validate_space_id(space_id)?;
        if caller_id == owner_id {
            return Err(LedgerError::OwnerCannotLeave);
        }

        self.remove_member(owner_id, space_id, caller_id).await?;
        tracing::info!(
            space = %paths::space(owner_id, space_id),
            user_id = %caller_id,
            "collaborator left space"
        );
        Ok(())
    }

    async fn remove_member(
        &self,
        owner_id: &str,
        space_id: &str,
        user_id: &str,
    ) -> Result<(), LedgerError> {
        let space = self.storage.get_space(owner_id, space_id).await?;
        let collaborator = space
            .collaborators
            .get(user_id)
            .ok_or(LedgerError::CollaboratorNotFound)?;

        let mut batch = WriteBatch::new();
        batch.extend(removal_mutations(owner_id, space_id, user_id, collaborator));
        batch.push(Mutation::RefreshSharedFlag {
            owner_id: owner_id.to_owned(),
            space_id: space_id.to_owned(),
        });
        self.storage.commit(&batch).await?;
        Ok(())
    }
}
