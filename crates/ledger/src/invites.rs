use std::time::Duration;

use sharekeep_core::validation::{
    clip_display_name, validate_invite_code, validate_space_id, validate_ttl_days,
    validate_user_id, DEFAULT_INVITE_TTL_DAYS,
};
use sharekeep_core::{paths, Role};
use sharekeep_storage::{Collaborator, InviteRecord, Mutation, StorageError, WriteBatch};

use crate::membership::grant_mutations;
use crate::{LedgerError, SharingService};

/// Code generation attempts before giving up on a collision streak.
pub const MAX_CODE_ATTEMPTS: usize = 5;

const SECONDS_PER_DAY: u64 = 86_400;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptOutcome {
    pub space_name: String,
    pub role: Role,
    pub already_joined: bool,
}

impl SharingService {
    /// Issues a single-use invite to the caller's space.
    pub async fn create_invite(
        &self,
        caller_id: &str,
        space_id: &str,
        role: &str,
        ttl_days: Option<u32>,
    ) -> Result<InviteRecord, LedgerError> {
        validate_user_id(caller_id)?;
        validate_space_id(space_id)?;
        let role: Role = role
            .parse()
            .map_err(|_| LedgerError::InvalidRole(role.to_owned()))?;
        let ttl_days = ttl_days.unwrap_or(DEFAULT_INVITE_TTL_DAYS);
        validate_ttl_days(ttl_days)?;

        let space = self.storage.get_space(caller_id, space_id).await?;
        let created_at = self.clock.now();
        let expires_at = created_at + Duration::from_secs(u64::from(ttl_days) * SECONDS_PER_DAY);

        for attempt in 1..=MAX_CODE_ATTEMPTS {
            let invite = InviteRecord {
                code: self.codes.generate(),
                owner_id: space.owner_id.clone(),
                space_id: space.space_id.clone(),
                space_name: space.name.clone(),
                role,
                created_at,
                expires_at,
                consumer_id: None,
            };
            let batch = WriteBatch::from(vec![Mutation::CreateInvite(invite.clone())]);
            match self.storage.commit(&batch).await {
                Ok(()) => {
                    tracing::info!(
                        space = %paths::space(caller_id, space_id),
                        role = %role,
                        ttl_days,
                        "invite created"
                    );
                    return Ok(invite);
                }
                Err(StorageError::InviteCodeTaken) => {
                    tracing::debug!(attempt, "invite code collision");
                }
                Err(error) => return Err(error.into()),
            }
        }

        tracing::error!(
            space = %paths::space(caller_id, space_id),
            attempts = MAX_CODE_ATTEMPTS,
            "invite code space exhausted"
        );
        Err(LedgerError::CodeSpaceExhausted)
    }

    /// Claims an invite for the caller and grants the access it carries.
    ///
    /// Accepting an invite the caller already claimed is a successful no-op
    /// reported through `already_joined`.
    pub async fn accept_invite(
        &self,
        caller_id: &str,
        display_name: &str,
        code: &str,
    ) -> Result<AcceptOutcome, LedgerError> {
        validate_user_id(caller_id)?;
        // A malformed code cannot name a stored invite.
        validate_invite_code(code).map_err(|_| LedgerError::InviteNotFound)?;

        let invite = self.storage.get_invite(code).await?;
        if invite.owner_id == caller_id {
            return Err(LedgerError::SelfInvite);
        }
        if let Some(outcome) = self.claimed_outcome(&invite, caller_id).await? {
            return Ok(outcome);
        }
        if invite.is_expired(self.clock.now()) {
            return Err(LedgerError::InviteExpired);
        }

        let space = self
            .storage
            .get_space(&invite.owner_id, &invite.space_id)
            .await?;
        if space.collaborators.contains_key(caller_id) {
            // The invite read may predate our own earlier accept of it.
            return self
                .settle_conflict(code, caller_id, LedgerError::AlreadyMember)
                .await;
        }

        let collaborator = Collaborator {
            role: invite.role,
            display_name: clip_display_name(display_name),
            space_name: space.name,
            added_at: self.clock.now(),
        };
        let outcome = AcceptOutcome {
            space_name: collaborator.space_name.clone(),
            role: invite.role,
            already_joined: false,
        };
        let mut batch = WriteBatch::new();
        batch.push(Mutation::ConsumeInvite {
            code: invite.code.clone(),
            consumer_id: caller_id.to_owned(),
        });
        batch.extend(grant_mutations(
            &invite.owner_id,
            &invite.space_id,
            caller_id,
            collaborator,
        ));

        match self.storage.commit(&batch).await {
            Ok(()) => {}
            Err(StorageError::InviteAlreadyConsumed) => {
                // Lost the race; the winner decides what this caller sees.
                return self
                    .settle_conflict(code, caller_id, LedgerError::InviteConsumed)
                    .await;
            }
            Err(StorageError::CollaboratorExists) => {
                return self
                    .settle_conflict(code, caller_id, LedgerError::AlreadyMember)
                    .await;
            }
            Err(error) => return Err(error.into()),
        }

        tracing::info!(
            space = %paths::space(&invite.owner_id, &invite.space_id),
            user_id = %caller_id,
            role = %invite.role,
            "invite accepted"
        );
        Ok(outcome)
    }

    /// Unconsumed, unexpired invites of the caller's space, oldest first.
    pub async fn list_active_invites(
        &self,
        caller_id: &str,
        space_id: &str,
    ) -> Result<Vec<InviteRecord>, LedgerError> {
        validate_user_id(caller_id)?;
        validate_space_id(space_id)?;
        self.storage.get_space(caller_id, space_id).await?;
        Ok(self
            .storage
            .list_active_invites(caller_id, space_id, self.clock.now())
            .await?)
    }

    /// Deletes one of the caller's invites. Invites of other owners are
    /// indistinguishable from unknown codes.
    pub async fn revoke_invite(&self, caller_id: &str, code: &str) -> Result<(), LedgerError> {
        validate_user_id(caller_id)?;
        validate_invite_code(code).map_err(|_| LedgerError::InviteNotFound)?;

        let batch = WriteBatch::from(vec![Mutation::DeleteInvite {
            code: code.to_owned(),
            owner_id: caller_id.to_owned(),
        }]);
        self.storage.commit(&batch).await?;

        tracing::info!(owner_id = %caller_id, "invite revoked");
        Ok(())
    }

    /// Re-reads the invite after a conflicting write. The caller's own
    /// earlier claim wins over `fallback`.
    async fn settle_conflict(
        &self,
        code: &str,
        caller_id: &str,
        fallback: LedgerError,
    ) -> Result<AcceptOutcome, LedgerError> {
        let invite = self.storage.get_invite(code).await?;
        match invite.consumer_id.as_deref() {
            Some(consumer) if consumer == caller_id => {
                Ok(self.joined_outcome(&invite, caller_id).await?)
            }
            _ => Err(fallback),
        }
    }

    /// `Some` when the caller already holds this invite, an error when
    /// someone else does, `None` while it is unclaimed.
    async fn claimed_outcome(
        &self,
        invite: &InviteRecord,
        caller_id: &str,
    ) -> Result<Option<AcceptOutcome>, LedgerError> {
        match invite.consumer_id.as_deref() {
            None => Ok(None),
            Some(consumer) if consumer == caller_id => {
                Ok(Some(self.joined_outcome(invite, caller_id).await?))
            }
            Some(_) => Err(LedgerError::InviteConsumed),
        }
    }

    /// Reports the space name recorded on the caller's grant, the same one
    /// the first accept returned. The invite's copy stands in once the grant
    /// is gone.
    async fn joined_outcome(
        &self,
        invite: &InviteRecord,
        caller_id: &str,
    ) -> Result<AcceptOutcome, StorageError> {
        let granted_name = match self
            .storage
            .get_space(&invite.owner_id, &invite.space_id)
            .await
        {
            Ok(space) => space
                .collaborators
                .get(caller_id)
                .map(|collaborator| collaborator.space_name.clone()),
            Err(StorageError::SpaceNotFound) => None,
            Err(error) => return Err(error),
        };
        Ok(AcceptOutcome {
            space_name: granted_name.unwrap_or_else(|| invite.space_name.clone()),
            role: invite.role,
            already_joined: true,
        })
    }
}
