//! In-process [`crate::Storage`] backend.
//!
//! A commit clones the whole state, applies the batch to the clone and swaps
//! it in only if every mutation succeeded. All of that happens under one
//! lock, so batches are atomic and serialized.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};
use std::time::SystemTime;

use async_trait::async_trait;

use crate::{
    BatchStorage, InviteRecord, InviteStorage, MembershipStorage, Mutation, SharedSpaceRef,
    SpaceRecord, SpaceStorage, StorageError, StorageUsage, UsageStorage, UsageUpdate, WriteBatch,
};

type SpaceKey = (String, String);

#[derive(Debug, Clone, Default)]
struct State {
    spaces: BTreeMap<SpaceKey, SpaceRecord>,
    invites: BTreeMap<String, InviteRecord>,
    shared: BTreeMap<String, BTreeSet<SharedSpaceRef>>,
    usage: BTreeMap<String, StorageUsage>,
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    state: Mutex<State>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, StorageError> {
        self.state.lock().map_err(|_| StorageError::Unavailable)
    }
}

fn space_key(owner_id: &str, space_id: &str) -> SpaceKey {
    (owner_id.to_owned(), space_id.to_owned())
}

impl State {
    fn space_mut(&mut self, owner_id: &str, space_id: &str) -> Result<&mut SpaceRecord, StorageError> {
        self.spaces
            .get_mut(&space_key(owner_id, space_id))
            .ok_or(StorageError::SpaceNotFound)
    }

    fn apply(&mut self, mutation: &Mutation) -> Result<(), StorageError> {
        match mutation {
            Mutation::CreateInvite(invite) => {
                if self.invites.contains_key(&invite.code) {
                    return Err(StorageError::InviteCodeTaken);
                }
                self.invites.insert(invite.code.clone(), invite.clone());
            }
            Mutation::ConsumeInvite { code, consumer_id } => {
                let invite = self
                    .invites
                    .get_mut(code)
                    .ok_or(StorageError::InviteNotFound)?;
                if invite.consumer_id.is_some() {
                    return Err(StorageError::InviteAlreadyConsumed);
                }
                invite.consumer_id = Some(consumer_id.clone());
            }
            Mutation::DeleteInvite { code, owner_id } => {
                match self.invites.get(code) {
                    Some(invite) if invite.owner_id == *owner_id => {}
                    _ => return Err(StorageError::InviteNotFound),
                }
                self.invites.remove(code);
            }
            Mutation::DeleteSpaceInvites { owner_id, space_id } => {
                self.invites
                    .retain(|_, invite| invite.owner_id != *owner_id || invite.space_id != *space_id);
            }
            Mutation::PutCollaborator {
                owner_id,
                space_id,
                user_id,
                collaborator,
            } => {
                if user_id == owner_id {
                    return Err(StorageError::InvalidRecord(
                        "owner cannot be a collaborator".to_owned(),
                    ));
                }
                let space = self.space_mut(owner_id, space_id)?;
                if space.collaborators.contains_key(user_id) {
                    return Err(StorageError::CollaboratorExists);
                }
                space
                    .collaborators
                    .insert(user_id.clone(), collaborator.clone());
            }
            Mutation::RemoveCollaborator {
                owner_id,
                space_id,
                user_id,
                role,
                space_name,
            } => {
                let space = self.space_mut(owner_id, space_id)?;
                let entry = space
                    .collaborators
                    .get(user_id)
                    .ok_or(StorageError::CollaboratorNotFound)?;
                if entry.role != *role || entry.space_name != *space_name {
                    return Err(StorageError::MembershipChanged);
                }
                space.collaborators.remove(user_id);
            }
            Mutation::AddSharedSpace { user_id, entry } => {
                self.shared
                    .entry(user_id.clone())
                    .or_default()
                    .insert(entry.clone());
            }
            Mutation::RemoveSharedSpace { user_id, entry } => {
                if let Some(entries) = self.shared.get_mut(user_id) {
                    entries.remove(entry);
                    if entries.is_empty() {
                        self.shared.remove(user_id);
                    }
                }
            }
            Mutation::RefreshSharedFlag { owner_id, space_id } => {
                let space = self.space_mut(owner_id, space_id)?;
                space.is_shared = !space.collaborators.is_empty();
            }
            Mutation::RequireNoCollaborators { owner_id, space_id } => {
                if !self.space_mut(owner_id, space_id)?.collaborators.is_empty() {
                    return Err(StorageError::MembershipChanged);
                }
            }
            Mutation::DeleteSpace { owner_id, space_id } => {
                self.spaces
                    .remove(&space_key(owner_id, space_id))
                    .ok_or(StorageError::SpaceNotFound)?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl SpaceStorage for MemoryStorage {
    async fn ping(&self) -> Result<(), StorageError> {
        self.lock().map(|_| ())
    }

    async fn get_space(&self, owner_id: &str, space_id: &str) -> Result<SpaceRecord, StorageError> {
        self.lock()?
            .spaces
            .get(&space_key(owner_id, space_id))
            .cloned()
            .ok_or(StorageError::SpaceNotFound)
    }

    async fn put_space(
        &self,
        owner_id: &str,
        space_id: &str,
        name: &str,
    ) -> Result<SpaceRecord, StorageError> {
        let mut state = self.lock()?;
        let space = state
            .spaces
            .entry(space_key(owner_id, space_id))
            .or_insert_with(|| SpaceRecord {
                owner_id: owner_id.to_owned(),
                space_id: space_id.to_owned(),
                name: String::new(),
                is_shared: false,
                collaborators: BTreeMap::new(),
            });
        space.name = name.to_owned();
        Ok(space.clone())
    }
}

#[async_trait]
impl InviteStorage for MemoryStorage {
    async fn get_invite(&self, code: &str) -> Result<InviteRecord, StorageError> {
        self.lock()?
            .invites
            .get(code)
            .cloned()
            .ok_or(StorageError::InviteNotFound)
    }

    async fn list_active_invites(
        &self,
        owner_id: &str,
        space_id: &str,
        now: SystemTime,
    ) -> Result<Vec<InviteRecord>, StorageError> {
        let state = self.lock()?;
        let mut invites: Vec<_> = state
            .invites
            .values()
            .filter(|invite| {
                invite.owner_id == owner_id && invite.space_id == space_id && invite.is_active(now)
            })
            .cloned()
            .collect();
        invites.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.code.cmp(&b.code)));
        Ok(invites)
    }
}

#[async_trait]
impl MembershipStorage for MemoryStorage {
    async fn shared_with_me(&self, user_id: &str) -> Result<Vec<SharedSpaceRef>, StorageError> {
        Ok(self
            .lock()?
            .shared
            .get(user_id)
            .map(|entries| entries.iter().cloned().collect())
            .unwrap_or_default())
    }
}

#[async_trait]
impl BatchStorage for MemoryStorage {
    async fn commit(&self, batch: &WriteBatch) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        let mut next = state.clone();
        for mutation in batch.mutations() {
            next.apply(mutation)?;
        }
        *state = next;
        Ok(())
    }
}

#[async_trait]
impl UsageStorage for MemoryStorage {
    async fn get_usage(&self, user_id: &str) -> Result<Option<StorageUsage>, StorageError> {
        Ok(self.lock()?.usage.get(user_id).cloned())
    }

    async fn update_usage(
        &self,
        user_id: &str,
        update: UsageUpdate,
        now: SystemTime,
    ) -> Result<StorageUsage, StorageError> {
        let mut state = self.lock()?;
        let usage = state
            .usage
            .entry(user_id.to_owned())
            .or_insert_with(|| StorageUsage {
                user_id: user_id.to_owned(),
                bytes_used: 0,
                updated_at: now,
            });
        usage.bytes_used = update.apply(usage.bytes_used);
        usage.updated_at = now;
        Ok(usage.clone())
    }
}
