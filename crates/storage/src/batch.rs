use sharekeep_core::Role;

use crate::{Collaborator, InviteRecord, SharedSpaceRef};

/// A single write in a [`WriteBatch`].
///
/// Conditional mutations fail with a specific [`crate::StorageError`] when
/// their precondition does not hold, which aborts the whole batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// Fails with `InviteCodeTaken` if the code already exists.
    CreateInvite(InviteRecord),
    /// Sets the consumer of an unconsumed invite. Fails with
    /// `InviteAlreadyConsumed` if any consumer is already recorded.
    ConsumeInvite { code: String, consumer_id: String },
    /// Deletes an invite created by `owner_id`.
    DeleteInvite { code: String, owner_id: String },
    /// Deletes every invite for the space, consumed or not.
    DeleteSpaceInvites { owner_id: String, space_id: String },
    /// Inserts a membership entry. Fails with `CollaboratorExists` if the
    /// user is already a member.
    PutCollaborator {
        owner_id: String,
        space_id: String,
        user_id: String,
        collaborator: Collaborator,
    },
    /// Removes a membership entry. Fails with `CollaboratorNotFound` if the
    /// user is not a member and with `MembershipChanged` if the stored entry
    /// no longer carries `role` and `space_name`, the values its reverse-index
    /// tuple was derived from.
    RemoveCollaborator {
        owner_id: String,
        space_id: String,
        user_id: String,
        role: Role,
        space_name: String,
    },
    AddSharedSpace { user_id: String, entry: SharedSpaceRef },
    /// Removes the exact tuple from the user's set. Absent tuples are ignored.
    RemoveSharedSpace { user_id: String, entry: SharedSpaceRef },
    /// Recomputes `is_shared` from the membership as left by the preceding
    /// mutations of the same batch.
    RefreshSharedFlag { owner_id: String, space_id: String },
    /// Fails with `MembershipChanged` if the space still has members.
    RequireNoCollaborators { owner_id: String, space_id: String },
    DeleteSpace { owner_id: String, space_id: String },
}

impl Mutation {
    /// The space document this mutation reads or writes, if any. Backends
    /// lock these before applying the batch.
    #[must_use]
    pub fn space_key(&self) -> Option<(&str, &str)> {
        match self {
            Self::PutCollaborator {
                owner_id, space_id, ..
            }
            | Self::RemoveCollaborator {
                owner_id, space_id, ..
            }
            | Self::RefreshSharedFlag { owner_id, space_id }
            | Self::RequireNoCollaborators { owner_id, space_id }
            | Self::DeleteSpace { owner_id, space_id } => Some((owner_id, space_id)),
            Self::CreateInvite(_)
            | Self::ConsumeInvite { .. }
            | Self::DeleteInvite { .. }
            | Self::DeleteSpaceInvites { .. }
            | Self::AddSharedSpace { .. }
            | Self::RemoveSharedSpace { .. } => None,
        }
    }
}

/// Ordered set of mutations committed atomically.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    mutations: Vec<Mutation>,
}

impl WriteBatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, mutation: Mutation) -> &mut Self {
        self.mutations.push(mutation);
        self
    }

    pub fn extend(&mut self, mutations: impl IntoIterator<Item = Mutation>) -> &mut Self {
        self.mutations.extend(mutations);
        self
    }

    #[must_use]
    pub fn mutations(&self) -> &[Mutation] {
        &self.mutations
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    /// Distinct space keys touched by the batch, sorted so concurrent batches
    /// lock in the same order.
    #[must_use]
    pub fn space_keys(&self) -> Vec<(&str, &str)> {
        let mut keys: Vec<_> = self.mutations.iter().filter_map(Mutation::space_key).collect();
        keys.sort_unstable();
        keys.dedup();
        keys
    }
}

impl From<Vec<Mutation>> for WriteBatch {
    fn from(mutations: Vec<Mutation>) -> Self {
        Self { mutations }
    }
}
