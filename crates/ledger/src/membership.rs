use sharekeep_storage::{Collaborator, Mutation, SharedSpaceRef, SpaceRecord};

/// The reverse-index tuple a membership entry implies. Every grant and
/// removal goes through this, so the two documents can't drift apart.
pub(crate) fn shared_entry(
    owner_id: &str,
    space_id: &str,
    collaborator: &Collaborator,
) -> SharedSpaceRef {
    SharedSpaceRef {
        owner_id: owner_id.to_owned(),
        space_id: space_id.to_owned(),
        space_name: collaborator.space_name.clone(),
        role: collaborator.role,
    }
}

pub(crate) fn grant_mutations(
    owner_id: &str,
    space_id: &str,
    user_id: &str,
    collaborator: Collaborator,
) -> [Mutation; 3] {
    let entry = shared_entry(owner_id, space_id, &collaborator);
    [
        Mutation::PutCollaborator {
            owner_id: owner_id.to_owned(),
            space_id: space_id.to_owned(),
            user_id: user_id.to_owned(),
            collaborator,
        },
        Mutation::AddSharedSpace {
            user_id: user_id.to_owned(),
            entry,
        },
        Mutation::RefreshSharedFlag {
            owner_id: owner_id.to_owned(),
            space_id: space_id.to_owned(),
        },
    ]
}

/// Removes one member and their tuple. The caller appends the mutation that
/// settles `is_shared` (a refresh, or the space deletion).
pub(crate) fn removal_mutations(
    owner_id: &str,
    space_id: &str,
    user_id: &str,
    collaborator: &Collaborator,
) -> [Mutation; 2] {
    [
        Mutation::RemoveCollaborator {
            owner_id: owner_id.to_owned(),
            space_id: space_id.to_owned(),
            user_id: user_id.to_owned(),
            role: collaborator.role,
            space_name: collaborator.space_name.clone(),
        },
        Mutation::RemoveSharedSpace {
            user_id: user_id.to_owned(),
            entry: shared_entry(owner_id, space_id, collaborator),
        },
    ]
}

/// Removal of every current member plus every invite of the space. Ends with
/// a check that nobody joined between the read and the commit.
pub(crate) fn purge_mutations(space: &SpaceRecord) -> Vec<Mutation> {
    let mut mutations = Vec::with_capacity(space.collaborators.len() * 2 + 2);
    for (user_id, collaborator) in &space.collaborators {
        mutations.extend(removal_mutations(
            &space.owner_id,
            &space.space_id,
            user_id,
            collaborator,
        ));
    }
    mutations.push(Mutation::DeleteSpaceInvites {
        owner_id: space.owner_id.clone(),
        space_id: space.space_id.clone(),
    });
    mutations.push(Mutation::RequireNoCollaborators {
        owner_id: space.owner_id.clone(),
        space_id: space.space_id.clone(),
    });
    mutations
}

#[cfg(test)]
mod tests {
    use std::time::UNIX_EPOCH;

    use sharekeep_core::Role;

    use super::*;

    #[test]
    fn grant_and_removal_use_the_same_tuple() {
        let collaborator = Collaborator {
            role: Role::Editor,
            display_name: "Ada".to_owned(),
            space_name: "Chores".to_owned(),
            added_at: UNIX_EPOCH,
        };
        let granted = grant_mutations("owner", "chores", "ada", collaborator.clone());
        let removed = removal_mutations("owner", "chores", "ada", &collaborator);

        let Mutation::AddSharedSpace { entry: added, .. } = &granted[1] else {
            panic!("expected AddSharedSpace, got {:?}", granted[1]);
        };
        let Mutation::RemoveSharedSpace { entry: dropped, .. } = &removed[1] else {
            panic!("expected RemoveSharedSpace, got {:?}", removed[1]);
        };
        assert_eq!(added, dropped);
        assert_eq!(added.space_name, "Chores");
        assert_eq!(added.role, Role::Editor);
    }
}
