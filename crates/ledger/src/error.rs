use sharekeep_core::protocol::ErrorKind;
use sharekeep_core::validation::ValidationError;
use sharekeep_storage::StorageError;

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error(transparent)]
    InvalidArgument(#[from] ValidationError),
    #[error("role must be \"viewer\" or \"editor\", got {0:?}")]
    InvalidRole(String),
    #[error("you cannot accept an invite to your own space")]
    SelfInvite,
    #[error("the space owner cannot leave their own space")]
    OwnerCannotLeave,
    #[error("space not found")]
    SpaceNotFound,
    #[error("invite not found")]
    InviteNotFound,
    #[error("collaborator not found")]
    CollaboratorNotFound,
    #[error("invite has expired")]
    InviteExpired,
    #[error("space membership changed concurrently, retry")]
    MembershipChanged,
    #[error("invite has already been used")]
    InviteConsumed,
    #[error("already a member of this space")]
    AlreadyMember,
    #[error("could not allocate a unique invite code")]
    CodeSpaceExhausted,
    #[error("storage failure: {0}")]
    Storage(StorageError),
}

impl LedgerError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument(_)
            | Self::InvalidRole(_)
            | Self::SelfInvite
            | Self::OwnerCannotLeave => ErrorKind::InvalidArgument,
            Self::SpaceNotFound | Self::InviteNotFound | Self::CollaboratorNotFound => {
                ErrorKind::NotFound
            }
            Self::InviteExpired | Self::MembershipChanged => ErrorKind::FailedPrecondition,
            Self::InviteConsumed | Self::AlreadyMember => ErrorKind::AlreadyExists,
            Self::CodeSpaceExhausted | Self::Storage(_) => ErrorKind::Internal,
        }
    }
}

impl From<StorageError> for LedgerError {
    fn from(error: StorageError) -> Self {
        match error {
            StorageError::SpaceNotFound => Self::SpaceNotFound,
            StorageError::InviteNotFound => Self::InviteNotFound,
            StorageError::CollaboratorNotFound => Self::CollaboratorNotFound,
            StorageError::CollaboratorExists => Self::AlreadyMember,
            StorageError::InviteAlreadyConsumed => Self::InviteConsumed,
            StorageError::MembershipChanged => Self::MembershipChanged,
            other => Self::Storage(other),
        }
    }
}
