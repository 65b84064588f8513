use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::Role;

/// Formats a timestamp the way every response body carries it.
pub fn format_timestamp(value: SystemTime) -> Result<String, time::error::Format> {
    OffsetDateTime::from(value).format(&Rfc3339)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateInviteParams {
    #[serde(rename = "role")]
    pub role: String,
    #[serde(rename = "expiresInDays", default)]
    pub expires_in_days: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateInviteResult {
    #[serde(rename = "inviteCode")]
    pub invite_code: String,
    #[serde(rename = "expiresAt")]
    pub expires_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptInviteResult {
    #[serde(rename = "success")]
    pub success: bool,
    #[serde(rename = "spaceName")]
    pub space_name: String,
    #[serde(rename = "role")]
    pub role: Role,
    #[serde(rename = "alreadyJoined")]
    pub already_joined: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuccessResult {
    #[serde(rename = "success")]
    pub success: bool,
}

impl SuccessResult {
    #[must_use]
    pub fn ok() -> Self {
        Self { success: true }
    }
}

/// InviteView is an active invite as listed to the space owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InviteView {
    #[serde(rename = "code")]
    pub code: String,
    #[serde(rename = "spaceId")]
    pub space_id: String,
    #[serde(rename = "spaceName")]
    pub space_name: String,
    #[serde(rename = "role")]
    pub role: Role,
    #[serde(rename = "createdAt")]
    pub created_at: String,
    #[serde(rename = "expiresAt")]
    pub expires_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListInvitesResult {
    #[serde(rename = "invites")]
    pub invites: Vec<InviteView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PutSpaceParams {
    #[serde(rename = "name", default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollaboratorView {
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "role")]
    pub role: Role,
    #[serde(rename = "displayName")]
    pub display_name: String,
    #[serde(rename = "addedAt")]
    pub added_at: String,
}

/// SpaceView is the owner's view of one of their spaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpaceView {
    #[serde(rename = "spaceId")]
    pub space_id: String,
    #[serde(rename = "name")]
    pub name: String,
    #[serde(rename = "isShared")]
    pub is_shared: bool,
    #[serde(rename = "collaborators")]
    pub collaborators: Vec<CollaboratorView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedSpaceView {
    #[serde(rename = "ownerId")]
    pub owner_id: String,
    #[serde(rename = "spaceId")]
    pub space_id: String,
    #[serde(rename = "spaceName")]
    pub space_name: String,
    #[serde(rename = "role")]
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedWithMeResult {
    #[serde(rename = "spaces")]
    pub spaces: Vec<SharedSpaceView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageUsageView {
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "bytesUsed")]
    pub bytes_used: u64,
    #[serde(rename = "updatedAt", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageEventKind {
    Finalize,
    Delete,
}

/// StorageEvent is what the object store posts after an upload or delete
/// completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageEvent {
    #[serde(rename = "kind")]
    pub kind: StorageEventKind,
    #[serde(rename = "path")]
    pub path: String,
    #[serde(rename = "size")]
    pub size: u64,
}
