use thiserror::Error;

/// Invite code symbols. Excludes `0 O o 1 I l` so codes survive being read
/// aloud or copied by hand.
pub const INVITE_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnpqrstuvwxyz23456789";
pub const INVITE_CODE_LENGTH: usize = 8;

pub const DEFAULT_INVITE_TTL_DAYS: u32 = 7;
pub const MAX_INVITE_TTL_DAYS: u32 = 30;

pub const MAX_IDENTIFIER_LENGTH: usize = 128;
pub const MAX_SPACE_NAME_LENGTH: usize = 200;
pub const MAX_DISPLAY_NAME_LENGTH: usize = 200;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid {0}: must be 1-128 characters without '/' or control characters")]
    InvalidIdentifier(&'static str),
    #[error("invalid invite code")]
    InvalidInviteCode,
    #[error("expiresInDays must be between 1 and {MAX_INVITE_TTL_DAYS}, got {0}")]
    InvalidTtl(u32),
    #[error("space name exceeds {MAX_SPACE_NAME_LENGTH} characters")]
    SpaceNameTooLong,
}

pub fn validate_user_id(id: &str) -> Result<(), ValidationError> {
    validate_identifier(id, "user id")
}

pub fn validate_space_id(id: &str) -> Result<(), ValidationError> {
    validate_identifier(id, "space id")
}

pub fn validate_invite_code(code: &str) -> Result<(), ValidationError> {
    if code.len() == INVITE_CODE_LENGTH
        && code.bytes().all(|b| INVITE_CODE_ALPHABET.contains(&b))
    {
        Ok(())
    } else {
        Err(ValidationError::InvalidInviteCode)
    }
}

pub fn validate_ttl_days(days: u32) -> Result<(), ValidationError> {
    if (1..=MAX_INVITE_TTL_DAYS).contains(&days) {
        Ok(())
    } else {
        Err(ValidationError::InvalidTtl(days))
    }
}

pub fn validate_space_name(name: &str) -> Result<(), ValidationError> {
    if name.chars().count() > MAX_SPACE_NAME_LENGTH {
        return Err(ValidationError::SpaceNameTooLong);
    }
    Ok(())
}

/// Trims a display name snapshot to the stored maximum. Names come from the
/// identity provider and are informational only, so they are clipped rather
/// than rejected.
#[must_use]
pub fn clip_display_name(name: &str) -> String {
    name.trim().chars().take(MAX_DISPLAY_NAME_LENGTH).collect()
}

fn validate_identifier(id: &str, label: &'static str) -> Result<(), ValidationError> {
    // Identifiers become path segments, so '/' is never allowed.
    let ok = !id.is_empty()
        && id.len() <= MAX_IDENTIFIER_LENGTH
        && !id.chars().any(|c| c == '/' || c.is_control());
    if ok {
        Ok(())
    } else {
        Err(ValidationError::InvalidIdentifier(label))
    }
}
