//! Logical document paths.
//!
//! Spaces and usage counters are named by these paths in log fields; object
//! paths follow the same `users/{user_id}/...` convention.

/// `users/{owner_id}/spaces/{space_id}`
#[must_use]
pub fn space(owner_id: &str, space_id: &str) -> String {
    format!("users/{owner_id}/spaces/{space_id}")
}

/// `userStorage/{user_id}`
#[must_use]
pub fn storage_usage(user_id: &str) -> String {
    format!("userStorage/{user_id}")
}

/// Extracts the owning user id from an object path of the form
/// `users/{user_id}/...`. Anything else, including a bare `users/{user_id}`
/// with no object below it, yields `None`.
#[must_use]
pub fn object_owner(path: &str) -> Option<&str> {
    let rest = path.strip_prefix("users/")?;
    let (user_id, object) = rest.split_once('/')?;
    if user_id.is_empty() || object.is_empty() {
        return None;
    }
    Some(user_id)
}
