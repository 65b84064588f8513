use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Access level granted to a collaborator on a shared space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Viewer,
    Editor,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Viewer => "viewer",
            Self::Editor => "editor",
        }
    }

    #[must_use]
    pub fn can_edit(self) -> bool {
        self == Self::Editor
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
#[error("unknown role {0:?}: expected \"viewer\" or \"editor\"")]
pub struct ParseRoleError(pub String);

impl FromStr for Role {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "viewer" => Ok(Self::Viewer),
            "editor" => Ok(Self::Editor),
            _ => Err(ParseRoleError(s.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ParseRoleError, Role};

    #[test]
    fn parse_known_roles() {
        assert_eq!("viewer".parse::<Role>().expect("viewer"), Role::Viewer);
        assert_eq!("editor".parse::<Role>().expect("editor"), Role::Editor);
    }

    #[test]
    fn parse_rejects_unknown_and_case_variants() {
        assert_eq!(
            "owner".parse::<Role>(),
            Err(ParseRoleError("owner".to_owned()))
        );
        assert!("Editor".parse::<Role>().is_err());
        assert!("".parse::<Role>().is_err());
    }

    #[test]
    fn role_serializes_lowercase() {
        let encoded = serde_json::to_string(&Role::Editor).expect("encode");
        assert_eq!(encoded, "\"editor\"");
        let decoded: Role = serde_json::from_str("\"viewer\"").expect("decode");
        assert_eq!(decoded, Role::Viewer);
    }

    #[test]
    fn only_editors_can_edit() {
        assert!(Role::Editor.can_edit());
        assert!(!Role::Viewer.can_edit());
    }
}
