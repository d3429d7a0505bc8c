//! Marketplace account roles.

use serde::{Deserialize, Serialize};

/// Role of a marketplace account.
///
/// Stored on the profile record and used by consumers for role-gated
/// routing; the sync layer itself treats roles as opaque data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Farmer,
    #[default]
    Buyer,
}

impl Role {
    /// Stable string form, matching the serialized representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Farmer => "farmer",
            Self::Buyer => "buyer",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_snake_case() {
        assert_eq!(serde_json::to_string(&Role::Farmer).unwrap(), "\"farmer\"");
        let role: Role = serde_json::from_str("\"admin\"").unwrap();
        assert_eq!(role, Role::Admin);
    }

    #[test]
    fn test_as_str_matches_serde() {
        for role in [Role::Admin, Role::Farmer, Role::Buyer] {
            let json = serde_json::to_string(&role).unwrap();
            assert_eq!(json, format!("\"{}\"", role.as_str()));
        }
    }
}
