use std::borrow::Cow;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use sghm_core::{RoleId, ValueObject};

use crate::Authority;

/// Authority granted to administrators.
pub const ROLE_ADMIN: &str = "ROLE_ADMIN";

/// Authority granted to front-desk operators.
pub const ROLE_OPERATOR: &str = "ROLE_OPERATOR";

/// Authorization label referenced by users.
///
/// Roles are created by an administrative process and never mutated once
/// persisted. Equality and hashing use `id` only, so two instances carrying
/// the same id collapse to one entry in a role set even if their authority
/// strings differ.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    id: RoleId,
    authority: Cow<'static, str>,
}

impl Role {
    pub fn new(id: RoleId, authority: impl Into<Cow<'static, str>>) -> Self {
        Self {
            id,
            authority: authority.into(),
        }
    }

    pub fn id(&self) -> RoleId {
        self.id
    }
}

impl Authority for Role {
    fn authority(&self) -> &str {
        &self.authority
    }
}

impl PartialEq for Role {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Role {}

impl Hash for Role {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl ValueObject for Role {}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.authority)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn role(id: i64, authority: &'static str) -> Role {
        Role::new(RoleId::new(id), authority)
    }

    #[test]
    fn equality_is_by_id_only() {
        assert_eq!(role(1, "ROLE_ADMIN"), role(1, "ROLE_RENAMED"));
        assert_ne!(role(1, "ROLE_ADMIN"), role(2, "ROLE_ADMIN"));
    }

    #[test]
    fn set_keeps_first_instance_for_an_id() {
        let mut set = HashSet::new();
        assert!(set.insert(role(1, "ROLE_ADMIN")));
        assert!(!set.insert(role(1, "ROLE_OTHER")));
        assert_eq!(set.len(), 1);
        assert_eq!(set.iter().next().unwrap().authority(), "ROLE_ADMIN");
    }

    #[test]
    fn serializes_id_and_authority() {
        let json = serde_json::to_value(role(3, ROLE_OPERATOR)).unwrap();
        assert_eq!(json, serde_json::json!({ "id": 3, "authority": "ROLE_OPERATOR" }));
    }
}
