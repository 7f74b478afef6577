//! User entity for credential checks and role-based authorization.
//!
//! A `User` is either a full record (built by the registration path with a
//! storage-assigned id) or a projection rebuilt by the resolution service from
//! credential rows, carrying only the email, password hash and roles.

use std::collections::HashSet;
use std::hash::{Hash, Hasher};

use serde::Serialize;

use sghm_core::{Entity, UserId};

use crate::{Authority, Credential, Role};

// ─────────────────────────────────────────────────────────────────────────────
// User
// ─────────────────────────────────────────────────────────────────────────────

/// User identity record.
///
/// # Invariants
/// - `email` is unique across users (enforced by the store, not here).
/// - `roles` holds at most one role per role id.
/// - Role membership is add-only through this type.
///
/// Equality and hashing use `id` only. Two users without an id compare
/// equal, so don't rely on equality for users that were never persisted.
#[derive(Debug, Clone, Default, Serialize)]
pub struct User {
    id: Option<UserId>,
    name: Option<String>,
    email: String,
    #[serde(skip_serializing)]
    password_hash: String,
    roles: HashSet<Role>,
}

impl User {
    /// Full record as stored.
    pub fn new(
        id: UserId,
        name: impl Into<String>,
        email: impl Into<String>,
        password_hash: impl Into<String>,
    ) -> Self {
        Self {
            id: Some(id),
            name: Some(name.into()),
            email: email.into(),
            password_hash: password_hash.into(),
            roles: HashSet::new(),
        }
    }

    /// Partial projection: enough for a password comparison and for
    /// enumerating authorities, nothing more.
    pub fn projection(email: impl Into<String>, password_hash: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password_hash: password_hash.into(),
            ..Default::default()
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    /// Login identifier (the email).
    pub fn username(&self) -> &str {
        &self.email
    }

    pub fn password_hash(&self) -> &str {
        &self.password_hash
    }

    /// Every granted role.
    pub fn authorities(&self) -> &HashSet<Role> {
        &self.roles
    }

    /// Adds `role` unless a role with the same id is already present.
    ///
    /// Returns whether the role was inserted.
    pub fn add_role(&mut self, role: Role) -> bool {
        self.roles.insert(role)
    }

    /// Exact, case-sensitive match against the authority of any held role.
    pub fn has_role(&self, name: &str) -> bool {
        self.roles.iter().any(|r| r.authority() == name)
    }
}

impl Entity for User {
    type Id = UserId;

    fn id(&self) -> Option<Self::Id> {
        self.id
    }
}

impl PartialEq for User {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for User {}

impl Hash for User {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl Credential for User {
    fn identifier(&self) -> &str {
        &self.email
    }

    fn secret_hash(&self) -> &str {
        &self.password_hash
    }

    fn capabilities(&self) -> Vec<&str> {
        self.roles.iter().map(|r| r.authority()).collect()
    }

    fn has_capability(&self, authority: &str) -> bool {
        self.has_role(authority)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
