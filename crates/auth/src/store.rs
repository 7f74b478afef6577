//! Persistence boundary for credentials and user records.
//!
//! No storage assumptions: in-memory implementations (tests/dev) and SQL
//! backends live in `sghm-infra`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use sghm_core::{RoleId, UserId};

use crate::{Role, User};

/// One (user, role) pairing as returned by the credential query.
///
/// Every row for the same email carries the same password hash; that is a
/// property of the underlying join and is not re-checked by consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRow {
    pub password_hash: String,
    pub role_id: RoleId,
    pub authority: String,
}

impl CredentialRow {
    pub fn new(password_hash: impl Into<String>, role_id: RoleId, authority: impl Into<String>) -> Self {
        Self {
            password_hash: password_hash.into(),
            role_id,
            authority: authority.into(),
        }
    }
}

/// Storage/transport failure.
///
/// These are infrastructure errors; callers decide whether to retry.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CredentialStoreError {
    #[error("credential store unavailable: {0}")]
    Unavailable(String),

    #[error("credential query failed: {0}")]
    Query(String),

    #[error("malformed credential row: {0}")]
    Decode(String),

    /// A uniqueness constraint rejected a write (e.g. email already taken).
    #[error("duplicate entry: {0}")]
    Duplicate(String),
}

/// Read side used by credential resolution.
pub trait CredentialStore: Send + Sync {
    /// All (password hash, role) rows for `email`; empty when the email is unknown.
    fn search_user_and_roles_by_email(&self, email: &str) -> Result<Vec<CredentialRow>, CredentialStoreError>;
}

impl<S> CredentialStore for Arc<S>
where
    S: CredentialStore + ?Sized,
{
    fn search_user_and_roles_by_email(&self, email: &str) -> Result<Vec<CredentialRow>, CredentialStoreError> {
        (**self).search_user_and_roles_by_email(email)
    }
}

/// A user ready to be written, password already hashed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role_ids: Vec<RoleId>,
}

/// Write side used by registration.
pub trait UserDirectory: Send + Sync {
    /// Look up a role by its exact authority string.
    fn find_role_by_authority(&self, authority: &str) -> Result<Option<Role>, CredentialStoreError>;

    /// Full stored record (id, name, roles) for `email`, if any.
    fn find_user_by_email(&self, email: &str) -> Result<Option<User>, CredentialStoreError>;

    /// Insert the user and its role grants atomically, returning the assigned id.
    ///
    /// Must fail with [`CredentialStoreError::Duplicate`] when the email is taken.
    fn insert_user(&self, record: UserRecord) -> Result<UserId, CredentialStoreError>;
}

impl<S> UserDirectory for Arc<S>
where
    S: UserDirectory + ?Sized,
{
    fn find_role_by_authority(&self, authority: &str) -> Result<Option<Role>, CredentialStoreError> {
        (**self).find_role_by_authority(authority)
    }

    fn find_user_by_email(&self, email: &str) -> Result<Option<User>, CredentialStoreError> {
        (**self).find_user_by_email(email)
    }

    fn insert_user(&self, record: UserRecord) -> Result<UserId, CredentialStoreError> {
        (**self).insert_user(record)
    }
}
