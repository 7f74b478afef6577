//! Durable user creation: validate, hash, persist with role grants.

use thiserror::Error;
use tracing::{info, instrument};

use sghm_core::DomainError;

use crate::{CredentialStoreError, PasswordHashError, PasswordHasher, User, UserDirectory, UserRecord};

/// Registration request, password in plaintext.
#[derive(Clone, PartialEq, Eq)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    /// Authority strings, e.g. `"ROLE_ADMIN"`.
    pub roles: Vec<String>,
}

impl core::fmt::Debug for NewUser {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("NewUser")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("roles", &self.roles)
            .finish()
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("{0}")]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(CredentialStoreError),

    #[error(transparent)]
    Hashing(#[from] PasswordHashError),
}

impl From<CredentialStoreError> for RegistrationError {
    fn from(value: CredentialStoreError) -> Self {
        match value {
            CredentialStoreError::Duplicate(what) => {
                Self::Domain(DomainError::conflict(format!("email already registered ({what})")))
            }
            other => Self::Store(other),
        }
    }
}

/// Creates users through a [`UserDirectory`], hashing with an injected hasher.
#[derive(Debug, Clone)]
pub struct UserRegistration<D, H> {
    directory: D,
    hasher: H,
}

impl<D, H> UserRegistration<D, H>
where
    D: UserDirectory,
    H: PasswordHasher,
{
    pub fn new(directory: D, hasher: H) -> Self {
        Self { directory, hasher }
    }

    /// Register `new_user` and return the stored record with its roles.
    ///
    /// The email is trimmed and lower-cased before it is stored.
    #[instrument(skip(self, new_user), fields(email = %new_user.email))]
    pub fn register(&self, new_user: NewUser) -> Result<User, RegistrationError> {
        let name = new_user.name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("name cannot be empty").into());
        }

        let email = new_user.email.trim().to_lowercase();
        if !is_plausible_email(&email) {
            return Err(DomainError::validation("invalid email format").into());
        }

        if new_user.password.is_empty() {
            return Err(DomainError::validation("password cannot be empty").into());
        }

        if new_user.roles.is_empty() {
            return Err(DomainError::validation("at least one role is required").into());
        }

        let mut roles = Vec::with_capacity(new_user.roles.len());
        for authority in &new_user.roles {
            let role = self
                .directory
                .find_role_by_authority(authority)?
                .ok_or_else(|| DomainError::validation(format!("unknown role '{authority}'")))?;
            roles.push(role);
        }

        let password_hash = self.hasher.hash(&new_user.password)?;

        let mut role_ids: Vec<_> = roles.iter().map(|r| r.id()).collect();
        role_ids.sort_unstable();
        role_ids.dedup();

        let id = self.directory.insert_user(UserRecord {
            name: name.to_string(),
            email: email.clone(),
            password_hash: password_hash.clone(),
            role_ids,
        })?;

        let mut user = User::new(id, name, email, password_hash);
        for role in roles {
            user.add_role(role);
        }

        info!(user_id = %id, roles = user.authorities().len(), "user registered");
        Ok(user)
    }
}

/// One `@` with a non-empty local part and domain, no whitespace.
fn is_plausible_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && !domain.is_empty() && !domain.contains('@'),
        None => false,
    }
}
