//! Credential resolution: "load user by username" for the login pipeline.

use thiserror::Error;
use tracing::{debug, instrument};

use crate::{CredentialRow, CredentialStore, CredentialStoreError, Role, User};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// The username matched no credential rows.
    #[error("user not found with email: {0}")]
    UserNotFound(String),

    #[error(transparent)]
    Store(#[from] CredentialStoreError),
}

/// Resolves a login identifier into a [`User`] projection.
///
/// Stateless: each call is one store query followed by a fold over the rows.
/// No caching, no retry.
#[derive(Debug, Clone)]
pub struct UserResolutionService<S> {
    store: S,
}

impl<S> UserResolutionService<S>
where
    S: CredentialStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Resolve `username` (an email; not validated here).
    ///
    /// The returned user has no `id` or `name`: it carries the password hash of
    /// the first row and one role per distinct role id.
    #[instrument(level = "debug", skip(self))]
    pub fn resolve_by_username(&self, username: &str) -> Result<User, ResolveError> {
        let rows = self.store.search_user_and_roles_by_email(username)?;

        let Some(user) = fold_rows(username, &rows) else {
            debug!("user not found");
            return Err(ResolveError::UserNotFound(username.to_string()));
        };

        debug!(rows = rows.len(), roles = user.authorities().len(), "resolved user");
        Ok(user)
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

/// Fold credential rows into one user; `None` when there are no rows.
fn fold_rows(email: &str, rows: &[CredentialRow]) -> Option<User> {
    let first = rows.first()?;

    let mut user = User::projection(email, first.password_hash.clone());
    for row in rows {
        user.add_role(Role::new(row.role_id, row.authority.clone()));
    }
    Some(user)
}
