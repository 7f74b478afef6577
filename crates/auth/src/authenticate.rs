//! Login: resolve credentials, then compare the submitted password.

use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::{
    CredentialStore, CredentialStoreError, PasswordHashError, PasswordHasher, ResolveError, User,
    UserResolutionService,
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthenticationError {
    #[error("email and password are required")]
    MissingCredentials,

    /// Unknown user or wrong password; the caller cannot tell which.
    #[error("invalid credentials")]
    BadCredentials,

    #[error(transparent)]
    Store(#[from] CredentialStoreError),

    #[error(transparent)]
    Hashing(#[from] PasswordHashError),
}

/// Username/password authentication on top of [`UserResolutionService`].
#[derive(Debug, Clone)]
pub struct Authenticator<S, H> {
    resolver: UserResolutionService<S>,
    hasher: H,
}

impl<S, H> Authenticator<S, H>
where
    S: CredentialStore,
    H: PasswordHasher,
{
    pub fn new(resolver: UserResolutionService<S>, hasher: H) -> Self {
        Self { resolver, hasher }
    }

    /// Returns the resolved user projection when `password` matches its hash.
    #[instrument(skip(self, password))]
    pub fn authenticate(&self, email: &str, password: &str) -> Result<User, AuthenticationError> {
        if email.is_empty() || password.is_empty() {
            return Err(AuthenticationError::MissingCredentials);
        }

        let user = match self.resolver.resolve_by_username(email) {
            Ok(user) => user,
            Err(ResolveError::UserNotFound(_)) => {
                warn!(reason = "unknown_user", "authentication rejected");
                return Err(AuthenticationError::BadCredentials);
            }
            Err(ResolveError::Store(e)) => return Err(e.into()),
        };

        if !self.hasher.verify(password, user.password_hash())? {
            warn!(reason = "password_mismatch", "authentication rejected");
            return Err(AuthenticationError::BadCredentials);
        }

        info!(roles = user.authorities().len(), "authenticated");
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use sghm_core::RoleId;

    use super::*;
    use crate::CredentialRow;

    /// Plaintext "hashing" so tests don't pay for Argon2.
    struct Reversed;

    impl PasswordHasher for Reversed {
        fn hash(&self, plaintext: &str) -> Result<String, PasswordHashError> {
            Ok(plaintext.chars().rev().collect())
        }

        fn verify(&self, plaintext: &str, hash: &str) -> Result<bool, PasswordHashError> {
            if hash.is_empty() {
                return Err(PasswordHashError::MalformedHash("empty".into()));
            }
            Ok(self.hash(plaintext)? == hash)
        }
    }

    struct OneUser(Result<Vec<CredentialRow>, CredentialStoreError>);

    impl CredentialStore for OneUser {
        fn search_user_and_roles_by_email(&self, email: &str) -> Result<Vec<CredentialRow>, CredentialStoreError> {
            match &self.0 {
                Ok(rows) if email == "ana@x.com" => Ok(rows.clone()),
                Ok(_) => Ok(vec![]),
                Err(e) => Err(e.clone()),
            }
        }
    }

    fn authenticator(hash: &str) -> Authenticator<OneUser, Reversed> {
        let rows = vec![CredentialRow::new(hash, RoleId::new(1), "ROLE_ADMIN")];
        Authenticator::new(UserResolutionService::new(OneUser(Ok(rows))), Reversed)
    }

    #[test]
    fn correct_password_yields_user() {
        let user = authenticator("654321").authenticate("ana@x.com", "123456").unwrap();
        assert_eq!(user.username(), "ana@x.com");
        assert!(user.has_role("ROLE_ADMIN"));
    }

    #[test]
    fn wrong_password_and_unknown_user_look_the_same() {
        let auth = authenticator("654321");

        let wrong = auth.authenticate("ana@x.com", "nope").unwrap_err();
        let unknown = auth.authenticate("bob@x.com", "123456").unwrap_err();

        assert_eq!(wrong, AuthenticationError::BadCredentials);
        assert_eq!(unknown, AuthenticationError::BadCredentials);
    }

    #[test]
    fn empty_input_is_rejected_before_lookup() {
        let auth = authenticator("654321");
        assert_eq!(auth.authenticate("", "123456").unwrap_err(), AuthenticationError::MissingCredentials);
        assert_eq!(auth.authenticate("ana@x.com", "").unwrap_err(), AuthenticationError::MissingCredentials);
    }

    #[test]
    fn store_failure_is_not_bad_credentials() {
        let store = OneUser(Err(CredentialStoreError::Unavailable("timeout".into())));
        let auth = Authenticator::new(UserResolutionService::new(store), Reversed);

        let err = auth.authenticate("ana@x.com", "123456").unwrap_err();
        assert_eq!(err, AuthenticationError::Store(CredentialStoreError::Unavailable("timeout".into())));
    }

    #[test]
    fn hashing_failure_propagates() {
        let err = authenticator("").authenticate("ana@x.com", "123456").unwrap_err();
        assert!(matches!(err, AuthenticationError::Hashing(PasswordHashError::MalformedHash(_))));
    }
}
