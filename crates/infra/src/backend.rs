//! Credential store selection.
//!
//! `USE_PERSISTENT_STORES=false` (the default) gives an in-memory store seeded
//! with the built-in roles; `true` gives Postgres at `DATABASE_URL`.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, instrument};

use sghm_auth::{
    CredentialRow, CredentialStore, CredentialStoreError, ROLE_ADMIN, ROLE_OPERATOR, Role, User,
    UserDirectory, UserRecord,
};
use sghm_core::UserId;

use crate::{AuthConfig, ConfigError, InMemoryCredentialStore, PostgresCredentialStore};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] CredentialStoreError),
}

/// The credential store picked by [`AuthConfig`].
#[derive(Debug, Clone)]
pub enum CredentialBackend {
    InMemory(Arc<InMemoryCredentialStore>),
    Postgres(PostgresCredentialStore),
}

impl CredentialBackend {
    /// Open the backend `config` asks for.
    ///
    /// The Postgres pool connects lazily, but building it needs a Tokio runtime.
    #[instrument(skip(config), fields(persistent = config.use_persistent_stores))]
    pub fn open(config: &AuthConfig) -> Result<Self, BackendError> {
        if !config.use_persistent_stores {
            info!("using in-memory credential store");
            let store = InMemoryCredentialStore::with_roles([ROLE_ADMIN, ROLE_OPERATOR]);
            return Ok(Self::InMemory(Arc::new(store)));
        }

        let url = config
            .database_url
            .as_deref()
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let store = PostgresCredentialStore::connect_lazy(url)?;

        info!("using postgres credential store");
        Ok(Self::Postgres(store))
    }
}

impl CredentialStore for CredentialBackend {
    fn search_user_and_roles_by_email(&self, email: &str) -> Result<Vec<CredentialRow>, CredentialStoreError> {
        match self {
            Self::InMemory(store) => store.search_user_and_roles_by_email(email),
            Self::Postgres(store) => store.search_user_and_roles_by_email(email),
        }
    }
}

impl UserDirectory for CredentialBackend {
    fn find_role_by_authority(&self, authority: &str) -> Result<Option<Role>, CredentialStoreError> {
        match self {
            Self::InMemory(store) => store.find_role_by_authority(authority),
            Self::Postgres(store) => store.find_role_by_authority(authority),
        }
    }

    fn find_user_by_email(&self, email: &str) -> Result<Option<User>, CredentialStoreError> {
        match self {
            Self::InMemory(store) => store.find_user_by_email(email),
            Self::Postgres(store) => store.find_user_by_email(email),
        }
    }

    fn insert_user(&self, record: UserRecord) -> Result<UserId, CredentialStoreError> {
        match self {
            Self::InMemory(store) => store.insert_user(record),
            Self::Postgres(store) => store.insert_user(record),
        }
    }
}
