//! Infrastructure layer: credential storage backends and configuration.

pub mod backend;
pub mod config;
pub mod credential_store;

pub use backend::{BackendError, CredentialBackend};
pub use config::{AuthConfig, ConfigError};
pub use credential_store::{InMemoryCredentialStore, PostgresCredentialStore};
