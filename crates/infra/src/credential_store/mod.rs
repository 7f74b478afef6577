//! Credential store backends.
//!
//! Both backends implement the read side ([`sghm_auth::CredentialStore`]) and
//! the write side ([`sghm_auth::UserDirectory`]) over the same three tables:
//! users, roles, and the user/role join rows.

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryCredentialStore;
pub use postgres::PostgresCredentialStore;
