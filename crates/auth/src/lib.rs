//! `sghm-auth` — credential resolution and role-based authorization.
//!
//! This crate is intentionally decoupled from HTTP and storage: persistence is
//! reached through the [`CredentialStore`] and [`UserDirectory`] traits, and
//! password hashing through an injected [`PasswordHasher`].

pub mod authenticate;
pub mod authorize;
pub mod credential;
pub mod password;
pub mod registration;
pub mod resolve;
pub mod roles;
pub mod store;
pub mod user;

pub use authenticate::{AuthenticationError, Authenticator};
pub use authorize::{AuthzError, require_admin, require_role, require_staff};
pub use credential::{Authority, Credential};
pub use password::{Argon2PasswordHasher, PasswordHashError, PasswordHasher, PasswordPolicy};
pub use registration::{NewUser, RegistrationError, UserRegistration};
pub use resolve::{ResolveError, UserResolutionService};
pub use roles::{ROLE_ADMIN, ROLE_OPERATOR, Role};
pub use store::{CredentialRow, CredentialStore, CredentialStoreError, UserDirectory, UserRecord};
pub use user::User;
