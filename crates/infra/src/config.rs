//! Configuration loading and representation.
//!
//! Everything comes from environment variables:
//!
//! | variable | default |
//! |----------|---------|
//! | `DATABASE_URL` | unset (required when persistent stores are on) |
//! | `USE_PERSISTENT_STORES` | `false` |
//! | `SGHM_ARGON2_MEMORY_KIB` | `19456` |
//! | `SGHM_ARGON2_TIME_COST` | `2` |
//! | `SGHM_ARGON2_PARALLELISM` | `1` |

use std::str::FromStr;

use thiserror::Error;

use sghm_auth::{Argon2PasswordHasher, PasswordHashError, PasswordPolicy};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: '{value}'")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthConfig {
    pub database_url: Option<String>,
    pub use_persistent_stores: bool,
    pub password_policy: PasswordPolicy,
}

impl AuthConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (tests, alternative sources).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());
        let use_persistent_stores = parse_or(&lookup, "USE_PERSISTENT_STORES", false)?;

        if use_persistent_stores && database_url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }

        let defaults = PasswordPolicy::default();
        let password_policy = PasswordPolicy::default()
            .memory_cost(parse_or(&lookup, "SGHM_ARGON2_MEMORY_KIB", defaults.memory_cost)?)
            .time_cost(parse_or(&lookup, "SGHM_ARGON2_TIME_COST", defaults.time_cost)?)
            .parallelism(parse_or(&lookup, "SGHM_ARGON2_PARALLELISM", defaults.parallelism)?);

        Ok(Self {
            database_url,
            use_persistent_stores,
            password_policy,
        })
    }

    /// Hasher for the configured policy.
    pub fn password_hasher(&self) -> Result<Argon2PasswordHasher, PasswordHashError> {
        Argon2PasswordHasher::new(self.password_policy)
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid { key, value: raw }),
    }
}
