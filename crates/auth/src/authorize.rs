use serde::Serialize;
use thiserror::Error;

use crate::{Credential, ROLE_ADMIN, ROLE_OPERATOR};

#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize)]
pub enum AuthzError {
    /// The principal holds none of the accepted authorities.
    #[error("forbidden: requires one of {required:?}")]
    Forbidden {
        required: Vec<String>,
        /// What the principal does hold, sorted.
        current: Vec<String>,
    },
}

/// Role gate: passes iff `principal` holds at least one of `allowed`.
///
/// Matching is exact and case-sensitive. An empty `allowed` list admits nobody.
///
/// - No IO
/// - No panics
pub fn require_role<C>(principal: &C, allowed: &[&str]) -> Result<(), AuthzError>
where
    C: Credential + ?Sized,
{
    if allowed.iter().any(|a| principal.has_capability(a)) {
        return Ok(());
    }

    let mut current: Vec<String> = principal
        .capabilities()
        .into_iter()
        .map(str::to_string)
        .collect();
    current.sort();

    Err(AuthzError::Forbidden {
        required: allowed.iter().map(|a| a.to_string()).collect(),
        current,
    })
}

/// Administrators only.
pub fn require_admin<C>(principal: &C) -> Result<(), AuthzError>
where
    C: Credential + ?Sized,
{
    require_role(principal, &[ROLE_ADMIN])
}

/// Any signed-in staff member: administrators or operators.
pub fn require_staff<C>(principal: &C) -> Result<(), AuthzError>
where
    C: Credential + ?Sized,
{
    require_role(principal, &[ROLE_ADMIN, ROLE_OPERATOR])
}
