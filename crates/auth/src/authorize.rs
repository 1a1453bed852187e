use serde::Serialize;
use thiserror::Error;

use storefront_core::AccountId;

use crate::{Claims, Role};

/// A fully resolved principal for authorization decisions.
///
/// Construction is decoupled from transport: the API derives it from verified
/// claims, tests build it directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub account_id: AccountId,
    pub role: Role,
}

impl Principal {
    pub fn new(account_id: AccountId, role: Role) -> Self {
        Self { account_id, role }
    }

    /// Whether this principal may read or act on a resource owned by `owner`.
    ///
    /// Owners always may; elevated roles may act on anyone's resources.
    pub fn can_access(&self, owner: AccountId) -> bool {
        self.account_id == owner || self.role.is_elevated()
    }
}

impl From<&Claims> for Principal {
    fn from(claims: &Claims) -> Self {
        Self {
            account_id: claims.account_id,
            role: claims.role,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: requires one of [{required}], principal has '{actual}'")]
    Forbidden { required: String, actual: Role },
}

/// Require the principal to hold one of `allowed`.
///
/// - No IO
/// - No panics
pub fn require_role(principal: &Principal, allowed: &[Role]) -> Result<(), AuthzError> {
    if allowed.contains(&principal.role) {
        return Ok(());
    }

    tracing::debug!(
        account_id = %principal.account_id,
        role = %principal.role,
        "role check denied"
    );

    Err(AuthzError::Forbidden {
        required: allowed
            .iter()
            .map(Role::as_str)
            .collect::<Vec<_>>()
            .join(", "),
        actual: principal.role,
    })
}
