use storefront_auth::{Principal, Role};
use storefront_core::AccountId;

/// Principal context for a request (authenticated account + role).
///
/// Inserted by the auth middleware; present for every protected route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    principal: Principal,
    email: Option<String>,
}

impl PrincipalContext {
    pub fn new(principal: Principal, email: Option<String>) -> Self {
        Self { principal, email }
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn account_id(&self) -> AccountId {
        self.principal.account_id
    }

    pub fn role(&self) -> Role {
        self.principal.role
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }
}
