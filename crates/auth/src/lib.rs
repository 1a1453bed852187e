//! `storefront-auth`: authentication/authorization boundary.
//!
//! This crate is intentionally decoupled from HTTP and storage: it turns a
//! signed token into a [`Principal`] and answers role questions about it.

pub mod authorize;
pub mod claims;
pub mod jwt;
pub mod roles;

pub use authorize::{AuthzError, Principal, require_role};
pub use claims::{Claims, TokenValidationError, validate_claims};
pub use jwt::{Hs256JwtValidator, JwtValidator, sign_claims};
pub use roles::Role;
