//! Value-level errors shared by the domain crates.

use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

/// A value could not be constructed.
///
/// Business outcomes (stock shortages, forbidden status changes) live in the
/// orders crate; this only covers malformed input.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }
}
