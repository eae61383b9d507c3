//! Domain error model.

use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

/// Business rule failures. Messages are user-facing (pt-BR) and travel
/// unchanged to the HTTP error body.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Rejected input: non-positive quantity, short reason, insufficient stock.
    #[error("{0}")]
    Validation(String),

    /// Well-formed, but the current state forbids it (e.g. leaving `Pago`).
    #[error("{0}")]
    InvariantViolation(String),

    #[error("identificador inválido: {0}")]
    InvalidId(String),

    /// Command addressed to a stream that was never created.
    #[error("{0}")]
    NotFound(String),

    /// Duplicate creation.
    #[error("{0}")]
    Conflict(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }
}
