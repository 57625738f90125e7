//! The module contains the errors the engine can throw.
//!
//! The errors are:
//!
//! - [`InvalidInput`] malformed amounts, currencies or member sets. The caller
//!   can always recover by fixing the input.
//! - [`Forbidden`] the acting user is not allowed to touch the resource.
//! - [`ForbiddenTransition`] the settlement transition exists, but it is not
//!   the acting user's turn.
//! - [`InvalidTransition`] the settlement transition does not exist from the
//!   current status (e.g. it is already finalized).
//! - [`Consistency`] the ledger violates a sum or reconciliation invariant.
//!
//!  [`InvalidInput`]: EngineError::InvalidInput
//!  [`Forbidden`]: EngineError::Forbidden
//!  [`ForbiddenTransition`]: EngineError::ForbiddenTransition
//!  [`InvalidTransition`]: EngineError::InvalidTransition
//!  [`Consistency`]: EngineError::Consistency
use sea_orm::DbErr;
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Not allowed: {0}")]
    ForbiddenTransition(String),
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
    #[error("Ledger inconsistency: {0}")]
    Consistency(String),
    #[error("\"{0}\" key not found!")]
    KeyNotFound(String),
    #[error("\"{0}\" already present!")]
    ExistingKey(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::InvalidInput(a), Self::InvalidInput(b)) => a == b,
            (Self::Forbidden(a), Self::Forbidden(b)) => a == b,
            (Self::ForbiddenTransition(a), Self::ForbiddenTransition(b)) => a == b,
            (Self::InvalidTransition(a), Self::InvalidTransition(b)) => a == b,
            (Self::Consistency(a), Self::Consistency(b)) => a == b,
            (Self::KeyNotFound(a), Self::KeyNotFound(b)) => a == b,
            (Self::ExistingKey(a), Self::ExistingKey(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
