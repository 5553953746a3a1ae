//! Core error types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("duplicate {0}")]
    Conflict(String),

    #[error("{0}")]
    BadRequest(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
