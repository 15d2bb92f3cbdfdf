//! Auth errors.

use thiserror::Error;

use crate::persistence::{IsolationViolation, PersistenceError};

/// Why a credential was refused. Logged, never shown to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    /// Neither a bearer token nor a service key was presented.
    MissingCredentials,

    /// The bearer token failed callback validation.
    InvalidCallbackToken,

    /// No usable key matches the presented secret.
    UnknownServiceKey,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("authentication required")]
    Unauthenticated(AuthFailure),

    #[error("missing required scope `{0}`")]
    Forbidden(String),

    #[error("credential store error")]
    Store(#[source] PersistenceError),
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token could not be signed")]
    Signing(#[source] jsonwebtoken::errors::Error),

    #[error("token failed verification")]
    Invalid(#[source] jsonwebtoken::errors::Error),

    #[error("token is not a `{expected}` token")]
    WrongType { expected: &'static str },

    #[error("token is not valid yet")]
    NotYetValid,

    #[error("token has expired")]
    Expired,
}

#[derive(Debug, Error)]
pub enum ServiceKeyError {
    #[error("service key not found")]
    NotFound,

    #[error("service key name must not be empty")]
    MissingName,

    #[error("scope `{0}` is not of the form `resource:action`")]
    InvalidScope(String),

    #[error(transparent)]
    Isolation(IsolationViolation),

    #[error("storage error")]
    Persistence(#[source] PersistenceError),
}

impl From<PersistenceError> for ServiceKeyError {
    fn from(error: PersistenceError) -> Self {
        match error {
            PersistenceError::NotFound => Self::NotFound,
            PersistenceError::Isolation(violation) => Self::Isolation(violation),
            error => Self::Persistence(error),
        }
    }
}
