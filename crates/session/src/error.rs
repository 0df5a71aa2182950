//! Error taxonomy of the session core.
//!
//! Errors fanned out to refresh waiters are `Clone`; every waiter receives its
//! own copy of the single outcome.

use std::time::Duration;

use thiserror::Error;

use articlehub_core::DomainError;

/// Failure of the underlying HTTP exchange (no response was received).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("invalid request url: {0}")]
    InvalidUrl(String),

    #[error("request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),
}

/// Failure of the durable key-value storage.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("storage io error on '{key}': {message}")]
    Io { key: String, message: String },

    #[error("storage lock poisoned")]
    Poisoned,
}

/// Why a token refresh did not produce a usable session.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RefreshError {
    /// The backend answered but declined to refresh.
    #[error("refresh rejected: {0}")]
    Rejected(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("refresh did not settle within {0:?}")]
    TimedOut(Duration),

    #[error("refreshed token could not be stored: {0}")]
    Storage(StorageError),

    /// The session was ended (logout) while the refresh was outstanding.
    #[error("refresh cancelled by logout")]
    Cancelled,
}

/// Error surfaced to callers of the client and the typed services.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// Bad credentials at login/registration; message is the backend's, verbatim.
    #[error("{0}")]
    Authentication(String),

    /// The session expired and could not be renewed; the user is signed out.
    #[error("session expired: {0}")]
    RefreshFailed(RefreshError),

    /// The session ended while this request was waiting on a refresh.
    #[error("request cancelled: session ended")]
    Cancelled,

    /// No credential is held; the caller should route to login.
    #[error("not signed in")]
    NotAuthenticated,

    /// A request was still rejected after the session was renewed.
    #[error("unauthorized")]
    Unauthorized,

    #[error("api error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("unexpected response: {0}")]
    Decode(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl From<RefreshError> for ClientError {
    fn from(err: RefreshError) -> Self {
        match err {
            RefreshError::Cancelled => ClientError::Cancelled,
            other => ClientError::RefreshFailed(other),
        }
    }
}

impl ClientError {
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// True for failures after which the client holds no session any more.
    pub fn ends_session(&self) -> bool {
        matches!(self, ClientError::RefreshFailed(_) | ClientError::Cancelled)
    }
}
