use thiserror::Error;

use articlehub_auth::AuthzError;
use articlehub_core::DomainError;
use articlehub_session::ClientError;

/// Failure of a typed service call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// Refused locally: the session user's role does not grant the call.
    #[error(transparent)]
    Forbidden(#[from] AuthzError),

    /// The request never reached the backend because its input is invalid.
    #[error(transparent)]
    Invalid(#[from] DomainError),

    #[error(transparent)]
    Client(#[from] ClientError),
}

impl ServiceError {
    /// True when the caller should send the user back to login.
    pub fn needs_login(&self) -> bool {
        match self {
            ServiceError::Forbidden(AuthzError::Unauthenticated) => true,
            ServiceError::Client(e) => {
                e.ends_session() || matches!(e, ClientError::NotAuthenticated | ClientError::Unauthorized)
            }
            _ => false,
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
