//! Client-side authorization guard for service calls.
//!
//! Enforced before a request is sent; the backend remains the authority and
//! may still refuse (ownership rules, for instance).

use articlehub_auth::{authorize, Permission};
use articlehub_session::SessionClient;

use crate::error::ServiceResult;

/// A session must exist (bearer token or cookie session) and, if `permission`
/// is given, the session user's role must grant it.
pub fn require(client: &SessionClient, permission: Option<Permission>) -> ServiceResult<()> {
    client.require_session()?;
    if let Some(permission) = permission {
        let user = client.current_user();
        authorize(user.as_ref(), permission)?;
    }
    Ok(())
}

