//! Observable "who is signed in".

use articlehub_auth::{Capabilities, User};
use articlehub_events::{EventBus, ReplayLatestBus, Subscription};

use crate::credentials::CredentialStore;

/// Current session user, with replay-latest change notification.
///
/// Constructed once and shared by `Arc`; there is no global instance. This
/// type never touches the credential store after [`SessionState::rehydrate`]:
/// callers persist first, then call [`SessionState::set`], so no subscriber
/// observes a user that is not yet durable.
#[derive(Debug)]
pub struct SessionState {
    bus: ReplayLatestBus<Option<User>>,
}

impl SessionState {
    pub fn new(initial: Option<User>) -> Self {
        Self {
            bus: ReplayLatestBus::new(initial),
        }
    }

    /// Startup rehydration from the persisted session.
    pub fn rehydrate(credentials: &CredentialStore) -> Self {
        let user = credentials.read_user();
        match &user {
            Some(u) => tracing::info!(user_id = %u.id, role = %u.role, "session restored"),
            None => tracing::debug!("no stored session"),
        }
        Self::new(user)
    }

    /// Latest known user.
    pub fn current(&self) -> Option<User> {
        self.bus.current().unwrap_or_else(|e| {
            tracing::warn!(error = ?e, "session state unreadable");
            None
        })
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities::for_user(self.current().as_ref())
    }

    /// Receives the current value immediately, then every change in order.
    /// Drop the subscription to unsubscribe.
    pub fn subscribe(&self) -> Subscription<Option<User>> {
        self.bus.subscribe()
    }

    /// Replace the user; every live subscriber has the change queued by the
    /// time this returns.
    pub fn set(&self, user: Option<User>) {
        if let Err(e) = self.bus.publish(user) {
            tracing::warn!(error = ?e, "failed to publish session change");
        }
    }
}
