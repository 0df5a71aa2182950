//! Bearer decoration and single-flight token refresh.
//!
//! Every outbound request carries the stored token. The first 401 on an
//! ordinary request moves the authorizer from idle to refreshing and issues
//! exactly one `POST /auth/refresh`; every other request that gets a 401 while
//! that call is outstanding queues behind it. When the call settles the
//! outcome is made durable, the state returns to idle, and the queued requests
//! are released in arrival order, each replaying itself with the new token.
//!
//! A failed refresh clears the stored credentials and the session user before
//! any waiter is released, so every waiter observes the same signed-out world.
//!
//! The refresh call runs on its own task: dropping the request that triggered
//! it does not strand the other waiters.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde_json::json;
use tokio::sync::oneshot;
use tracing::Instrument;
use uuid::Uuid;

use articlehub_auth::User;

use crate::credentials::{AccessToken, CredentialStore};
use crate::envelope::{AuthPayload, Envelope};
use crate::error::{ClientError, RefreshError};
use crate::state::SessionState;
use crate::transport::{ApiRequest, ApiResponse, Transport, REFRESH_PATH};

/// What every waiter of one refresh receives. `None` means the backend renewed
/// a cookie-only session and issued no bearer token.
#[derive(Debug, Clone)]
struct Renewed {
    token: Option<AccessToken>,
}

type Settlement = Result<Renewed, RefreshError>;

#[derive(Debug)]
struct Refreshed {
    token: Option<AccessToken>,
    user: Option<User>,
}

enum Phase {
    Idle,
    Refreshing { waiters: VecDeque<oneshot::Sender<Settlement>> },
}

struct Coordination {
    /// Bumped by logout; a refresh settling under an older generation is
    /// discarded.
    generation: u64,
    phase: Phase,
}

enum Join {
    /// Another refresh already replaced the credential this request was sent
    /// with. `None` when that refresh turned the session cookie-only.
    AlreadyRenewed(Option<AccessToken>),
    /// The session was cleared after this request was dispatched.
    SessionEnded,
    Wait(oneshot::Receiver<Settlement>),
    Lead {
        generation: u64,
        rx: oneshot::Receiver<Settlement>,
    },
}

struct Inner {
    transport: Arc<dyn Transport>,
    credentials: CredentialStore,
    session: Arc<SessionState>,
    refresh_timeout: Duration,
    coordination: Mutex<Coordination>,
}

/// Attaches the stored credential to outbound requests and renews it on 401.
///
/// Cheap to clone; clones share one coordination state.
#[derive(Clone)]
pub struct RequestAuthorizer {
    inner: Arc<Inner>,
}

impl core::fmt::Debug for RequestAuthorizer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RequestAuthorizer")
            .field("refresh_timeout", &self.inner.refresh_timeout)
            .field("refreshing", &self.is_refreshing())
            .finish_non_exhaustive()
    }
}

impl RequestAuthorizer {
    pub fn new(
        transport: Arc<dyn Transport>,
        credentials: CredentialStore,
        session: Arc<SessionState>,
        refresh_timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                credentials,
                session,
                refresh_timeout,
                coordination: Mutex::new(Coordination {
                    generation: 0,
                    phase: Phase::Idle,
                }),
            }),
        }
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.inner.transport
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.inner.credentials
    }

    pub fn session(&self) -> &Arc<SessionState> {
        &self.inner.session
    }

    pub fn is_refreshing(&self) -> bool {
        matches!(self.inner.lock().phase, Phase::Refreshing { .. })
    }

    /// Attach the stored token as a bearer credential (no-op if none).
    pub fn decorate(&self, request: ApiRequest) -> ApiRequest {
        let token = self.inner.credentials.read_token();
        request.with_bearer(token)
    }

    /// Send a request, renewing the session once if it is rejected with 401.
    ///
    /// Non-401 responses come back as-is, whatever their status. A 401 on
    /// login/registration is returned unchanged. A request that is still
    /// rejected after the renewal gets that second 401 back; it never starts
    /// another refresh.
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ClientError> {
        let span = tracing::debug_span!(
            "api_request",
            request_id = %Uuid::now_v7(),
            method = %request.method,
            path = %request.path,
        );
        self.send_once_renewed(request).instrument(span).await
    }

    async fn send_once_renewed(&self, request: ApiRequest) -> Result<ApiResponse, ClientError> {
        let decorated = self.decorate(request);
        let response = self.inner.transport.send(&decorated).await?;

        if !response.is_unauthorized() {
            return Ok(response);
        }
        if decorated.is_credential_exchange() {
            tracing::debug!("401 on credential exchange; not refreshing");
            return Ok(response);
        }

        tracing::debug!("401 received; awaiting session renewal");
        let renewed = self.renewal(decorated.bearer.as_ref(), true).await?;
        let replay = decorated.with_bearer(renewed.token);
        let response = self.inner.transport.send(&replay).await?;
        if response.is_unauthorized() {
            tracing::warn!("request rejected again after renewal");
        }
        Ok(response)
    }

    /// Renew the session now, joining a refresh that is already in flight.
    pub async fn refresh(&self) -> Result<(), RefreshError> {
        self.renewal(None, false).await.map(|_| ())
    }

    /// Fail every queued waiter with [`RefreshError::Cancelled`] and orphan
    /// the outstanding refresh call, if any; its result will be discarded.
    ///
    /// Returns the number of waiters cancelled.
    pub fn cancel_pending(&self) -> usize {
        let waiters = {
            let mut coord = self.inner.lock();
            coord.generation += 1;
            match std::mem::replace(&mut coord.phase, Phase::Idle) {
                Phase::Refreshing { waiters } => waiters,
                Phase::Idle => VecDeque::new(),
            }
        };

        let cancelled = waiters.len();
        for waiter in waiters {
            let _ = waiter.send(Err(RefreshError::Cancelled));
        }
        if cancelled > 0 {
            tracing::info!(cancelled, "cancelled requests waiting on refresh");
        }
        cancelled
    }

    async fn renewal(
        &self,
        sent: Option<&AccessToken>,
        allow_shortcut: bool,
    ) -> Result<Renewed, RefreshError> {
        let rx = match self.join(sent, allow_shortcut) {
            Join::AlreadyRenewed(token) => {
                tracing::debug!("token already renewed; replaying");
                return Ok(Renewed { token });
            }
            Join::SessionEnded => return Err(RefreshError::Cancelled),
            Join::Wait(rx) => rx,
            Join::Lead { generation, rx } => {
                self.spawn_refresh(generation);
                rx
            }
        };

        rx.await.unwrap_or_else(|_| {
            Err(RefreshError::Rejected(
                "refresh task ended without a result".to_string(),
            ))
        })
    }

    fn join(&self, sent: Option<&AccessToken>, allow_shortcut: bool) -> Join {
        let mut coord = self.inner.lock();

        if let Phase::Refreshing { waiters } = &mut coord.phase {
            let (tx, rx) = oneshot::channel();
            waiters.push_back(tx);
            tracing::debug!(queued = waiters.len(), "refresh in flight; queued");
            return Join::Wait(rx);
        }

        if allow_shortcut {
            match (self.inner.credentials.read_token(), sent) {
                (Some(stored), sent) if sent != Some(&stored) => {
                    return Join::AlreadyRenewed(Some(stored));
                }
                (None, Some(_)) if self.inner.session.current().is_some() => {
                    return Join::AlreadyRenewed(None);
                }
                (None, Some(_)) => return Join::SessionEnded,
                _ => {}
            }
        }

        let (tx, rx) = oneshot::channel();
        coord.phase = Phase::Refreshing {
            waiters: VecDeque::from([tx]),
        };
        Join::Lead {
            generation: coord.generation,
            rx,
        }
    }

    fn spawn_refresh(&self, generation: u64) {
        let inner = Arc::clone(&self.inner);
        let task = async move {
            tracing::info!(generation, "refreshing access token");
            let result = match tokio::time::timeout(inner.refresh_timeout, inner.call_refresh()).await {
                Ok(result) => result,
                Err(_) => Err(RefreshError::TimedOut(inner.refresh_timeout)),
            };
            inner.settle(generation, result);
        };
        tokio::spawn(task.in_current_span());
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Coordination> {
        self.coordination.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn call_refresh(&self) -> Result<Refreshed, RefreshError> {
        let response = self
            .transport
            .send(&ApiRequest::post(REFRESH_PATH, json!({})))
            .await?;

        if !response.status.is_success() {
            let message = response
                .message()
                .unwrap_or_else(|| format!("HTTP {}", response.status.as_u16()));
            return Err(RefreshError::Rejected(message));
        }

        let envelope: Envelope<AuthPayload> = response
            .json()
            .map_err(|e| RefreshError::Rejected(format!("malformed refresh response: {e}")))?;
        if !envelope.success {
            return Err(RefreshError::Rejected(envelope.message_or("token refresh failed")));
        }

        let payload = envelope.data.unwrap_or_default();
        Ok(Refreshed {
            token: payload.access_token(),
            user: payload.user,
        })
    }

    fn persist(&self, refreshed: Refreshed) -> Result<Renewed, RefreshError> {
        // The rejected bearer must not outlive a cookie-only renewal.
        if refreshed.token.is_none() {
            self.credentials.clear_token().map_err(RefreshError::Storage)?;
        }
        self.credentials
            .write(refreshed.token.as_ref(), refreshed.user.as_ref())
            .map_err(RefreshError::Storage)?;
        if let Some(user) = refreshed.user {
            self.session.set(Some(user));
        }
        Ok(Renewed {
            token: refreshed.token,
        })
    }

    fn settle(&self, generation: u64, result: Result<Refreshed, RefreshError>) {
        let mut coord = self.lock();
        if coord.generation != generation {
            tracing::info!(generation, "discarding refresh result of an ended session");
            return;
        }

        let settlement = match result.and_then(|refreshed| self.persist(refreshed)) {
            Ok(renewed) => Ok(renewed),
            Err(err) => {
                if let Err(e) = self.credentials.clear() {
                    tracing::warn!(error = %e, "failed to clear credentials after refresh failure");
                }
                self.session.set(None);
                Err(err)
            }
        };

        let waiters = match std::mem::replace(&mut coord.phase, Phase::Idle) {
            Phase::Refreshing { waiters } => waiters,
            Phase::Idle => VecDeque::new(),
        };
        drop(coord);

        match &settlement {
            Ok(renewed) => tracing::info!(
                waiters = waiters.len(),
                cookie_session = renewed.token.is_none(),
                "access token refreshed"
            ),
            Err(e) => tracing::warn!(
                waiters = waiters.len(),
                error = %e,
                "token refresh failed; session cleared"
            ),
        }

        for waiter in waiters {
            let _ = waiter.send(settlement.clone());
        }
    }
}
