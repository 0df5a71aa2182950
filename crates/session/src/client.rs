//! Session wiring and the explicit authentication entry points.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::json;

use articlehub_auth::{Capabilities, SignupRequest, User};

use crate::authorizer::RequestAuthorizer;
use crate::config::ClientConfig;
use crate::credentials::CredentialStore;
use crate::envelope::{AuthPayload, Envelope};
use crate::error::ClientError;
use crate::guard::{Navigator, Route};
use crate::state::SessionState;
use crate::storage::{FileStorage, KeyValueStorage};
use crate::transport::{
    ApiRequest, ApiResponse, ReqwestTransport, Transport, LOGIN_PATH, LOGOUT_PATH, REGISTER_PATH,
};

/// One signed-in (or signed-out) client.
///
/// Owns the credential store, the session state and the request authorizer;
/// cheap to clone, clones share all three. Session state is rehydrated from
/// storage once, when the client is built.
#[derive(Debug, Clone)]
pub struct SessionClient {
    credentials: CredentialStore,
    session: Arc<SessionState>,
    authorizer: RequestAuthorizer,
}

impl SessionClient {
    /// Production wiring: `reqwest` transport, session persisted under
    /// `config.state_dir`.
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let transport = ReqwestTransport::new(config)?;
        let storage = FileStorage::new(&config.state_dir);
        Ok(Self::with_parts(config, Arc::new(transport), Arc::new(storage)))
    }

    pub fn with_parts(
        config: &ClientConfig,
        transport: Arc<dyn Transport>,
        storage: Arc<dyn KeyValueStorage>,
    ) -> Self {
        let credentials = CredentialStore::new(storage);
        let session = Arc::new(SessionState::rehydrate(&credentials));
        let authorizer = RequestAuthorizer::new(
            transport,
            credentials.clone(),
            session.clone(),
            config.refresh_timeout,
        );
        Self {
            credentials,
            session,
            authorizer,
        }
    }

    pub fn session(&self) -> &Arc<SessionState> {
        &self.session
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    pub fn authorizer(&self) -> &RequestAuthorizer {
        &self.authorizer
    }

    pub fn current_user(&self) -> Option<User> {
        self.session.current()
    }

    pub fn has_token(&self) -> bool {
        self.credentials.has_token()
    }

    /// A token is held and the user is known.
    pub fn is_authenticated(&self) -> bool {
        self.has_token() && self.current_user().is_some()
    }

    pub fn capabilities(&self) -> Capabilities {
        self.session.capabilities()
    }

    /// A navigator starting at `start`, subscribed to this client's session.
    pub fn navigator(&self, start: Route) -> Navigator {
        Navigator::new(&self.session, self.credentials.clone(), start)
    }

    /// Refuse protected calls up front when there is no session at all. A
    /// cookie session holds no token but does know its user; its requests
    /// go out without a bearer and ride on the transport's cookie jar.
    pub fn require_session(&self) -> Result<(), ClientError> {
        if self.has_token() || self.current_user().is_some() {
            Ok(())
        } else {
            Err(ClientError::NotAuthenticated)
        }
    }

    /// `POST /login`. A success without any token is valid (cookie session);
    /// only the user is stored then.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, ClientError> {
        let request = ApiRequest::post(LOGIN_PATH, json!({ "email": email, "password": password }));
        let user = self.exchange_credentials(request, "Login failed").await?;
        tracing::info!(user_id = %user.id, role = %user.role, "signed in");
        Ok(user)
    }

    /// `POST /register`, handled exactly like login.
    pub async fn register(&self, signup: &SignupRequest) -> Result<User, ClientError> {
        signup.validate()?;
        let body = serde_json::to_value(signup).map_err(|e| ClientError::Decode(e.to_string()))?;
        let request = ApiRequest::post(REGISTER_PATH, body);
        let user = self.exchange_credentials(request, "Registration failed").await?;
        tracing::info!(user_id = %user.id, "registered and signed in");
        Ok(user)
    }

    async fn exchange_credentials(
        &self,
        request: ApiRequest,
        fallback: &str,
    ) -> Result<User, ClientError> {
        let response = self.authorizer.send(request).await?;
        if !response.status.is_success() {
            let message = response.message().unwrap_or_else(|| fallback.to_string());
            return Err(ClientError::Authentication(message));
        }

        let envelope: Envelope<AuthPayload> = response
            .json()
            .map_err(|e| ClientError::Decode(e.to_string()))?;
        if !envelope.success {
            return Err(ClientError::Authentication(envelope.message_or(fallback)));
        }

        let payload = envelope.data.unwrap_or_default();
        let token = payload.access_token();
        let user = payload
            .user
            .ok_or_else(|| ClientError::Decode("response carries no user".to_string()))?;
        if token.is_none() {
            tracing::warn!("no access token in response; assuming cookie session");
            self.credentials.clear_token()?;
        }

        // Durable first, then observable.
        self.credentials.write(token.as_ref(), Some(&user))?;
        self.session.set(Some(user.clone()));
        Ok(user)
    }

    /// Renew the session explicitly. On failure the client is signed out.
    pub async fn refresh(&self) -> Result<(), ClientError> {
        self.authorizer.refresh().await.map_err(ClientError::from)
    }

    /// Sign out locally and tell the backend, without waiting for it.
    ///
    /// Requests queued on an in-flight refresh fail with
    /// [`ClientError::Cancelled`]. Local state is cleared even if the backend
    /// call fails or no async runtime is available to send it.
    pub fn logout(&self) {
        let notice = self.authorizer.decorate(ApiRequest::post(LOGOUT_PATH, json!({})));

        self.authorizer.cancel_pending();
        if let Err(e) = self.credentials.clear() {
            tracing::warn!(error = %e, "failed to clear stored credentials");
        }
        self.session.set(None);
        tracing::info!("signed out");

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let transport = Arc::clone(self.authorizer.transport());
                handle.spawn(async move {
                    match transport.send(&notice).await {
                        Ok(res) if res.status.is_success() => {}
                        Ok(res) => tracing::warn!(status = %res.status, "backend logout rejected"),
                        Err(e) => tracing::warn!(error = %e, "backend logout failed"),
                    }
                });
            }
            Err(_) => tracing::warn!("no async runtime; backend logout skipped"),
        }
    }

    /// Send through the authorizer and unwrap the envelope's `data`.
    pub async fn fetch<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ClientError> {
        let response = self.authorizer.send(request).await?;
        let envelope: Envelope<T> = decode_envelope(&response)?;
        envelope
            .data
            .ok_or_else(|| ClientError::Decode("response carries no data".to_string()))
    }

    /// Send through the authorizer, expecting success and ignoring `data`.
    pub async fn execute(&self, request: ApiRequest) -> Result<(), ClientError> {
        let response = self.authorizer.send(request).await?;
        decode_envelope::<serde_json::Value>(&response).map(|_| ())
    }
}

fn decode_envelope<T: DeserializeOwned>(response: &ApiResponse) -> Result<Envelope<T>, ClientError> {
    if response.is_unauthorized() {
        return Err(ClientError::Unauthorized);
    }
    if !response.status.is_success() {
        let message = response
            .message()
            .unwrap_or_else(|| response.status.canonical_reason().unwrap_or("request failed").to_string());
        return Err(ClientError::api(response.status.as_u16(), message));
    }
    if response.body.is_empty() {
        return Ok(Envelope {
            success: true,
            message: String::new(),
            data: None,
        });
    }

    let envelope: Envelope<T> = response
        .json()
        .map_err(|e| ClientError::Decode(e.to_string()))?;
    if !envelope.success {
        return Err(ClientError::api(
            response.status.as_u16(),
            envelope.message_or("backend request failed"),
        ));
    }
    Ok(envelope)
}
