//! `articlehub-session`: how the client holds, attaches, refreshes and
//! invalidates its access credential.
//!
//! Layering, leaves first:
//!
//! - [`storage`] / [`credentials`]: durable token + cached user
//! - [`state`]: observable current user, rehydrated once at startup
//! - [`transport`]: the HTTP seam
//! - [`authorizer`]: bearer decoration and single-flight refresh
//! - [`guard`]: route redirects derived from token presence
//! - [`client`]: wiring plus the login/register/logout entry points

pub mod authorizer;
pub mod client;
pub mod config;
pub mod credentials;
pub mod envelope;
pub mod error;
pub mod guard;
pub mod state;
pub mod storage;
pub mod transport;

pub use authorizer::RequestAuthorizer;
pub use client::SessionClient;
pub use config::ClientConfig;
pub use credentials::{AccessToken, CredentialStore};
pub use envelope::{AuthPayload, Envelope, Page};
pub use error::{ClientError, RefreshError, StorageError, TransportError};
pub use guard::{decide, Navigator, Redirect, Route};
pub use state::SessionState;
pub use storage::{FileStorage, InMemoryStorage, KeyValueStorage};
pub use transport::{ApiRequest, ApiResponse, ReqwestTransport, Transport};
