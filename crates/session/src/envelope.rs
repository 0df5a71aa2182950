//! Wire envelopes shared by every backend endpoint.

use serde::{Deserialize, Serialize};

use articlehub_auth::User;

use crate::credentials::AccessToken;

/// `{success, message, data}` wrapper around every response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: String,
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    /// The backend's message, or `fallback` when it sent none.
    pub fn message_or(&self, fallback: &str) -> String {
        if self.message.trim().is_empty() {
            fallback.to_string()
        } else {
            self.message.clone()
        }
    }
}

/// `data` of login, registration and refresh responses.
///
/// Backends disagree on the token field name; the first non-blank of
/// `accessToken`, `token`, `jwt` wins. No token at all is valid and means the
/// session rides on an HTTP-only cookie.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwt: Option<String>,
}

impl AuthPayload {
    pub fn access_token(&self) -> Option<AccessToken> {
        [&self.access_token, &self.token, &self.jwt]
            .into_iter()
            .flatten()
            .find_map(|raw| AccessToken::new(raw.as_str()))
    }
}

/// Paginated list payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub docs: Vec<T>,
    #[serde(default)]
    pub total_docs: u64,
    #[serde(default)]
    pub limit: u64,
    #[serde(default = "first_page")]
    pub page: u64,
    #[serde(default)]
    pub total_pages: u64,
    #[serde(default)]
    pub has_prev_page: bool,
    #[serde(default)]
    pub has_next_page: bool,
}

fn first_page() -> u64 {
    1
}
