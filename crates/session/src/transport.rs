//! HTTP seam between the session core and the backend.

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::ClientConfig;
use crate::credentials::AccessToken;
use crate::error::TransportError;

pub const LOGIN_PATH: &str = "/login";
pub const REGISTER_PATH: &str = "/register";
pub const REFRESH_PATH: &str = "/auth/refresh";
pub const LOGOUT_PATH: &str = "/auth/logout";

/// An outbound request, relative to the configured base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
    pub bearer: Option<AccessToken>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            bearer: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::POST, path).with_body(body)
    }

    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::PUT, path).with_body(body)
    }

    pub fn patch(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::PATCH, path).with_body(body)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_bearer(mut self, token: Option<AccessToken>) -> Self {
        self.bearer = token;
        self
    }

    /// Login and registration exchange credentials for a session; a 401 on
    /// these means bad credentials, not an expired token.
    pub fn is_credential_exchange(&self) -> bool {
        let path = self.path.split('?').next().unwrap_or_default();
        let path = path.trim_end_matches('/');
        path.ends_with(LOGIN_PATH) || path.ends_with(REGISTER_PATH)
    }
}

/// A received response. Non-2xx statuses are responses, not transport errors.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn json_body(status: StatusCode, body: &Value) -> Self {
        Self::new(status, body.to_string())
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == StatusCode::UNAUTHORIZED
    }

    /// Decode the body; an empty body decodes as JSON `null`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        if self.body.iter().all(u8::is_ascii_whitespace) {
            serde_json::from_str("null")
        } else {
            serde_json::from_slice(&self.body)
        }
    }

    /// The backend's `message` field, if the body carries one.
    pub fn message(&self) -> Option<String> {
        let value: Value = serde_json::from_slice(&self.body).ok()?;
        value
            .get("message")
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty())
            .map(str::to_string)
    }
}

/// Sends one request and returns whatever the backend answered.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError>;
}

/// `reqwest`-backed transport with a cookie jar, so the refresh cookie set at
/// login rides along on `/auth/refresh` automatically.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    base_url: String,
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| TransportError::Network(e.to_string()))?;
        reqwest::Url::parse(&config.base_url)
            .map_err(|e| TransportError::InvalidUrl(format!("{}: {e}", config.base_url)))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url_for(&self, path: &str) -> Result<reqwest::Url, TransportError> {
        let joined = if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        };
        reqwest::Url::parse(&joined).map_err(|e| TransportError::InvalidUrl(format!("{joined}: {e}")))
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else {
            TransportError::Network(err.to_string())
        }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        let url = self.url_for(&request.path)?;
        let mut builder = self.client.request(request.method.clone(), url);
        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token.expose());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        Ok(ApiResponse::new(status, body.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn credential_exchange_detection() {
        assert!(ApiRequest::post("/login", json!({})).is_credential_exchange());
        assert!(ApiRequest::post("/register/", json!({})).is_credential_exchange());
        assert!(!ApiRequest::post("/auth/refresh", json!({})).is_credential_exchange());
        assert!(!ApiRequest::get("/articles?q=login").is_credential_exchange());
    }

    #[test]
    fn response_message_and_empty_body() {
        let res = ApiResponse::json_body(
            StatusCode::BAD_REQUEST,
            &json!({ "success": false, "message": "Invalid email or password" }),
        );
        assert_eq!(res.message().as_deref(), Some("Invalid email or password"));

        let empty = ApiResponse::new(StatusCode::NO_CONTENT, Vec::new());
        assert_eq!(empty.json::<Value>().unwrap(), Value::Null);
        assert_eq!(empty.message(), None);
    }

    #[test]
    fn urls_keep_the_base_path() {
        let transport = ReqwestTransport::new(&ClientConfig::new("http://localhost:3001/api")).unwrap();
        assert_eq!(
            transport.url_for("/auth/refresh").unwrap().as_str(),
            "http://localhost:3001/api/auth/refresh"
        );
        assert_eq!(
            transport.url_for("articles").unwrap().as_str(),
            "http://localhost:3001/api/articles"
        );
    }
}
