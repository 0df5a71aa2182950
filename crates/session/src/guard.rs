//! Navigation guard: keep signed-out users out of protected views and
//! signed-in users out of the auth views.

use articlehub_auth::User;
use articlehub_events::Subscription;

use crate::credentials::CredentialStore;
use crate::state::SessionState;

/// A normalized client route (`/dashboard/articles`, `/login`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Route(String);

impl Route {
    pub const ENTRY: &'static str = "/";
    pub const LOGIN: &'static str = "/login";
    pub const SIGNUP: &'static str = "/signup";
    pub const HOME: &'static str = "/dashboard";

    /// Query string and fragment are dropped, a leading `/` is ensured and a
    /// trailing one removed.
    pub fn new(path: impl AsRef<str>) -> Self {
        let path = path.as_ref();
        let path = path.split(['?', '#']).next().unwrap_or_default().trim();
        let trimmed = path.trim_matches('/');
        if trimmed.is_empty() {
            Self(Self::ENTRY.to_string())
        } else {
            Self(format!("/{trimmed}"))
        }
    }

    pub fn entry() -> Self {
        Self::new(Self::ENTRY)
    }

    pub fn login() -> Self {
        Self::new(Self::LOGIN)
    }

    pub fn signup() -> Self {
        Self::new(Self::SIGNUP)
    }

    pub fn home() -> Self {
        Self::new(Self::HOME)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Login or signup.
    pub fn is_auth_view(&self) -> bool {
        self.0 == Self::LOGIN || self.0 == Self::SIGNUP
    }
}

impl core::fmt::Display for Route {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where to send the user, if anywhere.
///
/// - token held and on the entry/login/signup route: go home
/// - no token and anywhere but login/signup: go to login
/// - otherwise stay
///
/// Pure and idempotent: applying the result and deciding again yields `None`.
pub fn decide(route: &Route, has_token: bool) -> Option<Route> {
    if has_token {
        if route.as_str() == Route::ENTRY || route.is_auth_view() {
            return Some(Route::home());
        }
    } else if !route.is_auth_view() {
        return Some(Route::login());
    }
    None
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub from: Route,
    pub to: Route,
}

/// Tracks the current route and re-applies [`decide`] once per session change.
///
/// The first pump after construction handles the session value current at
/// subscribe time, which is the startup evaluation.
#[derive(Debug)]
pub struct Navigator {
    route: Route,
    credentials: CredentialStore,
    changes: Subscription<Option<User>>,
}

impl Navigator {
    pub fn new(session: &SessionState, credentials: CredentialStore, start: Route) -> Self {
        Self {
            route: start,
            credentials,
            changes: session.subscribe(),
        }
    }

    pub fn current(&self) -> &Route {
        &self.route
    }

    /// User-initiated navigation; the guard applies to the destination.
    pub fn navigate(&mut self, to: Route) -> Option<Redirect> {
        self.route = to;
        self.evaluate()
    }

    /// Evaluate the guard for every session change delivered since the last
    /// pump, returning the redirects that were applied.
    pub fn pump(&mut self) -> Vec<Redirect> {
        let pending = self.changes.drain().count();
        (0..pending).filter_map(|_| self.evaluate()).collect()
    }

    fn evaluate(&mut self) -> Option<Redirect> {
        let to = decide(&self.route, self.credentials.has_token())?;
        let redirect = Redirect {
            from: std::mem::replace(&mut self.route, to.clone()),
            to,
        };
        tracing::info!(from = %redirect.from, to = %redirect.to, "navigation redirect");
        Some(redirect)
    }
}
