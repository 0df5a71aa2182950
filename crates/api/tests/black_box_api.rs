use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use articlehub_api::{ArticleQuery, ArticleService, ProfileService, ServiceError, UserService};
use articlehub_auth::{AuthzError, Permission, Role, UpdatePassword};
use articlehub_core::{ArticleId, RoleId, UpdateArticle, UserId};
use articlehub_session::{ClientConfig, ClientError, RefreshError, SessionClient};

/// Backend double: tokens are `tok-{generation}` and session cookies are
/// `sid=session-{generation}`; only the current generation is accepted.
#[derive(Default)]
struct Backend {
    generation: AtomicU32,
    refresh_fails: AtomicBool,
    refresh_calls: AtomicUsize,
    logout_calls: AtomicUsize,
    /// Article updates and deletions that reached the backend.
    writes: AtomicUsize,
}

impl Backend {
    fn valid_token(&self) -> String {
        format!("tok-{}", self.generation.load(Ordering::SeqCst))
    }

    /// Invalidate every token handed out so far.
    fn expire(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    fn session_cookie(&self) -> String {
        format!("sid=session-{}", self.generation.load(Ordering::SeqCst))
    }

    fn accepts(&self, headers: &HeaderMap) -> bool {
        let expected = format!("Bearer {}", self.valid_token());
        let bearer = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        bearer == Some(expected.as_str()) || cookie_of(headers) == Some(self.session_cookie())
    }
}

fn cookie_of(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').map(str::trim).find(|c| c.starts_with("sid=")))
        .map(str::to_string)
}

fn with_cookie(cookie: String, body: (StatusCode, Json<Value>)) -> Response {
    ([(header::SET_COOKIE, format!("{cookie}; Path=/"))], body).into_response()
}

type Shared = State<Arc<Backend>>;

fn user_json(email: &str) -> Value {
    let code = match email.split('@').next() {
        Some("admin") => "admin",
        Some("editor") => "editor",
        Some("reader") => "reader",
        _ => "writer",
    };
    json!({
        "_id": "u1",
        "firstName": "Test",
        "lastName": "User",
        "email": email,
        "role": { "_id": format!("r-{code}"), "code": code },
        "isEmailVerified": true
    })
}

fn unauthorized(message: &str) -> (StatusCode, Json<Value>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "success": false, "message": message })),
    )
}

fn ok(data: Value) -> (StatusCode, Json<Value>) {
    (
        StatusCode::OK,
        Json(json!({ "success": true, "message": "ok", "data": data })),
    )
}

async fn login(State(backend): Shared, Json(body): Json<Value>) -> Response {
    let email = body["email"].as_str().unwrap_or_default();
    if body["password"] != "secret" {
        return unauthorized("Invalid email or password").into_response();
    }
    if email.starts_with("cookie") {
        return with_cookie(backend.session_cookie(), ok(json!({ "user": user_json(email) })));
    }
    ok(json!({ "user": user_json(email), "accessToken": backend.valid_token() })).into_response()
}

/// Cookie sessions are renewed with a fresh cookie and no token.
async fn refresh(State(backend): Shared, headers: HeaderMap) -> Response {
    backend.refresh_calls.fetch_add(1, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(50)).await;
    if backend.refresh_fails.load(Ordering::SeqCst) {
        return unauthorized("Refresh token expired").into_response();
    }
    if cookie_of(&headers).is_some() {
        return with_cookie(backend.session_cookie(), ok(json!({})));
    }
    ok(json!({ "accessToken": backend.valid_token() })).into_response()
}

async fn logout(State(backend): Shared) -> (StatusCode, Json<Value>) {
    backend.logout_calls.fetch_add(1, Ordering::SeqCst);
    ok(Value::Null)
}

async fn articles(State(backend): Shared, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    if !backend.accepts(&headers) {
        return unauthorized("jwt expired");
    }
    ok(json!({
        "docs": [{
            "_id": "a1",
            "title": "Hello",
            "content": "World",
            "author": "u1",
            "status": "published"
        }],
        "totalDocs": 1,
        "limit": 20,
        "page": 1,
        "totalPages": 1
    }))
}

/// `a1` is written by `u1`, every other article by `u9`.
fn article_json(id: &str) -> Value {
    let author = if id == "a1" { "u1" } else { "u9" };
    json!({
        "_id": id,
        "title": "Hello",
        "content": "World",
        "author": author,
        "status": "published"
    })
}

async fn article(
    State(backend): Shared,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    if !backend.accepts(&headers) {
        return unauthorized("jwt expired");
    }
    ok(article_json(&id))
}

async fn update_article(
    State(backend): Shared,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    if !backend.accepts(&headers) {
        return unauthorized("jwt expired");
    }
    backend.writes.fetch_add(1, Ordering::SeqCst);
    let mut updated = article_json(&id);
    if let Some(title) = body.get("title") {
        updated["title"] = title.clone();
    }
    ok(updated)
}

async fn remove(State(backend): Shared, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    if !backend.accepts(&headers) {
        return unauthorized("jwt expired");
    }
    backend.writes.fetch_add(1, Ordering::SeqCst);
    ok(Value::Null)
}

async fn roles(State(backend): Shared, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    if !backend.accepts(&headers) {
        return unauthorized("jwt expired");
    }
    ok(json!([
        { "_id": "r-admin", "code": "admin" },
        { "_id": "r-editor", "code": "editor" },
        { "_id": "r-writer", "code": "writer", "status": false }
    ]))
}

async fn update_role(
    State(backend): Shared,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    if !backend.accepts(&headers) {
        return unauthorized("jwt expired");
    }
    let code = match body["role"].as_str() {
        Some(code @ ("admin" | "editor" | "writer" | "reader")) => code,
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "success": false, "message": "Unknown role" })),
            )
        }
    };
    ok(json!({ "_id": id, "email": "someone@example.com", "role": code }))
}

async fn profile(State(backend): Shared, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    if !backend.accepts(&headers) {
        return unauthorized("jwt expired");
    }
    ok(user_json("writer@example.com"))
}

struct TestServer {
    base_url: String,
    backend: Arc<Backend>,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        let backend = Arc::new(Backend::default());
        let app = Router::new()
            .route("/api/login", post(login))
            .route("/api/auth/refresh", post(refresh))
            .route("/api/auth/logout", post(logout))
            .route("/api/articles", get(articles))
            .route(
                "/api/articles/:id",
                get(article).put(update_article).delete(remove),
            )
            .route("/api/admin/users/:id", delete(remove))
            .route("/api/roles", get(roles))
            .route("/api/users/:id/role", patch(update_role))
            .route("/api/profile", get(profile))
            .with_state(backend.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}/api", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            backend,
            handle,
        }
    }

    fn config(&self, state_dir: PathBuf) -> ClientConfig {
        ClientConfig::new(&self.base_url)
            .with_state_dir(state_dir)
            .with_refresh_timeout(Duration::from_secs(5))
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("articlehub-{name}-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

async fn list_concurrently(client: &SessionClient, n: usize) -> Vec<Result<usize, ServiceError>> {
    let handles: Vec<_> = (0..n)
        .map(|_| {
            let service = ArticleService::new(client.clone());
            tokio::spawn(async move {
                service
                    .list(ArticleQuery::default())
                    .await
                    .map(|page| page.docs.len())
            })
        })
        .collect();

    let mut results = Vec::with_capacity(n);
    for handle in handles {
        results.push(handle.await.unwrap());
    }
    results
}

#[tokio::test]
async fn concurrent_expired_requests_share_one_refresh() {
    let srv = TestServer::spawn().await;
    let client = SessionClient::new(&srv.config(scratch_dir("single-flight"))).unwrap();
    client.login("writer@example.com", "secret").await.unwrap();

    srv.backend.expire();
    let results = list_concurrently(&client, 5).await;

    assert!(results.iter().all(|r| r == &Ok(1)), "{results:?}");
    assert_eq!(srv.backend.refresh_calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        client.credentials().read_token().map(|t| t.expose().to_string()),
        Some(srv.backend.valid_token())
    );
}

#[tokio::test]
async fn bad_credentials_never_refresh() {
    let srv = TestServer::spawn().await;
    let client = SessionClient::new(&srv.config(scratch_dir("bad-login"))).unwrap();

    let err = client.login("writer@example.com", "wrong").await.unwrap_err();

    assert_eq!(err, ClientError::Authentication("Invalid email or password".to_string()));
    assert_eq!(srv.backend.refresh_calls.load(Ordering::SeqCst), 0);
    assert!(!client.has_token());
}

#[tokio::test]
async fn failed_refresh_signs_every_waiter_out() {
    let srv = TestServer::spawn().await;
    let client = SessionClient::new(&srv.config(scratch_dir("refresh-fails"))).unwrap();
    client.login("writer@example.com", "secret").await.unwrap();
    let changes = client.session().subscribe();
    changes.drain();

    srv.backend.refresh_fails.store(true, Ordering::SeqCst);
    srv.backend.expire();
    let results = list_concurrently(&client, 3).await;

    assert_eq!(results.len(), 3);
    for result in &results {
        match result {
            Err(ServiceError::Client(ClientError::RefreshFailed(RefreshError::Rejected(_)))) => {}
            // A request dispatched after the sign-out is refused before sending.
            Err(ServiceError::Client(ClientError::NotAuthenticated | ClientError::Cancelled)) => {}
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(result.as_ref().unwrap_err().needs_login());
    }
    assert_eq!(srv.backend.refresh_calls.load(Ordering::SeqCst), 1);
    assert!(!client.has_token());
    assert_eq!(client.current_user(), None);
    assert_eq!(changes.drain().last(), Some(None));
}

#[tokio::test]
async fn session_survives_a_restart() {
    let srv = TestServer::spawn().await;
    let dir = scratch_dir("restart");

    let first = SessionClient::new(&srv.config(dir.clone())).unwrap();
    let user = first.login("writer@example.com", "secret").await.unwrap();
    drop(first);

    let second = SessionClient::new(&srv.config(dir.clone())).unwrap();
    assert_eq!(second.current_user(), Some(user));
    let page = ArticleService::new(second.clone())
        .list(ArticleQuery::default())
        .await
        .unwrap();
    assert_eq!(page.total_docs, 1);

    let _ = std::fs::remove_dir_all(dir);
}

#[tokio::test]
async fn cookie_session_reaches_endpoints_without_a_token() {
    let srv = TestServer::spawn().await;
    let client = SessionClient::new(&srv.config(scratch_dir("cookie-login"))).unwrap();

    let user = client.login("cookie@example.com", "secret").await.unwrap();

    assert_eq!(user.email, "cookie@example.com");
    assert!(!client.has_token());
    assert_eq!(client.current_user(), Some(user));

    let articles = ArticleService::new(client.clone());
    let page = articles.list(ArticleQuery::default()).await.unwrap();
    assert_eq!(page.total_docs, 1);

    // The cookie expires; renewal hands out a new cookie and still no token.
    srv.backend.expire();
    for _ in 0..3 {
        let page = articles.list(ArticleQuery::default()).await.unwrap();
        assert_eq!(page.total_docs, 1);
    }
    assert_eq!(srv.backend.refresh_calls.load(Ordering::SeqCst), 1);
    assert!(!client.has_token());
}

#[tokio::test]
async fn logout_clears_locally_and_notifies_backend() {
    let srv = TestServer::spawn().await;
    let client = SessionClient::new(&srv.config(scratch_dir("logout"))).unwrap();
    client.login("writer@example.com", "secret").await.unwrap();

    client.logout();
    assert!(!client.has_token());
    assert_eq!(client.current_user(), None);

    for _ in 0..50 {
        if srv.backend.logout_calls.load(Ordering::SeqCst) == 1 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("backend logout was never called");
}

#[tokio::test]
async fn user_administration_is_role_gated() {
    let srv = TestServer::spawn().await;
    let id = UserId::parse("u2").unwrap();

    let reader = SessionClient::new(&srv.config(scratch_dir("reader"))).unwrap();
    reader.login("reader@example.com", "secret").await.unwrap();
    let err = UserService::new(reader).list_roles().await.unwrap_err();
    assert_eq!(err, ServiceError::Forbidden(AuthzError::Forbidden(Permission::ManageUsers)));

    let admin = SessionClient::new(&srv.config(scratch_dir("admin"))).unwrap();
    admin.login("admin@example.com", "secret").await.unwrap();
    let users = UserService::new(admin);

    let updated = users.update_role(&id, &Role::EDITOR).await.unwrap();
    assert_eq!(updated.role, Role::EDITOR);

    // Unknown codes are refused before anything is sent.
    let err = users.update_role(&id, &Role::new("superuser")).await.unwrap_err();
    assert!(matches!(err, ServiceError::Invalid(_)));
}

#[tokio::test]
async fn role_ids_resolve_through_the_catalogue() {
    let srv = TestServer::spawn().await;
    let admin = SessionClient::new(&srv.config(scratch_dir("catalogue"))).unwrap();
    admin.login("admin@example.com", "secret").await.unwrap();
    let users = UserService::new(admin);

    let editor = users.role_for_id(&RoleId::parse("r-editor").unwrap()).await.unwrap();
    assert_eq!(editor, Role::EDITOR);

    // Inactive roles do not resolve.
    let err = users
        .role_for_id(&RoleId::parse("r-writer").unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Invalid(_)));
}

#[tokio::test]
async fn profile_reads_through_an_expired_token() {
    let srv = TestServer::spawn().await;
    let client = SessionClient::new(&srv.config(scratch_dir("profile"))).unwrap();
    client.login("writer@example.com", "secret").await.unwrap();
    let profile = ProfileService::new(client);

    srv.backend.expire();
    let me = profile.get().await.unwrap();
    assert_eq!(me.role, Role::WRITER);
    assert_eq!(srv.backend.refresh_calls.load(Ordering::SeqCst), 1);

    let mismatch = UpdatePassword {
        old_password: "secret".into(),
        password: "n3w".into(),
        confirm_password: "new".into(),
    };
    let err = profile.update_password(&mismatch).await.unwrap_err();
    assert!(matches!(err, ServiceError::Invalid(_)));
}

#[tokio::test]
async fn writers_change_only_their_own_articles() {
    let srv = TestServer::spawn().await;
    let client = SessionClient::new(&srv.config(scratch_dir("ownership"))).unwrap();
    client.login("writer@example.com", "secret").await.unwrap();
    let articles = ArticleService::new(client);
    let own = ArticleId::parse("a1").unwrap();
    let other = ArticleId::parse("a2").unwrap();
    let rename = UpdateArticle {
        title: Some("Renamed".into()),
        ..Default::default()
    };

    assert_eq!(articles.update(&own, &rename).await.unwrap().title, "Renamed");
    articles.delete(&own).await.unwrap();
    assert_eq!(srv.backend.writes.load(Ordering::SeqCst), 2);

    let refused = ServiceError::Forbidden(AuthzError::NotAuthor);
    assert_eq!(articles.update(&other, &rename).await.unwrap_err(), refused);
    assert_eq!(articles.delete(&other).await.unwrap_err(), refused);
    assert_eq!(srv.backend.writes.load(Ordering::SeqCst), 2);

    let editor = SessionClient::new(&srv.config(scratch_dir("ownership-editor"))).unwrap();
    editor.login("editor@example.com", "secret").await.unwrap();
    ArticleService::new(editor).delete(&other).await.unwrap();
    assert_eq!(srv.backend.writes.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn admins_cannot_remove_or_re_role_themselves() {
    let srv = TestServer::spawn().await;
    let admin = SessionClient::new(&srv.config(scratch_dir("self-delete"))).unwrap();
    let me = admin.login("admin@example.com", "secret").await.unwrap().id;
    let users = UserService::new(admin);

    let refused = ServiceError::Forbidden(AuthzError::OwnAccount);
    assert_eq!(users.delete(&me).await.unwrap_err(), refused);
    assert_eq!(users.update_role(&me, &Role::READER).await.unwrap_err(), refused);
    assert_eq!(srv.backend.writes.load(Ordering::SeqCst), 0);

    users.delete(&UserId::parse("u2").unwrap()).await.unwrap();
    assert_eq!(srv.backend.writes.load(Ordering::SeqCst), 1);
}
