//! In-process mock of the dashboard REST backend, served by axum on an
//! ephemeral localhost port.
#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::task::JoinHandle;

pub const EMAIL: &str = "user@example.com";
pub const PASSWORD: &str = "password123";
pub const REFRESH_COOKIE: &str = "refresh_token=rt-1";

#[derive(Debug, Clone)]
pub enum RefreshMode {
    Issue(String),
    Fail(u16),
}

#[derive(Debug, Clone)]
pub struct Seen {
    pub method: String,
    pub path: String,
    pub authorization: Option<String>,
    pub cookie: Option<String>,
    pub body: Option<Value>,
}

pub struct MockState {
    pub valid_tokens: Mutex<HashSet<String>>,
    pub refresh_mode: Mutex<RefreshMode>,
    pub refresh_delay: Mutex<Duration>,
    pub refresh_calls: AtomicUsize,
    /// 401 for every protected request regardless of token
    pub reject_all: AtomicBool,
    pub fail_me_times: AtomicUsize,
    pub me_calls: AtomicUsize,
    pub fail_revoke_others: AtomicBool,
    pub revoke_others_calls: AtomicUsize,
    pub logout_status: Mutex<u16>,
    pub sessions: Mutex<Vec<Value>>,
    pub current_session: String,
    pub seen: Mutex<Vec<Seen>>,
}

impl MockState {
    fn new() -> Self {
        Self {
            valid_tokens: Mutex::new(HashSet::new()),
            refresh_mode: Mutex::new(RefreshMode::Issue("T2".into())),
            refresh_delay: Mutex::new(Duration::from_millis(0)),
            refresh_calls: AtomicUsize::new(0),
            reject_all: AtomicBool::new(false),
            fail_me_times: AtomicUsize::new(0),
            me_calls: AtomicUsize::new(0),
            fail_revoke_others: AtomicBool::new(false),
            revoke_others_calls: AtomicUsize::new(0),
            logout_status: Mutex::new(200),
            sessions: Mutex::new(vec![session_json("s1")]),
            current_session: "s1".into(),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn accept_token(&self, t: &str) {
        self.valid_tokens.lock().unwrap().insert(t.to_string());
    }

    pub fn revoke_all_tokens(&self) {
        self.valid_tokens.lock().unwrap().clear();
    }

    pub fn set_refresh(&self, mode: RefreshMode, delay: Duration) {
        *self.refresh_mode.lock().unwrap() = mode;
        *self.refresh_delay.lock().unwrap() = delay;
    }

    pub fn set_sessions(&self, ids: &[&str]) {
        *self.sessions.lock().unwrap() = ids.iter().map(|id| session_json(id)).collect();
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn seen_for(&self, path: &str) -> Vec<Seen> {
        self.seen.lock().unwrap().iter().filter(|s| s.path == path).cloned().collect()
    }

    fn record(&self, method: &str, path: &str, headers: &HeaderMap, body: Option<Value>) {
        let h = |name: header::HeaderName| headers.get(name).and_then(|v| v.to_str().ok()).map(|s| s.to_string());
        self.seen.lock().unwrap().push(Seen {
            method: method.into(),
            path: path.into(),
            authorization: h(header::AUTHORIZATION),
            cookie: h(header::COOKIE),
            body,
        });
    }

    fn authorized(&self, headers: &HeaderMap) -> Option<String> {
        if self.reject_all.load(Ordering::SeqCst) {
            return None;
        }
        let auth = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
        let token = auth.strip_prefix("Bearer ")?;
        if self.valid_tokens.lock().unwrap().contains(token) {
            Some(token.to_string())
        } else {
            None
        }
    }
}

pub fn session_json(id: &str) -> Value {
    json!({
        "id": id,
        "deviceInfo": {"browser": "Firefox", "os": "Linux"},
        "ipAddress": "10.0.0.1",
        "userAgent": "Mozilla/5.0",
        "lastActivity": "2024-05-01T10:00:00Z",
        "createdAt": "2024-04-30T09:00:00Z",
        "rememberMe": false
    })
}

fn user_json() -> Value {
    json!({
        "id": "u1",
        "name": "Test User",
        "email": EMAIL,
        "role": {"id": "r1", "name": "member", "permissions": ["task.create", "task.update"]},
        "createdAt": "2024-01-01T00:00:00Z",
        "updatedAt": "2024-01-01T00:00:00Z"
    })
}

fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({"message": "Unauthorized"}))).into_response()
}

type S = State<Arc<MockState>>;

async fn login(State(st): S, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    st.record("POST", "/auth/login", &headers, Some(body.clone()));
    if body["email"] != EMAIL || body["password"] != PASSWORD {
        return (StatusCode::UNAUTHORIZED, Json(json!({"message": "Invalid email or password"}))).into_response();
    }
    st.accept_token("abc");
    (
        StatusCode::OK,
        [(header::SET_COOKIE, format!("{}; Path=/; HttpOnly", REFRESH_COOKIE))],
        Json(json!({"user": user_json(), "token": "abc", "sessionId": st.current_session})),
    )
        .into_response()
}

async fn refresh(State(st): S, headers: HeaderMap) -> Response {
    st.record("POST", "/auth/refresh", &headers, None);
    st.refresh_calls.fetch_add(1, Ordering::SeqCst);
    let delay = *st.refresh_delay.lock().unwrap();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    let mode = st.refresh_mode.lock().unwrap().clone();
    match mode {
        RefreshMode::Issue(t) => {
            st.accept_token(&t);
            (StatusCode::OK, Json(json!({ "token": t }))).into_response()
        }
        RefreshMode::Fail(code) => {
            let status = StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST);
            (status, Json(json!({"message": "Refresh token expired"}))).into_response()
        }
    }
}

async fn logout(State(st): S, headers: HeaderMap) -> Response {
    st.record("POST", "/auth/logout", &headers, None);
    let code = *st.logout_status.lock().unwrap();
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::OK);
    (status, Json(json!({"message": "bye"}))).into_response()
}

async fn me(State(st): S, headers: HeaderMap) -> Response {
    st.record("GET", "/auth/me", &headers, None);
    st.me_calls.fetch_add(1, Ordering::SeqCst);
    let remaining = st.fail_me_times.load(Ordering::SeqCst);
    if remaining > 0 {
        st.fail_me_times.store(remaining - 1, Ordering::SeqCst);
        return (StatusCode::SERVICE_UNAVAILABLE, Json(json!({"message": "try later"}))).into_response();
    }
    if st.authorized(&headers).is_none() {
        return unauthorized();
    }
    Json(user_json()).into_response()
}

async fn tasks(State(st): S, headers: HeaderMap) -> Response {
    st.record("GET", "/tasks", &headers, None);
    match st.authorized(&headers) {
        Some(token) => Json(json!({"tasks": [], "servedWith": token})).into_response(),
        None => unauthorized(),
    }
}

async fn list_sessions(State(st): S, headers: HeaderMap) -> Response {
    st.record("GET", "/auth/sessions", &headers, None);
    if st.authorized(&headers).is_none() {
        return unauthorized();
    }
    let sessions = st.sessions.lock().unwrap().clone();
    Json(json!({"sessions": sessions, "currentSessionId": st.current_session})).into_response()
}

async fn revoke_others(State(st): S, headers: HeaderMap) -> Response {
    st.record("DELETE", "/auth/sessions/revoke-others", &headers, None);
    st.revoke_others_calls.fetch_add(1, Ordering::SeqCst);
    if st.fail_revoke_others.load(Ordering::SeqCst) {
        return (StatusCode::SERVICE_UNAVAILABLE, Json(json!({"message": "busy"}))).into_response();
    }
    if st.authorized(&headers).is_none() {
        return unauthorized();
    }
    let mut sessions = st.sessions.lock().unwrap();
    let before = sessions.len();
    sessions.retain(|s| s["id"] == st.current_session.as_str());
    let revoked = before - sessions.len();
    Json(json!({"message": "ok", "revokedCount": revoked})).into_response()
}

async fn revoke_one(State(st): S, headers: HeaderMap, Path(id): Path<String>) -> Response {
    st.record("DELETE", &format!("/auth/sessions/{}", id), &headers, None);
    if st.authorized(&headers).is_none() {
        return unauthorized();
    }
    let mut sessions = st.sessions.lock().unwrap();
    let before = sessions.len();
    sessions.retain(|s| s["id"] != id.as_str());
    if sessions.len() == before {
        return (StatusCode::NOT_FOUND, Json(json!({"message": "Session not found"}))).into_response();
    }
    StatusCode::NO_CONTENT.into_response()
}

pub struct MockBackend {
    pub state: Arc<MockState>,
    pub base_url: String,
    handle: JoinHandle<()>,
}

impl MockBackend {
    pub async fn start() -> Self {
        let state = Arc::new(MockState::new());
        let api = Router::new()
            .route("/auth/login", post(login))
            .route("/auth/refresh", post(refresh))
            .route("/auth/logout", post(logout))
            .route("/auth/me", get(me))
            .route("/auth/sessions", get(list_sessions))
            .route("/auth/sessions/revoke-others", delete(revoke_others))
            .route("/auth/sessions/{id}", delete(revoke_one))
            .route("/tasks", get(tasks))
            .with_state(state.clone());
        let app = Router::new().nest("/api", api);

        let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0)).await.expect("bind 127.0.0.1:0");
        let port = listener.local_addr().expect("local addr").port();
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                eprintln!("mock backend error: {e:?}");
            }
        });
        Self { state, base_url: format!("http://127.0.0.1:{}/api", port), handle }
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
