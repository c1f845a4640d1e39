//!
//! strandworks HTTP server
//! -----------------------
//! Axum-based HTTP API for the access-control service.
//!
//! Responsibilities:
//! - Session management with a cookie + CSRF token model; one durable
//!   session store per session id under the data root.
//! - Login/logout endpoints backed by the `identity` provider and the
//!   `security` registry.
//! - Guarded views that answer denied evaluations with a redirect to the
//!   login destination and granted evaluations with the wrapped payload.
//! - Background sweep of expired session stores.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Duration;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error, info};

use crate::error::AppError;
use crate::identity::{
    self, authorizer, evaluate_access, has_permission, AuthProvider, Decision, FileSessionStore,
    LocalAuthProvider, LoginRequest, MemorySessionStore, Principal, Role, RolePolicy,
    SessionAccessor, SessionStore, CSRF_KEY, DEFAULT_FALLBACK, DEFAULT_TTL_SECS,
};
use crate::security;

const SESSION_COOKIE: &str = "strandworks_session";

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub data_root: String,
    pub provider: Arc<dyn AuthProvider>,
    pub policy: Arc<RolePolicy>,
    pub session_ttl_secs: i64,
}

fn sessions_root(data_root: &str) -> PathBuf {
    Path::new(data_root).join("sessions")
}

fn log_startup_folders(data_root: &str) {
    let cwd = std::env::current_dir().ok();
    let exe = std::env::current_exe().ok();
    let root_env = std::env::var("STRANDWORKS_DATA_FOLDER").ok();
    info!(
        target: "startup",
        "strandworks starting. Folder configuration: cwd={:?}, exe={:?}, data_root_param={:?}, STRANDWORKS_DATA_FOLDER_env={:?}",
        cwd, exe, data_root, root_env
    );
}

/// Start the HTTP server bound to the given port.
///
/// Ensures the data root and the default admin exist, spawns the session
/// sweeper and mounts all routes.
pub async fn run_with_ports(http_port: u16, data_root: &str, session_ttl_secs: i64) -> anyhow::Result<()> {
    use anyhow::Context;

    log_startup_folders(data_root);

    std::fs::create_dir_all(data_root)
        .with_context(|| format!("Failed to create or access data root: {}", data_root))?;
    security::ensure_default_admin(data_root)
        .with_context(|| format!("While ensuring default admin under data_root: {}", data_root))?;

    // Background sweep of expired session stores
    {
        let sweep_root = sessions_root(data_root);
        tokio::spawn(async move {
            use std::time::Duration;
            loop {
                let removed = sweep_sessions(&sweep_root);
                if removed > 0 {
                    debug!(removed = removed, "session_sweep");
                }
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
        });
    }

    let app_state = AppState {
        data_root: data_root.to_string(),
        provider: Arc::new(LocalAuthProvider::new(data_root)),
        policy: Arc::new(RolePolicy::default()),
        session_ttl_secs,
    };

    let app = Router::new()
        .route("/", get(|| async { "strandworks ok" }))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/csrf", get(get_csrf))
        .route("/session", get(session_info))
        .route("/dashboard", get(dashboard))
        .route("/admin/settings", get(admin_settings))
        .route("/pos", get(pos))
        .route("/quotations", get(quotations))
        .with_state(app_state);

    let addr: SocketAddr = format!("0.0.0.0:{}", http_port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Convenience entry point using default port (7878) and data root "data".
pub async fn run() -> anyhow::Result<()> {
    run_with_ports(7878, "data", DEFAULT_TTL_SECS).await
}

/// Remove session directories whose stores no longer validate.
fn sweep_sessions(root: &Path) -> usize {
    let mut removed = 0usize;
    if let Ok(rd) = std::fs::read_dir(root) {
        for entry in rd.flatten() {
            if !entry.file_type().map(|ft| ft.is_dir()).unwrap_or(false) {
                continue;
            }
            let store = FileSessionStore::new(entry.path());
            if identity::validate(&store).is_none() && store.destroy().is_ok() {
                removed += 1;
            }
        }
    }
    removed
}

#[derive(Debug, Deserialize)]
struct LoginPayload {
    username: String,
    password: String,
}

fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let cookie = headers.get("cookie").or_else(|| headers.get("Cookie"))?;
    let s = cookie.to_str().ok()?;
    for part in s.split(';') {
        let p = part.trim();
        if let Some(eq) = p.find('=') {
            let (k, v) = p.split_at(eq);
            if k == name {
                return Some(v[1..].to_string());
            }
        }
    }
    None
}

/// Session ids come back from the client; only the base64url alphabet our
/// token generator emits may reach the filesystem.
fn valid_sid(sid: &str) -> bool {
    !sid.is_empty()
        && sid.len() <= 64
        && sid
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn set_session_cookie(sid: &str) -> HeaderValue {
    HeaderValue::from_str(&format!(
        "{}={}; HttpOnly; Secure; SameSite=Strict; Path=/",
        SESSION_COOKIE, sid
    ))
    .unwrap()
}

fn clear_session_cookie() -> HeaderValue {
    HeaderValue::from_str(&format!(
        "{}=deleted; Expires=Thu, 01 Jan 1970 00:00:00 GMT; HttpOnly; Secure; SameSite=Strict; Path=/",
        SESSION_COOKIE
    ))
    .unwrap()
}

/// The persisted session store for this request.
///
/// No cookie, a malformed session id, or an expired session all resolve to
/// an empty in-memory store, so the guard sees a plain absent principal and
/// makes the decision itself.
fn request_store(state: &AppState, headers: &HeaderMap) -> Box<dyn SessionStore> {
    if let Some(sid) = parse_cookie(headers, SESSION_COOKIE) {
        if valid_sid(&sid) {
            let store = FileSessionStore::new(sessions_root(&state.data_root).join(&sid));
            if identity::validate(&store).is_some() {
                return Box::new(store);
            }
        } else {
            debug!("rejected malformed session id from cookie");
        }
    }
    Box::new(MemorySessionStore::new())
}

fn error_status(err: &AppError) -> StatusCode {
    StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

fn validate_csrf(state: &AppState, headers: &HeaderMap) -> bool {
    let store = request_store(state, headers);
    let Some(expected) = store.get(CSRF_KEY) else { return false };
    let Some(provided) = headers
        .get("x-csrf-token")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
    else {
        return false;
    };
    expected == provided
}

async fn login(State(state): State<AppState>, Json(payload): Json<LoginPayload>) -> impl IntoResponse {
    let req = LoginRequest { username: payload.username, password: payload.password };
    match state.provider.login(&req) {
        Ok(resp) => {
            let sid = identity::gen_id();
            let store = FileSessionStore::new(sessions_root(&state.data_root).join(&sid));
            let issued = match identity::issue(
                &store,
                &resp.principal,
                Duration::seconds(state.session_ttl_secs),
            ) {
                Ok(issued) => issued,
                Err(e) => {
                    error!("session issue failed: {e}");
                    return (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        HeaderMap::new(),
                        Json(json!({"status":"error","error":"session_unavailable"})),
                    );
                }
            };
            let mut headers = HeaderMap::new();
            headers.insert("Set-Cookie", set_session_cookie(&sid));
            (
                StatusCode::OK,
                headers,
                Json(json!({
                    "status": "ok",
                    "principal": resp.principal,
                    "permissions": resp.permissions,
                    "expires_at": issued.meta.expires_at,
                })),
            )
        }
        Err(e) => {
            let err = match e.to_string().as_str() {
                "invalid_credentials" => {
                    AppError::auth("invalid_credentials", "invalid username or password")
                }
                "account_inactive" => AppError::auth("account_inactive", "account is deactivated"),
                _ => {
                    error!("login error: {e}");
                    AppError::internal("login_failed", "login failed")
                }
            };
            (
                error_status(&err),
                HeaderMap::new(),
                Json(json!({"status":"error","error": err})),
            )
        }
    }
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    // Require CSRF token
    if !validate_csrf(&state, &headers) {
        let err = AppError::csrf("invalid_csrf", "missing or invalid csrf token");
        return (
            error_status(&err),
            HeaderMap::new(),
            Json(json!({"status":"error","error": err})),
        );
    }
    if let Some(sid) = parse_cookie(&headers, SESSION_COOKIE) {
        if valid_sid(&sid) {
            let store = FileSessionStore::new(sessions_root(&state.data_root).join(&sid));
            let accessor = SessionAccessor::new(Arc::new(store.clone()));
            accessor.logout();
            // drop the now-empty session directory as well
            let _ = store.destroy();
        }
    }
    let mut h = HeaderMap::new();
    h.insert("Set-Cookie", clear_session_cookie());
    (StatusCode::OK, h, Json(json!({"status":"ok"})))
}

async fn get_csrf(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let store = request_store(&state, &headers);
    if identity::stored_principal(store.as_ref()).is_none() {
        let err = AppError::auth("unauthenticated", "login required");
        return (error_status(&err), Json(json!({"status":"error","error": err})));
    }
    match store.get(CSRF_KEY) {
        Some(token) => (StatusCode::OK, Json(json!({"status":"ok","csrf": token}))),
        None => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"status":"error","error":"csrf not available"})),
        ),
    }
}

/// Accessor-style read: who is logged in, if anyone. Never redirects.
async fn session_info(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let store: Arc<dyn SessionStore> = Arc::from(request_store(&state, &headers));
    let accessor = SessionAccessor::new(store);
    match accessor.current_principal() {
        Some(p) => Json(json!({"authenticated": true, "principal": p})),
        None => Json(json!({"authenticated": false})),
    }
}

/// Gate a wrapped view behind the access evaluation.
///
/// The decision is computed as a value; this is the one place that turns a
/// denial into the navigation side effect (a 303 to the fallback).
fn render_guarded<R: IntoResponse>(
    state: &AppState,
    headers: &HeaderMap,
    required_role: Option<&Role>,
    view: impl FnOnce(&Principal) -> R,
) -> Response {
    let store = request_store(state, headers);
    match evaluate_access(store.as_ref(), &state.policy, required_role, DEFAULT_FALLBACK) {
        Decision::Granted(p) => view(&p).into_response(),
        Decision::Denied { destination } => Redirect::to(&destination).into_response(),
    }
}

async fn dashboard(State(state): State<AppState>, headers: HeaderMap) -> Response {
    render_guarded(&state, &headers, None, |p| {
        Json(json!({
            "view": "dashboard",
            "welcome": p.name,
            "role": p.role,
        }))
    })
}

async fn admin_settings(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let required = Role::new(authorizer::ADMIN);
    render_guarded(&state, &headers, Some(&required), |p| {
        Json(json!({
            "view": "admin_settings",
            "operator": p.username,
        }))
    })
}

async fn pos(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let required = Role::new(authorizer::CASHIER);
    render_guarded(&state, &headers, Some(&required), |p| {
        Json(json!({
            "view": "pos",
            "operator": p.username,
        }))
    })
}

/// Permission-gated view: authentication via the guard, then a grant check.
/// An authenticated principal without the grant gets a 403, not a redirect.
async fn quotations(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let store = request_store(&state, &headers);
    match evaluate_access(store.as_ref(), &state.policy, None, DEFAULT_FALLBACK) {
        Decision::Denied { destination } => Redirect::to(&destination).into_response(),
        Decision::Granted(p) => {
            if !has_permission(&p.role, authorizer::permissions::QUOTATIONS_VIEW) {
                return (
                    StatusCode::FORBIDDEN,
                    Json(json!({"status":"forbidden","error":"insufficient permissions"})),
                )
                    .into_response();
            }
            Json(json!({"view": "quotations", "operator": p.username})).into_response()
        }
    }
}
