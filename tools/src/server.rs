//! Dashboard JSON API over the operations workbook.
//!
//! Each client opens a session, logs in through the email allow-list, and
//! then asks for dashboard views. Every request recomputes its view from the
//! data provider; session state lives only in memory.
//!
//! RULES:
//!   - A session idle for longer than the configured TTL is gone: it is
//!     evicted on the next sweep and answers 404 in the meantime.
//!   - Workbook reads never run on an async worker thread.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use opsmon_core::{
    access::{PrimaryGate, SecondaryGate},
    config::MonitorConfig,
    error::{AccessDenied, MonitorError},
    loader::parse_date_text,
    provider::{DataProvider, WorkbookProvider},
    session::{SessionContext, ViewSwitch},
    types::EntityKind,
    view::{DashboardQuery, DashboardView},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use uuid::Uuid;

struct SessionEntry {
    context:   SessionContext,
    last_seen: Instant,
}

impl SessionEntry {
    fn new() -> Self {
        Self { context: SessionContext::new(), last_seen: Instant::now() }
    }
}

#[derive(Clone)]
pub struct AppState {
    provider:    Arc<dyn DataProvider>,
    primary:     Arc<PrimaryGate>,
    secondary:   Arc<SecondaryGate>,
    sessions:    Arc<Mutex<HashMap<Uuid, SessionEntry>>>,
    session_ttl: Duration,
}

impl AppState {
    pub fn new(
        provider: Arc<dyn DataProvider>,
        primary: PrimaryGate,
        secondary: SecondaryGate,
        session_ttl: Duration,
    ) -> Self {
        Self {
            provider,
            primary: Arc::new(primary),
            secondary: Arc::new(secondary),
            sessions: Arc::new(Mutex::new(HashMap::new())),
            session_ttl,
        }
    }

    pub fn from_config(config: &MonitorConfig) -> Self {
        Self::new(
            Arc::new(WorkbookProvider::new(&config.data_file)),
            PrimaryGate::from_config(config),
            SecondaryGate::from_config(config),
            Duration::from_secs(config.session_ttl_secs),
        )
    }

    pub fn session_count(&self) -> usize {
        self.sessions().len()
    }

    /// Drop every session idle for longer than the TTL; returns how many went.
    pub fn evict_idle(&self) -> usize {
        let ttl = self.session_ttl;
        let mut sessions = self.sessions();
        let before = sessions.len();
        sessions.retain(|_, entry| entry.last_seen.elapsed() < ttl);
        before - sessions.len()
    }

    /// Sessions are only replaced by whole values, so a poisoned guard is
    /// still safe to reuse.
    fn sessions(&self) -> MutexGuard<'_, HashMap<Uuid, SessionEntry>> {
        self.sessions.lock().unwrap_or_else(|poisoned| {
            log::warn!("session store lock was poisoned; recovering it");
            poisoned.into_inner()
        })
    }

    /// Run `f` against one live session's context and mark it as used.
    fn with_session<T>(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut SessionContext) -> Result<T, ApiError>,
    ) -> Result<T, ApiError> {
        let mut sessions = self.sessions();
        let expired = match sessions.get(&id) {
            Some(entry) => entry.last_seen.elapsed() >= self.session_ttl,
            None        => return Err(ApiError::UnknownSession),
        };
        if expired {
            sessions.remove(&id);
            log::info!("session {id} expired");
            return Err(ApiError::UnknownSession);
        }

        let entry = sessions.get_mut(&id).ok_or(ApiError::UnknownSession)?;
        entry.last_seen = Instant::now();
        f(&mut entry.context)
    }
}

/// Periodically evict idle sessions for as long as the server runs.
pub fn spawn_session_sweeper(state: AppState) -> JoinHandle<()> {
    let period = state
        .session_ttl
        .clamp(Duration::from_secs(1), Duration::from_secs(60));
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(period);
        loop {
            tick.tick().await;
            let evicted = state.evict_idle();
            if evicted > 0 {
                log::info!("evicted {evicted} idle session(s)");
            }
        }
    })
}

// ── Errors ───────────────────────────────────────────────────────────────────

enum ApiError {
    UnknownSession,
    Denied(AccessDenied),
    BadRequest { message: String },
    Internal { message: String },
}

impl From<AccessDenied> for ApiError {
    fn from(e: AccessDenied) -> Self {
        ApiError::Denied(e)
    }
}

impl From<MonitorError> for ApiError {
    fn from(e: MonitorError) -> Self {
        match e {
            MonitorError::Access(denied) => ApiError::Denied(denied),
            other => {
                log::error!("dashboard request failed: {other}");
                ApiError::Internal { message: other.to_string() }
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::UnknownSession         => (StatusCode::NOT_FOUND, "Session inconnue.".to_string()),
            ApiError::Denied(e)              => (StatusCode::FORBIDDEN, e.to_string()),
            ApiError::BadRequest { message } => (StatusCode::BAD_REQUEST, message),
            ApiError::Internal { message }   => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

// ── Requests / responses ─────────────────────────────────────────────────────

#[derive(Deserialize)]
struct EmailRequest {
    email: String,
}

#[derive(Deserialize)]
struct ViewRequest {
    view: EntityKind,
}

/// Query strings arrive as text so blank values mean "unset".
#[derive(Deserialize)]
struct RawDashboardQuery {
    entity: Option<String>,
    start:  Option<String>,
    end:    Option<String>,
}

#[derive(Serialize)]
struct SessionStatus {
    session_id:  Uuid,
    #[serde(flatten)]
    context:     SessionContext,
    active_view: EntityKind,
}

impl SessionStatus {
    fn of(session_id: Uuid, context: &SessionContext) -> Self {
        Self {
            session_id,
            context:     context.clone(),
            active_view: context.view(),
        }
    }
}

#[derive(Serialize)]
struct ViewResponse {
    outcome: ViewSwitch,
    #[serde(flatten)]
    status:  SessionStatus,
}

fn parse_query_date(raw: Option<&str>) -> Result<Option<chrono::NaiveDate>, ApiError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => parse_date_text(s)
            .map(|dt| Some(dt.date()))
            .ok_or_else(|| ApiError::BadRequest { message: format!("Date invalide : {s}") }),
    }
}

// ── Handlers ─────────────────────────────────────────────────────────────────

async fn health_check() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn open_session(State(state): State<AppState>) -> Json<SessionStatus> {
    let evicted = state.evict_idle();
    if evicted > 0 {
        log::info!("evicted {evicted} idle session(s)");
    }

    let id = Uuid::new_v4();
    let entry = SessionEntry::new();
    let status = SessionStatus::of(id, &entry.context);
    state.sessions().insert(id, entry);
    log::info!("session {id} opened");
    Json(status)
}

async fn close_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    match state.sessions().remove(&id) {
        Some(_) => {
            log::info!("session {id} closed");
            Ok(StatusCode::NO_CONTENT)
        }
        None => Err(ApiError::UnknownSession),
    }
}

async fn session_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionStatus>, ApiError> {
    state.with_session(id, |s| Ok(Json(SessionStatus::of(id, s))))
}

async fn login(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<EmailRequest>,
) -> Result<Json<SessionStatus>, ApiError> {
    let gate = Arc::clone(&state.primary);
    state.with_session(id, |s| {
        s.login(&gate, &req.email)?;
        Ok(Json(SessionStatus::of(id, s)))
    })
}

async fn logout(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionStatus>, ApiError> {
    state.with_session(id, |s| {
        s.logout();
        log::info!("session {id} logged out");
        Ok(Json(SessionStatus::of(id, s)))
    })
}

async fn select_view(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ViewRequest>,
) -> Result<Json<ViewResponse>, ApiError> {
    state.with_session(id, |s| {
        let outcome = s.select_view(req.view)?;
        Ok(Json(ViewResponse { outcome, status: SessionStatus::of(id, s) }))
    })
}

async fn agi_login(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<EmailRequest>,
) -> Result<Json<SessionStatus>, ApiError> {
    let gate = Arc::clone(&state.secondary);
    state.with_session(id, |s| {
        s.authorize_secondary(&gate, &req.email)?;
        Ok(Json(SessionStatus::of(id, s)))
    })
}

async fn dashboard(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(raw): Query<RawDashboardQuery>,
) -> Result<Json<DashboardView>, ApiError> {
    let query = DashboardQuery {
        entity: raw.entity,
        start:  parse_query_date(raw.start.as_deref())?,
        end:    parse_query_date(raw.end.as_deref())?,
    };
    // Snapshot the session so the workbook is read without holding the lock.
    let session = state.with_session(id, |s| Ok(s.clone()))?;
    let provider = Arc::clone(&state.provider);

    let view = tokio::task::spawn_blocking(move || {
        DashboardView::build(&session, provider.as_ref(), &query)
    })
    .await
    .map_err(|e| ApiError::Internal { message: format!("dashboard task failed: {e}") })??;
    Ok(Json(view))
}

/// Drop memoized sheets after the workbook has been replaced on disk.
async fn reload(State(state): State<AppState>) -> StatusCode {
    state.provider.invalidate();
    StatusCode::NO_CONTENT
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/reload", post(reload))
        .route("/api/sessions", post(open_session))
        .route("/api/sessions/:id", get(session_status).delete(close_session))
        .route("/api/sessions/:id/login", post(login))
        .route("/api/sessions/:id/logout", post(logout))
        .route("/api/sessions/:id/view", post(select_view))
        .route("/api/sessions/:id/agi-login", post(agi_login))
        .route("/api/sessions/:id/dashboard", get(dashboard))
        .with_state(state)
}
