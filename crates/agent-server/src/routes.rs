use crate::error::ApiError;
use crate::state::AppState;
use agent_core::error::AgentError;
use agent_core::session::{Session, SessionKey};
use agent_core::types::{object_or_empty, Event, NewMessage};
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use futures::stream;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt;

// ── Health / info ───────────────────────────────────────────────────────

pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/agent-info", get(agent_info))
        .route("/list-apps", get(list_apps))
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "healthy" }))
}

async fn agent_info(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.runner.agent().info())
}

async fn list_apps(State(state): State<AppState>) -> impl IntoResponse {
    Json(vec![state.app_name().to_string()])
}

// ── Sessions ────────────────────────────────────────────────────────────

pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/apps/{app}/users/{user}/sessions",
            get(list_sessions).post(create_session_generated),
        )
        .route(
            "/apps/{app}/users/{user}/sessions/{session}",
            get(get_session).post(create_session).delete(delete_session),
        )
}

fn ensure_app(state: &AppState, app: &str) -> Result<(), ApiError> {
    if app == state.app_name() {
        Ok(())
    } else {
        Err(AgentError::UnknownApp(app.to_string()).into())
    }
}

/// Optional initial state: an empty body or `null` means none.
fn initial_state(body: &Bytes) -> Result<Map<String, Value>, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid JSON body: {}", e)))?;
    // Accept both a bare state object and `{"state": {...}}`.
    let value = match value {
        Value::Object(mut map) if map.len() == 1 && map.contains_key("state") => {
            map.remove("state").unwrap_or(Value::Null)
        }
        other => other,
    };
    object_or_empty(value).ok_or_else(|| ApiError::BadRequest("Initial state must be a JSON object".into()))
}

async fn create(
    state: &AppState,
    app: &str,
    user: &str,
    session_id: Option<String>,
    body: &Bytes,
) -> Result<Json<Session>, ApiError> {
    ensure_app(state, app)?;
    let initial = initial_state(body)?;
    let mut sm = state.sessions.write().await;
    let session = sm.create(app, user, session_id, initial).await?;
    Ok(Json(session))
}

async fn create_session(
    State(state): State<AppState>,
    Path((app, user, session)): Path<(String, String, String)>,
    body: Bytes,
) -> Result<Json<Session>, ApiError> {
    create(&state, &app, &user, Some(session), &body).await
}

async fn create_session_generated(
    State(state): State<AppState>,
    Path((app, user)): Path<(String, String)>,
    body: Bytes,
) -> Result<Json<Session>, ApiError> {
    create(&state, &app, &user, None, &body).await
}

async fn list_sessions(
    State(state): State<AppState>,
    Path((app, user)): Path<(String, String)>,
) -> Result<Json<Vec<Session>>, ApiError> {
    ensure_app(&state, &app)?;
    let sm = state.sessions.read().await;
    Ok(Json(sm.list(&app, &user).into_iter().cloned().collect()))
}

async fn get_session(
    State(state): State<AppState>,
    Path((app, user, session)): Path<(String, String, String)>,
) -> Result<Json<Session>, ApiError> {
    ensure_app(&state, &app)?;
    let sm = state.sessions.read().await;
    let session = sm.require(&SessionKey::new(app, user, session))?;
    Ok(Json(session.clone()))
}

async fn delete_session(
    State(state): State<AppState>,
    Path((app, user, session)): Path<(String, String, String)>,
) -> Result<StatusCode, ApiError> {
    ensure_app(&state, &app)?;
    let mut sm = state.sessions.write().await;
    sm.delete(&SessionKey::new(app, user, session)).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── Turns ───────────────────────────────────────────────────────────────

pub fn run_routes() -> Router<AppState> {
    Router::new()
        .route("/run", post(run))
        .route("/run_sse", post(run_sse))
}

#[derive(Debug, Deserialize)]
pub struct RunRequest {
    #[serde(alias = "appName")]
    pub app_name: String,
    #[serde(alias = "userId")]
    pub user_id: String,
    #[serde(alias = "sessionId")]
    pub session_id: String,
    #[serde(alias = "newMessage")]
    pub new_message: NewMessage,
}

impl RunRequest {
    fn key(&self) -> SessionKey {
        SessionKey::new(&self.app_name, &self.user_id, &self.session_id)
    }
}

async fn run(
    State(state): State<AppState>,
    Json(req): Json<RunRequest>,
) -> Result<Json<Vec<Event>>, ApiError> {
    ensure_app(&state, &req.app_name)?;
    let key = req.key();
    let events = state
        .runner
        .run(&key, req.new_message.into_content(), None)
        .await?;
    Ok(Json(events))
}

async fn run_sse(
    State(state): State<AppState>,
    Json(req): Json<RunRequest>,
) -> Result<impl IntoResponse, ApiError> {
    ensure_app(&state, &req.app_name)?;
    let key = req.key();
    // Fail fast with a status code rather than an in-stream error.
    state.sessions.read().await.require(&key)?;

    let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<Event>();
    let (done_tx, done_rx) = tokio::sync::oneshot::channel::<Option<String>>();

    let runner = state.runner.clone();
    let content = req.new_message.into_content();
    tokio::spawn(async move {
        let outcome = runner.run(&key, content, Some(tx)).await;
        if let Err(e) = &outcome {
            tracing::warn!("Streaming turn failed: {}", e);
        }
        let _ = done_tx.send(outcome.err().map(|e| e.to_string()));
    });

    let events = UnboundedReceiverStream::new(rx).map(|event| SseEvent::default().json_data(&event));
    let failure = stream::once(done_rx).filter_map(|outcome| match outcome {
        Ok(Some(detail)) => Some(
            SseEvent::default()
                .event("error")
                .json_data(json!({ "detail": detail })),
        ),
        _ => None,
    });

    Ok(Sse::new(events.chain(failure)).keep_alive(KeepAlive::default()))
}
