use crate::error::AgentError;
use crate::state::StateStore;
use crate::types::Event;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs as async_fs;
use tokio::sync::Mutex;
use url::Url;
use uuid::Uuid;

/// Identity of a session: (application name, user id, session id).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub app_name: String,
    pub user_id: String,
    pub session_id: String,
}

impl SessionKey {
    pub fn new(app_name: impl Into<String>, user_id: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            user_id: user_id.into(),
            session_id: session_id.into(),
        }
    }

    fn not_found(&self) -> AgentError {
        AgentError::SessionNotFound {
            app_name: self.app_name.clone(),
            user_id: self.user_id.clone(),
            session_id: self.session_id.clone(),
        }
    }
}

/// A single conversation scope owning one [`StateStore`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub app_name: String,
    pub user_id: String,
    pub state: StateStore,
    #[serde(default)]
    pub events: Vec<Event>,
    pub last_update_time: DateTime<Utc>,
    /// Serializes turns posted to the same session.
    #[serde(skip)]
    turn_lock: Arc<Mutex<()>>,
}

impl Session {
    fn new(key: &SessionKey, initial_state: Map<String, Value>) -> Self {
        Self {
            id: key.session_id.clone(),
            app_name: key.app_name.clone(),
            user_id: key.user_id.clone(),
            state: StateStore::with_values(initial_state),
            events: Vec::new(),
            last_update_time: Utc::now(),
            turn_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn key(&self) -> SessionKey {
        SessionKey::new(&self.app_name, &self.user_id, &self.id)
    }

    /// Lock held by the runner for the duration of one turn.
    pub fn turn_lock(&self) -> Arc<Mutex<()>> {
        self.turn_lock.clone()
    }

    /// Persist this session to disk as JSON (async / non-blocking).
    pub async fn save_to_async(&self, dir: &Path) -> Result<(), AgentError> {
        let path = session_path(dir, &self.key());
        if let Some(parent) = path.parent() {
            async_fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(self)?;
        async_fs::write(path, json).await?;
        Ok(())
    }

    /// Load a session from a JSON file.
    pub fn load_from(path: &Path) -> Result<Self, AgentError> {
        let json = std::fs::read_to_string(path)?;
        let session: Self = serde_json::from_str(&json)?;
        Ok(session)
    }
}

/// Where sessions live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionBackend {
    /// Process memory only; lost on restart.
    Memory,
    /// One JSON file per session under `<dir>/<app>/<user>/<session>.json`.
    JsonDir(PathBuf),
}

impl SessionBackend {
    /// Resolve a `SESSION_SERVICE_URI` value. `None` and `memory://` select
    /// the in-memory backend, `file:///path` a JSON directory.
    pub fn from_uri(uri: Option<&str>) -> Result<Self, AgentError> {
        let Some(uri) = uri else {
            return Ok(SessionBackend::Memory);
        };
        let parsed = Url::parse(uri)
            .map_err(|e| AgentError::Config(format!("Invalid session service URI '{}': {}", uri, e)))?;
        match parsed.scheme() {
            "memory" => Ok(SessionBackend::Memory),
            "file" => {
                let dir = parsed.to_file_path().map_err(|_| {
                    AgentError::Config(format!("Session service URI '{}' is not a local path", uri))
                })?;
                Ok(SessionBackend::JsonDir(dir))
            }
            other => Err(AgentError::Config(format!(
                "Unsupported session service scheme '{}' (expected memory:// or file://)",
                other
            ))),
        }
    }
}

fn session_path(dir: &Path, key: &SessionKey) -> PathBuf {
    dir.join(&key.app_name)
        .join(&key.user_id)
        .join(format!("{}.json", key.session_id))
}

fn validate_id(id: &str) -> Result<(), AgentError> {
    let ok = !id.is_empty()
        && id != "."
        && id != ".."
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '@'));
    if ok {
        Ok(())
    } else {
        Err(AgentError::InvalidId(id.to_string()))
    }
}

/// Creates, looks up, and persists sessions.
pub struct SessionManager {
    sessions: HashMap<SessionKey, Session>,
    backend: SessionBackend,
}

impl SessionManager {
    /// Create a session manager. A `JsonDir` backend loads existing sessions from disk.
    pub fn new(backend: SessionBackend) -> Result<Self, AgentError> {
        let mut manager = Self {
            sessions: HashMap::new(),
            backend,
        };
        match &manager.backend {
            SessionBackend::Memory => {
                tracing::warn!(
                    "Using in-memory session service. All sessions will be lost when the server restarts."
                );
            }
            SessionBackend::JsonDir(dir) => {
                std::fs::create_dir_all(dir)?;
                let dir = dir.clone();
                manager.load_all(&dir)?;
                tracing::info!("Loaded {} sessions from {}", manager.sessions.len(), dir.display());
            }
        }
        Ok(manager)
    }

    pub fn in_memory() -> Self {
        Self {
            sessions: HashMap::new(),
            backend: SessionBackend::Memory,
        }
    }

    /// Build from a `SESSION_SERVICE_URI` value.
    pub fn from_uri(uri: Option<&str>) -> Result<Self, AgentError> {
        Self::new(SessionBackend::from_uri(uri)?)
    }

    /// Load every `<app>/<user>/<session>.json` under `dir`.
    fn load_all(&mut self, dir: &Path) -> Result<(), AgentError> {
        for app in std::fs::read_dir(dir)? {
            let app = app?.path();
            if !app.is_dir() {
                continue;
            }
            for user in std::fs::read_dir(&app)? {
                let user = user?.path();
                if !user.is_dir() {
                    continue;
                }
                for entry in std::fs::read_dir(&user)? {
                    let path = entry?.path();
                    if path.extension().and_then(|e| e.to_str()) != Some("json") {
                        continue;
                    }
                    match Session::load_from(&path) {
                        Ok(session) => {
                            self.sessions.insert(session.key(), session);
                        }
                        Err(e) => {
                            tracing::warn!("Failed to load session from {:?}: {}", path, e);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    pub fn backend(&self) -> &SessionBackend {
        &self.backend
    }

    /// Create a session with a fresh state store.
    ///
    /// A `None` session id gets a generated UUID. An id that already exists
    /// for (app, user) is rejected with [`AgentError::DuplicateSession`].
    pub async fn create(
        &mut self,
        app_name: &str,
        user_id: &str,
        session_id: Option<String>,
        initial_state: Map<String, Value>,
    ) -> Result<Session, AgentError> {
        let session_id = session_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        validate_id(app_name)?;
        validate_id(user_id)?;
        validate_id(&session_id)?;

        let key = SessionKey::new(app_name, user_id, session_id);
        if self.sessions.contains_key(&key) {
            return Err(AgentError::DuplicateSession {
                app_name: key.app_name,
                user_id: key.user_id,
                session_id: key.session_id,
            });
        }

        let session = Session::new(&key, initial_state);
        self.persist_session(&session).await?;
        tracing::info!(
            app = %key.app_name,
            user = %key.user_id,
            session = %key.session_id,
            "Created session"
        );
        self.sessions.insert(key, session.clone());
        Ok(session)
    }

    /// Look up a session.
    pub fn get(&self, key: &SessionKey) -> Option<&Session> {
        self.sessions.get(key)
    }

    /// Look up a session, failing with [`AgentError::SessionNotFound`].
    pub fn require(&self, key: &SessionKey) -> Result<&Session, AgentError> {
        self.sessions.get(key).ok_or_else(|| key.not_found())
    }

    /// Sessions of one user in one app, most recently updated first.
    pub fn list(&self, app_name: &str, user_id: &str) -> Vec<&Session> {
        let mut list: Vec<&Session> = self
            .sessions
            .values()
            .filter(|s| s.app_name == app_name && s.user_id == user_id)
            .collect();
        list.sort_by(|a, b| b.last_update_time.cmp(&a.last_update_time));
        list
    }

    /// Delete a session and its persisted file.
    pub async fn delete(&mut self, key: &SessionKey) -> Result<(), AgentError> {
        if self.sessions.remove(key).is_none() {
            return Err(key.not_found());
        }
        if let SessionBackend::JsonDir(dir) = &self.backend {
            let path = session_path(dir, key);
            if async_fs::try_exists(&path).await.unwrap_or(false) {
                async_fs::remove_file(path).await?;
            }
        }
        tracing::info!(session = %key.session_id, "Deleted session");
        Ok(())
    }

    /// Append an event to a session's history and persist it.
    pub async fn append_event(&mut self, key: &SessionKey, event: Event) -> Result<(), AgentError> {
        {
            let session = self.sessions.get_mut(key).ok_or_else(|| key.not_found())?;
            session.events.push(event);
            session.last_update_time = Utc::now();
        }
        self.persist(key).await
    }

    /// Persist a session's current events and state. No-op in memory mode.
    pub async fn persist(&self, key: &SessionKey) -> Result<(), AgentError> {
        let session = self.require(key)?;
        self.persist_session(session).await
    }

    async fn persist_session(&self, session: &Session) -> Result<(), AgentError> {
        match &self.backend {
            SessionBackend::Memory => Ok(()),
            SessionBackend::JsonDir(dir) => session.save_to_async(dir).await,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
