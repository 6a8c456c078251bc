use agent_core::error::AgentError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;

/// Error returned by route handlers. Renders as `{"detail": message}`.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Agent(AgentError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Agent(e) => match e {
                AgentError::SessionNotFound { .. } | AgentError::UnknownApp(_) | AgentError::ToolNotFound(_) => {
                    StatusCode::NOT_FOUND
                }
                AgentError::DuplicateSession { .. } => StatusCode::CONFLICT,
                AgentError::InvalidId(_)
                | AgentError::InvalidArguments { .. }
                | AgentError::Serialization(_) => StatusCode::BAD_REQUEST,
                AgentError::Provider(_) | AgentError::Http(_) => StatusCode::BAD_GATEWAY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl From<AgentError> for ApiError {
    fn from(err: AgentError) -> Self {
        ApiError::Agent(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = match self {
            ApiError::BadRequest(msg) => msg,
            ApiError::Agent(e) => e.to_string(),
        };
        if status.is_server_error() {
            tracing::error!("{}: {}", status, detail);
        } else {
            tracing::debug!("{}: {}", status, detail);
        }
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}
