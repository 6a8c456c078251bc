pub mod error;
pub mod routes;
pub mod state;

use agent_core::config::AppConfig;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub use error::ApiError;
pub use state::AppState;

/// Build the axum Router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let output_dir = state.config.tools.output_dir.clone();
    let cors = state.config.server.cors;

    let mut app = Router::new()
        .merge(routes::health_routes())
        .merge(routes::session_routes())
        .merge(routes::run_routes())
        .nest_service("/output", ServeDir::new(output_dir))
        .with_state(state);

    app = app.layer(TraceLayer::new_for_http());

    if cors {
        app = app.layer(CorsLayer::permissive());
    }

    app
}

/// Start the HTTP server.
pub async fn serve(config: AppConfig) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::from_config(config)?;
    tracing::info!(
        app = %state.app_name(),
        model = %state.config.agent.model,
        tools = ?state.runner.agent().tools().list_names(),
        "Agent ready"
    );
    let router = build_router(state);

    tracing::info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::error::AgentError;
    use agent_core::model::{ModelBackend, ModelRequest, ModelTurn};
    use agent_core::session::SessionManager;
    use agent_core::tool_registry::ToolRegistry;
    use agent_core::types::FunctionCall;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use tower::ServiceExt;

    /// Plays back canned model turns in order.
    struct ScriptedModel {
        turns: Mutex<VecDeque<ModelTurn>>,
    }

    #[async_trait]
    impl ModelBackend for ScriptedModel {
        async fn generate(&self, _request: ModelRequest) -> Result<ModelTurn, AgentError> {
            self.turns
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| AgentError::Provider("model unavailable".into()))
        }
    }

    fn weather_call(city: &str) -> ModelTurn {
        ModelTurn::calls(vec![FunctionCall {
            id: "call-1".into(),
            name: "get_weather".into(),
            args: json!({ "city": city }),
        }])
    }

    fn test_router(turns: Vec<ModelTurn>) -> Router {
        let mut tools = ToolRegistry::new();
        tools.register(Arc::new(agent_tools::weather::WeatherTool)).unwrap();
        tools
            .register(Arc::new(agent_tools::preferences::SetTemperatureUnitTool))
            .unwrap();
        let model = Arc::new(ScriptedModel {
            turns: Mutex::new(turns.into()),
        });
        let state = AppState::new(AppConfig::default(), tools, SessionManager::in_memory(), model);
        build_router(state)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
        };
        (status, body)
    }

    fn run_body(session: &str, text: &str) -> Value {
        json!({
            "app_name": "multi_tools_agent",
            "user_id": "u1",
            "session_id": session,
            "new_message": { "role": "user", "parts": [{ "text": text }] }
        })
    }

    const SESSIONS: &str = "/apps/multi_tools_agent/users/u1/sessions";

    #[tokio::test]
    async fn test_health_and_agent_info() {
        let app = test_router(vec![]);
        let (status, body) = send(&app, get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "healthy" }));

        let (_, info) = send(&app, get("/agent-info")).await;
        assert_eq!(info["agent_name"], "support_info_agent");
        assert_eq!(info["model"], "gemini-2.5-flash");

        let (_, apps) = send(&app, get("/list-apps")).await;
        assert_eq!(apps, json!(["multi_tools_agent"]));
    }

    #[tokio::test]
    async fn test_create_session_then_duplicate_conflicts() {
        let app = test_router(vec![]);
        let (status, body) = send(&app, post_json(&format!("{SESSIONS}/s1"), json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], "s1");
        assert_eq!(body["state"], json!({}));

        let (status, body) = send(&app, post_json(&format!("{SESSIONS}/s1"), json!({}))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body["detail"].as_str().unwrap().contains("s1"));
    }

    #[tokio::test]
    async fn test_create_session_generates_id() {
        let app = test_router(vec![]);
        let (status, body) = send(&app, post_json(SESSIONS, json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert!(!body["id"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_app_is_not_found() {
        let app = test_router(vec![]);
        let (status, _) = send(&app, post_json("/apps/other/users/u1/sessions/s1", json!({}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_initial_state_and_get_delete() {
        let app = test_router(vec![]);
        let initial = json!({ "user_preference_temperature_unit": "Fahrenheit" });
        send(&app, post_json(&format!("{SESSIONS}/s1"), initial.clone())).await;

        let (status, body) = send(&app, get(&format!("{SESSIONS}/s1"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"], initial);

        let (_, list) = send(&app, get(SESSIONS)).await;
        assert_eq!(list.as_array().unwrap().len(), 1);

        let del = Request::builder()
            .method("DELETE")
            .uri(format!("{SESSIONS}/s1"))
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&app, del).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = send(&app, get(&format!("{SESSIONS}/s1"))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_run_unknown_session_is_404_with_detail() {
        let app = test_router(vec![ModelTurn::text("never used")]);
        let (status, body) = send(&app, post_json("/run", run_body("missing", "hi"))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["detail"].as_str().unwrap().contains("missing"));
    }

    #[tokio::test]
    async fn test_run_uses_session_preference() {
        let app = test_router(vec![weather_call("New York"), ModelTurn::text("It is 77°F in New York.")]);
        send(
            &app,
            post_json(
                &format!("{SESSIONS}/s1"),
                json!({ "user_preference_temperature_unit": "Fahrenheit" }),
            ),
        )
        .await;

        let (status, events) = send(&app, post_json("/run", run_body("s1", "weather in NY?"))).await;
        assert_eq!(status, StatusCode::OK);
        let events = events.as_array().unwrap();
        assert_eq!(events.len(), 3);

        let response = &events[1]["content"]["parts"][0]["functionResponse"];
        assert_eq!(response["name"], "get_weather");
        assert_eq!(response["response"]["status"], "success");
        assert_eq!(response["response"]["temperature"], json!(77));
        assert_eq!(events[2]["content"]["parts"][0]["text"], "It is 77°F in New York.");

        let (_, session) = send(&app, get(&format!("{SESSIONS}/s1"))).await;
        assert_eq!(session["state"]["last_city_checked"], "New York");
        // user event + three agent events
        assert_eq!(session["events"].as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_sessions_do_not_share_state() {
        let app = test_router(vec![
            ModelTurn::calls(vec![FunctionCall {
                id: "c".into(),
                name: "set_temperature_unit".into(),
                args: json!({ "unit": "Fahrenheit" }),
            }]),
            ModelTurn::text("Done."),
            weather_call("London"),
            ModelTurn::text("15°C"),
        ]);
        send(&app, post_json(&format!("{SESSIONS}/a"), json!({}))).await;
        send(&app, post_json(&format!("{SESSIONS}/b"), json!({}))).await;

        send(&app, post_json("/run", run_body("a", "use fahrenheit"))).await;
        let (_, events) = send(&app, post_json("/run", run_body("b", "weather in London"))).await;
        let response = &events[1]["content"]["parts"][0]["functionResponse"]["response"];
        assert_eq!(response["unit"], "Celsius");
        assert_eq!(response["temperature"], json!(15));

        let (_, a) = send(&app, get(&format!("{SESSIONS}/a"))).await;
        assert_eq!(a["state"]["user_preference_temperature_unit"], "Fahrenheit");
    }

    #[tokio::test]
    async fn test_model_failure_is_bad_gateway() {
        let app = test_router(vec![]);
        send(&app, post_json(&format!("{SESSIONS}/s1"), json!({}))).await;
        let (status, body) = send(&app, post_json("/run", run_body("s1", "hi"))).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body["detail"].as_str().unwrap().contains("model unavailable"));
    }

    #[tokio::test]
    async fn test_run_sse_streams_events() {
        let app = test_router(vec![ModelTurn::text("Hello there")]);
        send(&app, post_json(&format!("{SESSIONS}/s1"), json!({}))).await;

        let resp = app
            .clone()
            .oneshot(post_json("/run_sse", run_body("s1", "hi")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/event-stream"));
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("data: "));
        assert!(text.contains("Hello there"));
    }

    #[tokio::test]
    async fn test_run_sse_unknown_session_is_404() {
        let app = test_router(vec![]);
        let resp = app
            .clone()
            .oneshot(post_json("/run_sse", run_body("nope", "hi")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
