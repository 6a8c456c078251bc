use crate::agent::Agent;
use crate::error::AgentError;
use crate::model::{ModelBackend, ModelRequest};
use crate::session::{SessionKey, SessionManager};
use crate::tool_registry::ToolContext;
use crate::types::{Content, Event, FunctionResponse, Part, Role};

use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, warn};
use uuid::Uuid;

/// Default number of model round-trips per user turn.
pub const DEFAULT_MAX_ITERATIONS: usize = 20;

/// Drives one user turn: model call, tool calls against the session's
/// state, and back to the model until it answers with text.
pub struct Runner {
    agent: Arc<Agent>,
    sessions: Arc<RwLock<SessionManager>>,
    model: Arc<dyn ModelBackend>,
    max_iterations: usize,
}

impl Runner {
    pub fn new(agent: Arc<Agent>, sessions: Arc<RwLock<SessionManager>>, model: Arc<dyn ModelBackend>) -> Self {
        Self {
            agent,
            sessions,
            model,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    pub fn agent(&self) -> &Arc<Agent> {
        &self.agent
    }

    pub fn sessions(&self) -> &Arc<RwLock<SessionManager>> {
        &self.sessions
    }

    /// Run one turn for `new_message` in the session identified by `key`.
    ///
    /// Returns the events produced by the agent (the user's own event is
    /// recorded in the session but not returned). When `event_tx` is given,
    /// each event is also sent there as soon as it is recorded.
    pub async fn run(
        &self,
        key: &SessionKey,
        new_message: Content,
        event_tx: Option<mpsc::UnboundedSender<Event>>,
    ) -> Result<Vec<Event>, AgentError> {
        let (state, turn_lock) = {
            let sm = self.sessions.read().await;
            let session = sm.require(key)?;
            (session.state.clone(), session.turn_lock())
        };
        let _turn = turn_lock.lock().await;

        let mut history: Vec<Content> = {
            let sm = self.sessions.read().await;
            sm.require(key)?
                .events
                .iter()
                .filter_map(|e| e.content.clone())
                .collect()
        };

        let invocation_id = format!("e-{}", Uuid::new_v4());
        self.record(key, Event::new(&invocation_id, "user", new_message.clone()))
            .await?;
        history.push(new_message);

        let ctx = ToolContext::new(state, &invocation_id);
        let mut produced = Vec::new();

        for iteration in 1..=self.max_iterations {
            debug!(session = %key.session_id, "Agent loop iteration {}", iteration);

            let turn = self
                .model
                .generate(ModelRequest {
                    model: self.agent.model.clone(),
                    instruction: self.agent.instruction.clone(),
                    history: history.clone(),
                    tools: self.agent.tools().schemas(),
                })
                .await?;

            if turn.function_calls.is_empty() {
                let content = Content::model_text(turn.text.unwrap_or_default());
                self.emit(key, &invocation_id, content, &mut produced, &event_tx)
                    .await?;
                return Ok(produced);
            }

            let mut parts = Vec::new();
            if let Some(text) = turn.text {
                parts.push(Part::text(text));
            }
            parts.extend(turn.function_calls.iter().cloned().map(Part::function_call));
            let call_content = Content {
                role: Role::Model,
                parts,
            };
            history.push(call_content.clone());
            self.emit(key, &invocation_id, call_content, &mut produced, &event_tx)
                .await?;

            for call in &turn.function_calls {
                debug!(tool = %call.name, args = %call.args, "invoking tool");
                let result = self.agent.tools().invoke(&call.name, call.args.clone(), &ctx).await;
                let response = Content {
                    role: Role::User,
                    parts: vec![Part::function_response(FunctionResponse {
                        id: call.id.clone(),
                        name: call.name.clone(),
                        response: result.to_value(),
                    })],
                };
                history.push(response.clone());
                self.emit(key, &invocation_id, response, &mut produced, &event_tx)
                    .await?;
            }
        }

        warn!("Hit max tool iterations ({}), ending turn", self.max_iterations);
        let fallback = Content::model_text("[Agent reached maximum tool iterations]");
        self.emit(key, &invocation_id, fallback, &mut produced, &event_tx)
            .await?;
        Ok(produced)
    }

    async fn record(&self, key: &SessionKey, event: Event) -> Result<(), AgentError> {
        self.sessions.write().await.append_event(key, event).await
    }

    async fn emit(
        &self,
        key: &SessionKey,
        invocation_id: &str,
        content: Content,
        produced: &mut Vec<Event>,
        event_tx: &Option<mpsc::UnboundedSender<Event>>,
    ) -> Result<(), AgentError> {
        let event = Event::new(invocation_id, &self.agent.name, content);
        self.record(key, event.clone()).await?;
        if let Some(tx) = event_tx {
            let _ = tx.send(event.clone());
        }
        produced.push(event);
        Ok(())
    }
}
