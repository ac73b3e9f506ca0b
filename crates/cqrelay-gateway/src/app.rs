use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    routing::{get, post},
    Router,
};
use tokio::sync::mpsc;

use cqrelay_agent::history::ConversationStore;
use cqrelay_agent::pipeline::MessageContext;
use cqrelay_agent::runtime::AgentRuntime;
use cqrelay_core::types::UserId;
use cqrelay_onebot::{OneBotSender, PrivateMessage};

/// Central shared state, passed as Arc<AppState> to handlers and workers.
pub struct AppState {
    pub agent: AgentRuntime,
    pub history: ConversationStore,
    pub sender: OneBotSender,
    /// Producer side of the bounded worker queue.
    pub queue: mpsc::Sender<PrivateMessage>,
}

impl AppState {
    pub fn new(
        agent: AgentRuntime,
        history: ConversationStore,
        sender: OneBotSender,
        queue: mpsc::Sender<PrivateMessage>,
    ) -> Self {
        Self {
            agent,
            history,
            sender,
            queue,
        }
    }
}

#[async_trait]
impl MessageContext for AppState {
    fn agent(&self) -> &AgentRuntime {
        &self.agent
    }

    fn history(&self) -> &ConversationStore {
        &self.history
    }

    async fn send_private(&self, user_id: &UserId, text: &str) -> Result<(), String> {
        self.sender
            .send_private_msg(user_id, text)
            .await
            .map_err(|e| e.to_string())
    }
}

/// Assemble the Axum router.
///
/// OneBot posts every event to `/`; any other method or path is still
/// acknowledged with 200 so the gateway never retries.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/",
            post(crate::http::event::event_handler).fallback(crate::http::event::acknowledge),
        )
        .route("/health", get(crate::http::health::health_handler))
        .fallback(crate::http::event::acknowledge)
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
