use crate::extract::extract_recommendations;
use crate::inventory::Inventory;
use crate::llm::{CompletionGateway, LlmError};
use crate::models::{ChatRequest, ConversationTurn, RecommendationItem};
use crate::session::SessionStore;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Upper bound on a single model invocation.
    pub model_timeout: Duration,
}

impl ChatConfig {
    pub fn from_env() -> Self {
        let secs = std::env::var("CHAT_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(20);
        Self {
            model_timeout: Duration::from_secs(secs),
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            model_timeout: Duration::from_secs(20),
        }
    }
}

/// Progress of one request through the turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnStage {
    Received,
    SessionResolved,
    ModelInvoked,
    Validated,
    Persisted,
    Responded,
}

impl TurnStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnStage::Received => "received",
            TurnStage::SessionResolved => "session_resolved",
            TurnStage::ModelInvoked => "model_invoked",
            TurnStage::Validated => "validated",
            TurnStage::Persisted => "persisted",
            TurnStage::Responded => "responded",
        }
    }
}

#[derive(Debug, Error)]
#[error("stage `{stage}` failed: {message}")]
pub struct TurnError {
    stage: &'static str,
    message: String,
    kind: TurnErrorKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnErrorKind {
    BadRequest,
    Upstream,
}

impl TurnError {
    pub fn bad_request(stage: &'static str, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
            kind: TurnErrorKind::BadRequest,
        }
    }

    pub fn upstream(stage: &'static str, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
            kind: TurnErrorKind::Upstream,
        }
    }

    pub fn stage(&self) -> &'static str {
        self.stage
    }

    pub fn kind(&self) -> TurnErrorKind {
        self.kind
    }

    pub fn detail(&self) -> &str {
        &self.message
    }
}

/// Drives one chat turn: session lookup, model call, validation and
/// transcript update. Cheap to clone; all state sits behind `Arc`s.
#[derive(Clone)]
pub struct ChatPipeline {
    sessions: Arc<SessionStore>,
    gateway: Arc<dyn CompletionGateway>,
    inventory: Arc<Inventory>,
    config: ChatConfig,
}

impl ChatPipeline {
    pub fn new(
        sessions: Arc<SessionStore>,
        gateway: Arc<dyn CompletionGateway>,
        inventory: Arc<Inventory>,
        config: ChatConfig,
    ) -> Self {
        Self {
            sessions,
            gateway,
            inventory,
            config,
        }
    }

    #[allow(dead_code)]
    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub async fn run(&self, request: ChatRequest) -> Result<Vec<RecommendationItem>, TurnError> {
        let request_id = Uuid::new_v4();
        let mut tracker = StageTracker::new(request_id);

        if request.session_id.is_empty() || request.message.is_empty() {
            return Err(TurnError::bad_request(
                "validate_request",
                "session_id and message required",
            ));
        }

        // Held until the turn ends so idle eviction cannot drop the session
        // while the model call is outstanding.
        let session = self.sessions.begin_turn(&request.session_id);
        tracker.advance(TurnStage::SessionResolved);

        // The user turn is only persisted together with a validated answer,
        // so a failed turn leaves the transcript untouched.
        let user_turn = ConversationTurn::User(request.message);
        let mut transcript = session.snapshot().await;
        transcript.push(user_turn.clone());

        let raw = self.invoke_model(&transcript).await?;
        tracker.advance(TurnStage::ModelInvoked);
        debug!(
            target = "hungry.chat",
            %request_id,
            session_id = session.id(),
            raw = %raw,
            "model_output"
        );

        let items = extract_recommendations(&raw, &self.inventory)
            .map_err(|err| TurnError::upstream("validate_output", err.to_string()))?;
        tracker.advance(TurnStage::Validated);

        let serialized = serde_json::to_string(&items)
            .map_err(|err| TurnError::upstream("persist", err.to_string()))?;
        session
            .append_turns([user_turn, ConversationTurn::Assistant(serialized)])
            .await;
        tracker.advance(TurnStage::Persisted);

        tracker.advance(TurnStage::Responded);
        info!(
            target = "hungry.chat",
            %request_id,
            session_id = session.id(),
            items = items.len(),
            resolved = items.iter().filter(|item| item.is_resolved()).count(),
            elapsed_ms = tracker.total_ms() as u64,
            "turn_completed"
        );
        Ok(items)
    }

    async fn invoke_model(&self, transcript: &[ConversationTurn]) -> Result<String, TurnError> {
        let timeout = self.config.model_timeout;
        let outcome = tokio::time::timeout(timeout, self.gateway.complete(transcript))
            .await
            .unwrap_or(Err(LlmError::Timeout(timeout.as_secs())));
        outcome.map_err(|err| TurnError::upstream("invoke_model", err.to_string()))
    }
}

struct StageTracker {
    request_id: Uuid,
    stage: TurnStage,
    started: Instant,
    last: Instant,
}

impl StageTracker {
    fn new(request_id: Uuid) -> Self {
        let now = Instant::now();
        Self {
            request_id,
            stage: TurnStage::Received,
            started: now,
            last: now,
        }
    }

    fn advance(&mut self, next: TurnStage) {
        let elapsed_ms = self.last.elapsed().as_millis();
        crate::metrics::stage_elapsed(next.as_str(), elapsed_ms);
        debug!(
            target = "hungry.chat",
            request_id = %self.request_id,
            from = self.stage.as_str(),
            to = next.as_str(),
            elapsed_ms = elapsed_ms as u64,
            "turn_stage"
        );
        self.stage = next;
        self.last = Instant::now();
    }

    fn total_ms(&self) -> u128 {
        self.started.elapsed().as_millis()
    }
}
