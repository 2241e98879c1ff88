mod chat;
mod extract;
mod http;
mod inventory;
mod llm;
mod metrics;
mod models;
mod prompt;
mod session;

use axum::{
    Json, Router,
    extract::State,
    http::{Method, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chat::{ChatConfig, ChatPipeline, TurnError, TurnErrorKind};
use inventory::Inventory;
use llm::{LlmConfig, OpenAiClient};
use models::{ChatRequest, RecommendationItem};
use serde_json::json;
use session::{SessionConfig, SessionStore};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        error!(target = "hungry.api", "server crashed: {err}");
    }
}

async fn run() -> eyre::Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let inventory = Arc::new(Inventory::builtin().clone());
    let system_prompt = prompt::build_system_prompt(&inventory);
    let sessions = Arc::new(SessionStore::new(system_prompt, SessionConfig::from_env()));
    if sessions.spawn_sweeper().is_some() {
        info!(target = "hungry.session", "idle session eviction enabled");
    }

    let llm = OpenAiClient::new(LlmConfig::from_env());
    if llm.config().api_key.is_none() {
        warn!(
            target = "hungry.llm",
            "OPENAI_API_KEY is not set; chat requests will fail upstream"
        );
    }
    info!(
        target = "hungry.llm",
        model = %llm.config().model,
        inventory = inventory.len(),
        "completion gateway configured"
    );

    let pipeline = ChatPipeline::new(sessions, Arc::new(llm), inventory, ChatConfig::from_env());
    let openapi: serde_json::Value = serde_yaml::from_str(include_str!("../docs/openapi.yaml"))
        .unwrap_or_else(|_| json!({"openapi": "3.0.3"}));
    let state = AppState {
        pipeline,
        openapi: Arc::new(openapi),
    };

    let app =
        build_router(state).layer(axum::extract::DefaultBodyLimit::max(body_limit_from_env()));

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(8080);
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    info!(target = "hungry.api", "listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

#[derive(Clone)]
struct AppState {
    pipeline: ChatPipeline,
    openapi: Arc<serde_json::Value>,
}

fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .max_age(Duration::from_secs(86_400));

    Router::new()
        .route("/health", get(health))
        .route("/openapi.json", get(openapi_json))
        .route("/chat", post(chat))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Liveness probe.
///
/// - Method: `GET`
/// - Path: `/health`
async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "hungry-api-rs",
    }))
}

async fn openapi_json(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json((*state.openapi).clone())
}

/// Run one conversational turn and return reconciled recommendations.
///
/// - Method: `POST`
/// - Path: `/chat`
/// - Body: `{"session_id": "...", "message": "..."}`
/// - Response: JSON array of recommendation items, no envelope
async fn chat(
    State(state): State<AppState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<Vec<RecommendationItem>>, AppError> {
    crate::metrics::inc_requests("/chat");
    let items = state.pipeline.run(payload).await?;
    Ok(Json(items))
}

fn body_limit_from_env() -> usize {
    std::env::var("REQUEST_MAX_BYTES")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(64 * 1024)
}

#[derive(Debug)]
enum AppError {
    Turn(TurnError),
}

impl From<TurnError> for AppError {
    fn from(value: TurnError) -> Self {
        Self::Turn(value)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Turn(err) => match err.kind() {
                TurnErrorKind::BadRequest => {
                    (StatusCode::BAD_REQUEST, err.detail().to_string()).into_response()
                }
                TurnErrorKind::Upstream => {
                    warn!(
                        target = "hungry.api",
                        stage = err.stage(),
                        error = %err.detail(),
                        "chat turn failed upstream"
                    );
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        format!("model error: {}", err.detail()),
                    )
                        .into_response()
                }
            },
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));
    let _ = fmt().with_env_filter(filter).try_init();
}
