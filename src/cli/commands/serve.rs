//! HTTP API server for integration with other systems.
//!
//! Exposes the chat agent as `POST /predict` (buffered JSON) and
//! `POST /predict_stream` (Server-Sent Events, one `chunk` event per message).

use crate::agent::{validate_request, ChatAgentChunk, ChatAgentRequest, ChatAgentResponse};
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::error::AgentOpsError;
use crate::orchestrator::Orchestrator;
use crate::tools::ToolSpec;
use axum::{
    extract::State,
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures::StreamExt;
use serde::Serialize;
use std::convert::Infallible;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

/// Shared application state.
pub struct AppState {
    pub orchestrator: Orchestrator,
}

/// Run the HTTP API server.
pub async fn run_serve(
    host: Option<String>,
    port: Option<u16>,
    settings: Settings,
) -> anyhow::Result<()> {
    preflight::check(Operation::Ask, &settings)?;

    let addr = format!(
        "{}:{}",
        host.unwrap_or_else(|| settings.server.host.clone()),
        port.unwrap_or(settings.server.port)
    );
    let state = Arc::new(AppState {
        orchestrator: Orchestrator::new(settings)?,
    });
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("agentops API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET  /health");
    Output::kv("Tools", "GET  /tools");
    Output::kv("Predict", "POST /predict");
    Output::kv("Predict (SSE)", "POST /predict_stream");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    Ok(())
}

/// Build the API router.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/tools", get(list_tools))
        .route("/predict", post(predict))
        .route("/predict_stream", post(predict_stream))
        .layer(cors)
        .with_state(state)
}

// === Response Types ===

#[derive(Serialize)]
struct ToolsResponse {
    tools: Vec<ToolSpec>,
    total: usize,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Map an agent error to an HTTP status.
fn status_for(error: &AgentOpsError) -> StatusCode {
    match error {
        AgentOpsError::MalformedMessage(_) | AgentOpsError::InvalidInput(_) => {
            StatusCode::BAD_REQUEST
        }
        AgentOpsError::ModelUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        AgentOpsError::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(error: &AgentOpsError) -> Response {
    (
        status_for(error),
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
        .into_response()
}

// === Handlers ===

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn list_tools(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let tools = state.orchestrator.agent().tools();
    Json(ToolsResponse {
        total: tools.len(),
        tools,
    })
}

async fn predict(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatAgentRequest>,
) -> Response {
    let ChatAgentRequest {
        messages,
        context,
        custom_inputs,
    } = req;

    match state
        .orchestrator
        .agent()
        .predict(messages, context, custom_inputs)
        .await
    {
        Ok(response) => Json::<ChatAgentResponse>(response).into_response(),
        Err(e) => {
            warn!("Prediction failed: {}", e);
            error_response(&e)
        }
    }
}

async fn predict_stream(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatAgentRequest>,
) -> Response {
    // Reject bad input with a status code before the event stream opens
    if let Err(e) = validate_request(&req) {
        return error_response(&e);
    }
    info!("Streaming prediction for {} message(s)", req.messages.len());

    let events = async_stream::stream! {
        let ChatAgentRequest { messages, context, custom_inputs } = req;
        let mut chunks = state.orchestrator.agent().predict_stream(messages, context, custom_inputs);
        while let Some(chunk) = chunks.next().await {
            match chunk {
                Ok(chunk) => yield Ok::<_, Infallible>(chunk_event(&chunk)),
                Err(e) => {
                    warn!("Streaming prediction failed: {}", e);
                    yield Ok(error_event(&e));
                    break;
                }
            }
        }
    };

    Sse::new(events)
        .keep_alive(KeepAlive::default())
        .into_response()
}

fn chunk_event(chunk: &ChatAgentChunk) -> Event {
    match Event::default().event("chunk").json_data(chunk) {
        Ok(event) => event,
        Err(e) => error_event(&AgentOpsError::InvalidInput(e.to_string())),
    }
}

fn error_event(error: &AgentOpsError) -> Event {
    let body = serde_json::json!({
        "error": error.to_string(),
        "status": status_for(error).as_u16(),
    });
    Event::default().event("error").data(body.to_string())
}
