//! Chat server.
//!
//! `POST /api/chat` runs the chat handler in its own task and relays its
//! events as server-sent events, one JSON object per `data:` line, followed
//! by `data: [DONE]`.

use crate::chat::ChatHandler;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::{personas, Settings};
use crate::message::{ChatRequest, StreamEvent};
use crate::session::DONE_MARKER;
use axum::{
    extract::State,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
    routing::{get, post},
    Json, Router,
};
use futures::stream::{self, Stream};
use futures::StreamExt;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

/// Events buffered between the handler task and the response body.
const EVENT_BUFFER: usize = 64;

/// Shared application state.
struct AppState {
    handler: ChatHandler,
}

/// Run the chat server.
pub async fn run_serve(
    host: Option<String>,
    port: Option<u16>,
    settings: Settings,
) -> anyhow::Result<()> {
    let credentials = match preflight::check(Operation::Serve, &settings) {
        Ok(Some(credentials)) => credentials,
        Ok(None) => anyhow::bail!("Missing credentials"),
        Err(e) => {
            Output::error(&format!("{}", e));
            Output::info("Run 'conjure doctor' for detailed diagnostics.");
            return Err(e.into());
        }
    };

    let handler = ChatHandler::from_settings(&settings, &credentials)?;
    let state = Arc::new(AppState { handler });

    let host = host.unwrap_or_else(|| settings.server.host.clone());
    let port = port.unwrap_or(settings.server.port);
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("Conjure Chat Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    Output::kv("Model", &settings.model.model);
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET  /health");
    Output::kv("Personas", "GET  /api/personas");
    Output::kv("Chat", "POST /api/chat (text/event-stream)");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, router(state)).await?;

    Ok(())
}

fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/personas", get(list_personas))
        .route("/api/chat", post(chat))
        .layer(cors)
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn list_personas() -> impl IntoResponse {
    Json(personas())
}

async fn chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!(
        "Chat request with {} message(s) for {}",
        request.messages.len(),
        request.professor.as_deref().unwrap_or("default persona")
    );

    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    tokio::spawn(async move {
        state.handler.handle(request, tx).await;
    });

    Sse::new(event_stream(ReceiverStream::new(rx))).keep_alive(KeepAlive::default())
}

/// Serialize handler events and terminate with the done marker.
fn event_stream<S>(events: S) -> impl Stream<Item = Result<Event, Infallible>>
where
    S: Stream<Item = StreamEvent> + Send + 'static,
{
    events
        .map(|event| Event::default().data(encode_event(&event)))
        .chain(stream::once(async { Event::default().data(DONE_MARKER) }))
        .map(Ok)
}

fn encode_event(event: &StreamEvent) -> String {
    serde_json::to_string(event).unwrap_or_else(|e| {
        serde_json::json!({ "type": "error", "errorText": e.to_string() }).to_string()
    })
}
