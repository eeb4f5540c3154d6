//! HTTP transport for the chat endpoint.

use crate::error::{ConjureError, Result};
use crate::message::{ChatRequest, StreamEvent};
use crate::providers::ensure_success;
use eventsource_stream::Eventsource;
use futures::stream::{BoxStream, Stream};
use futures::StreamExt;
use std::time::Duration;
use tracing::debug;

/// Data line that ends the event stream.
pub const DONE_MARKER: &str = "[DONE]";

/// Stream of decoded events for one response.
pub type EventStream = BoxStream<'static, Result<StreamEvent>>;

/// Talks to a running chat server.
#[derive(Debug, Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    base_url: String,
}

impl ChatClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check that the server answers `GET /health`.
    pub async fn health(&self) -> Result<()> {
        let response = self
            .http
            .get(format!("{}/health", self.base_url))
            .timeout(Duration::from_secs(5))
            .send()
            .await?;
        ensure_success(response, "Health check").await?;
        Ok(())
    }

    /// Send a chat request and stream the response events.
    pub async fn send(&self, request: &ChatRequest) -> Result<EventStream> {
        debug!(
            "Sending {} message(s) to {}/api/chat",
            request.messages.len(),
            self.base_url
        );

        let response = self
            .http
            .post(format!("{}/api/chat", self.base_url))
            .json(request)
            .send()
            .await?;
        let response = ensure_success(response, "Chat request").await?;

        Ok(decode_events(response.bytes_stream()))
    }
}

/// Decode a server-sent event byte stream, stopping at [`DONE_MARKER`].
pub fn decode_events<S, B, E>(bytes: S) -> EventStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    bytes
        .eventsource()
        .take_while(|item| {
            let done = matches!(item, Ok(event) if event.data.trim() == DONE_MARKER);
            futures::future::ready(!done)
        })
        .map(|item| match item {
            Ok(event) => parse_event(&event.data),
            Err(e) => Err(ConjureError::Stream(e.to_string())),
        })
        .boxed()
}

/// Parse the JSON payload of one event.
pub fn parse_event(data: &str) -> Result<StreamEvent> {
    Ok(serde_json::from_str(data)?)
}
