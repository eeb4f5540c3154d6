//! Streaming chat model abstraction.
//!
//! The request handler talks to the model through [`ModelProvider`], which
//! yields a flat stream of [`ModelDelta`]s regardless of how the provider
//! batches them on the wire.

mod openai;

pub use openai::{create_client, OpenAiModel};

use crate::error::Result;
use async_openai::types::{ChatCompletionRequestMessage, ChatCompletionTool};
use async_trait::async_trait;
use futures::stream::BoxStream;

/// Everything needed to open one model turn.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    /// System instruction, sent ahead of the history.
    pub system: String,
    /// Conversation history, oldest first.
    pub messages: Vec<ChatCompletionRequestMessage>,
    /// Tools the model may call.
    pub tools: Vec<ChatCompletionTool>,
    /// Maximum output tokens for this turn.
    pub max_output_tokens: u32,
}

/// An incremental piece of a streamed model turn.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelDelta {
    /// Assistant text.
    Text(String),
    /// A fragment of a tool call. Fragments sharing an `index` belong to the
    /// same call; `arguments` fragments concatenate into a JSON document.
    ToolCallChunk {
        index: u32,
        id: Option<String>,
        name: Option<String>,
        arguments: Option<String>,
    },
}

/// Stream of deltas for one model turn.
pub type ModelStream = BoxStream<'static, Result<ModelDelta>>;

/// A chat model that streams its output.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Open a streaming turn.
    async fn stream(&self, request: ModelRequest) -> Result<ModelStream>;

    /// Model identifier, for logging.
    fn name(&self) -> &str;
}
