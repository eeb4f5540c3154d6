//! Request handler: one streamed assistant response per chat request.

use super::convert::{to_provider_messages, tool_call, tool_message};
use crate::config::{persona, Credentials, ModelSettings, Prompts, Settings};
use crate::error::{ConjureError, Result};
use crate::message::{ChatRequest, StreamEvent};
use crate::model::{ModelDelta, ModelProvider, ModelRequest, OpenAiModel};
use crate::tools::{ToolDispatch, ToolRegistry};
use async_openai::types::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage, ChatCompletionTool,
};
use futures::StreamExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Per-request limits.
#[derive(Debug, Clone, Copy)]
pub struct HandlerLimits {
    /// Maximum model turns per request.
    pub max_steps: usize,
    /// Extra attempts for a turn that fails before anything was relayed.
    pub max_retries: usize,
    pub max_output_tokens: u32,
}

impl Default for HandlerLimits {
    fn default() -> Self {
        Self::from(&ModelSettings::default())
    }
}

impl From<&ModelSettings> for HandlerLimits {
    fn from(settings: &ModelSettings) -> Self {
        Self {
            max_steps: settings.max_steps,
            max_retries: settings.max_retries,
            max_output_tokens: settings.max_output_tokens,
        }
    }
}

/// A tool call assembled from streamed chunks.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct PendingCall {
    index: u32,
    pub id: String,
    pub name: String,
    pub arguments: String,
}

impl PendingCall {
    /// Parsed arguments. An empty argument string is an empty object.
    fn input(&self) -> std::result::Result<Value, String> {
        if self.arguments.trim().is_empty() {
            return Ok(json!({}));
        }
        serde_json::from_str(&self.arguments)
            .map_err(|e| format!("{}: malformed arguments: {}", self.name, e))
    }
}

/// Groups tool-call chunks by index.
///
/// A chunk carrying an id different from the open call at its index starts a
/// new call, which covers providers that reuse index 0 for parallel calls.
#[derive(Debug, Default)]
pub(crate) struct ToolCallAccumulator {
    calls: Vec<PendingCall>,
}

impl ToolCallAccumulator {
    pub fn push(
        &mut self,
        index: u32,
        id: Option<String>,
        name: Option<String>,
        arguments: Option<String>,
    ) {
        let open = self.calls.iter().rposition(|c| c.index == index);
        let starts_new = match (open, &id) {
            (None, _) => true,
            (Some(pos), Some(id)) => !self.calls[pos].id.is_empty() && self.calls[pos].id != *id,
            (Some(_), None) => false,
        };

        if starts_new {
            self.calls.push(PendingCall {
                index,
                ..Default::default()
            });
        }
        let Some(call) = self.calls.iter_mut().rev().find(|c| c.index == index) else {
            return;
        };

        if let Some(id) = id {
            call.id = id;
        }
        if let Some(name) = name {
            if call.name.is_empty() {
                call.name = name;
            }
        }
        if let Some(arguments) = arguments {
            call.arguments.push_str(&arguments);
        }
    }

    /// Finished calls in arrival order. Calls without an id get a generated one.
    pub fn finish(self) -> Vec<PendingCall> {
        self.calls
            .into_iter()
            .filter(|c| !c.name.is_empty())
            .map(|mut c| {
                if c.id.is_empty() {
                    c.id = format!("call_{}", uuid::Uuid::new_v4().simple());
                }
                c
            })
            .collect()
    }
}

/// Output of one model turn.
#[derive(Debug, Default)]
struct Turn {
    text: String,
    calls: Vec<PendingCall>,
}

/// A failed turn and whether any of it reached the client.
struct TurnFailure {
    relayed: bool,
    error: ConjureError,
}

/// Runs the model/tool loop for a chat request and streams events.
pub struct ChatHandler {
    model: Arc<dyn ModelProvider>,
    tools: ToolRegistry,
    prompts: Prompts,
    limits: HandlerLimits,
}

impl ChatHandler {
    pub fn new(
        model: Arc<dyn ModelProvider>,
        tools: ToolRegistry,
        prompts: Prompts,
        limits: HandlerLimits,
    ) -> Self {
        Self {
            model,
            tools,
            prompts,
            limits,
        }
    }

    /// Build a handler with the configured model, standard tools and prompts.
    pub fn from_settings(settings: &Settings, credentials: &Credentials) -> Result<Self> {
        let model = OpenAiModel::from_settings(&settings.model, &credentials.model)?;
        let tools = ToolRegistry::standard(settings, credentials)?;
        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;

        info!(
            "Chat handler ready with model {} and {} tools",
            model.name(),
            tools.definitions().len()
        );

        Ok(Self::new(
            Arc::new(model),
            tools,
            prompts,
            HandlerLimits::from(&settings.model),
        ))
    }

    /// Handle one request, sending events until `finish` or `error`.
    ///
    /// Returns early without a terminal event when the receiver is gone.
    pub async fn handle(&self, request: ChatRequest, events: mpsc::Sender<StreamEvent>) {
        let terminal = match self.run(request, &events).await {
            Ok(()) => StreamEvent::Finish,
            Err(ConjureError::Stream(msg)) => {
                debug!("Stopping response: {}", msg);
                return;
            }
            Err(e) => {
                error!("Chat request failed: {}", e);
                StreamEvent::Error {
                    error_text: e.to_string(),
                }
            }
        };
        let _ = events.send(terminal).await;
    }

    async fn run(&self, request: ChatRequest, events: &mpsc::Sender<StreamEvent>) -> Result<()> {
        let persona = persona(request.professor.as_deref());
        let system = self.prompts.system_prompt(persona);
        let mut history = to_provider_messages(&request.messages)?;
        let tools = self.tools.openai_tools();

        emit(
            events,
            StreamEvent::Start {
                message_id: uuid::Uuid::new_v4().to_string(),
            },
        )
        .await?;

        let mut step = 0;
        let mut produced_media = false;

        while step < self.limits.max_steps {
            step += 1;

            let turn = self.stream_turn(&system, &history, &tools, events).await?;
            if turn.calls.is_empty() {
                emit(events, StreamEvent::FinishStep { step }).await?;
                info!("Step {} finished without tool calls", step);
                break;
            }

            let (media, handed_to_client) = self
                .run_tools(turn, &mut history, events)
                .await?;
            produced_media |= media;

            emit(events, StreamEvent::FinishStep { step }).await?;
            info!("Step {} finished", step);

            if handed_to_client {
                debug!("Client-resolved tool call ends the response");
                break;
            }
            if step == self.limits.max_steps {
                warn!("Step budget of {} exhausted", self.limits.max_steps);
            }
        }

        info!(
            "Response finished for {} after {} step(s) (media: {})",
            persona.name, step, produced_media
        );
        Ok(())
    }

    /// Open a turn, retrying when it fails before anything was relayed.
    async fn stream_turn(
        &self,
        system: &str,
        history: &[ChatCompletionRequestMessage],
        tools: &[ChatCompletionTool],
        events: &mpsc::Sender<StreamEvent>,
    ) -> Result<Turn> {
        let mut attempt = 0;
        loop {
            let request = ModelRequest {
                system: system.to_string(),
                messages: history.to_vec(),
                tools: tools.to_vec(),
                max_output_tokens: self.limits.max_output_tokens,
            };

            match self.try_turn(request, events).await {
                Ok(turn) => return Ok(turn),
                Err(failure) => {
                    let retryable = !failure.relayed
                        && !matches!(failure.error, ConjureError::Stream(_))
                        && attempt < self.limits.max_retries;
                    if !retryable {
                        return Err(failure.error);
                    }
                    attempt += 1;
                    warn!(
                        "Model turn failed, retrying ({}/{}): {}",
                        attempt, self.limits.max_retries, failure.error
                    );
                }
            }
        }
    }

    async fn try_turn(
        &self,
        request: ModelRequest,
        events: &mpsc::Sender<StreamEvent>,
    ) -> std::result::Result<Turn, TurnFailure> {
        let mut relayed = false;
        let fail = |relayed: bool| move |error: ConjureError| TurnFailure { relayed, error };

        let mut stream = self.model.stream(request).await.map_err(fail(false))?;
        let mut turn = Turn::default();
        let mut calls = ToolCallAccumulator::default();

        while let Some(delta) = stream.next().await {
            match delta.map_err(fail(relayed))? {
                ModelDelta::Text(delta) => {
                    turn.text.push_str(&delta);
                    emit(events, StreamEvent::TextDelta { delta })
                        .await
                        .map_err(fail(relayed))?;
                    relayed = true;
                }
                ModelDelta::ToolCallChunk {
                    index,
                    id,
                    name,
                    arguments,
                } => calls.push(index, id, name, arguments),
            }
        }

        turn.calls = calls.finish();
        Ok(turn)
    }

    /// Announce and run a turn's tool calls, appending them to `history`.
    ///
    /// Returns whether media was produced and whether any call was handed to
    /// the client.
    async fn run_tools(
        &self,
        turn: Turn,
        history: &mut Vec<ChatCompletionRequestMessage>,
        events: &mpsc::Sender<StreamEvent>,
    ) -> Result<(bool, bool)> {
        let inputs: Vec<_> = turn.calls.iter().map(PendingCall::input).collect();

        for (call, input) in turn.calls.iter().zip(&inputs) {
            emit(
                events,
                StreamEvent::ToolCall {
                    tool_call_id: call.id.clone(),
                    tool_name: call.name.clone(),
                    input: input.clone().unwrap_or(Value::Null),
                    client_resolved: self.tools.is_client_resolved(&call.name),
                },
            )
            .await?;
        }

        let mut assistant = ChatCompletionRequestAssistantMessageArgs::default();
        if !turn.text.is_empty() {
            assistant.content(turn.text.clone());
        }
        assistant.tool_calls(
            turn.calls
                .iter()
                .zip(&inputs)
                .map(|(call, input)| {
                    tool_call(&call.id, &call.name, input.as_ref().unwrap_or(&json!({})))
                })
                .collect::<Vec<_>>(),
        );
        history.push(
            assistant
                .build()
                .map_err(|e| ConjureError::Model(e.to_string()))?
                .into(),
        );

        let outcomes = futures::future::join_all(turn.calls.iter().zip(&inputs).map(
            |(call, input)| async move {
                match input {
                    Ok(input) => self.tools.dispatch(&call.name, input.clone()).await,
                    Err(msg) => ToolDispatch::InvalidInput(msg.clone()),
                }
            },
        ))
        .await;

        let mut produced_media = false;
        let mut handed_to_client = false;

        for (call, outcome) in turn.calls.iter().zip(outcomes) {
            let content = match outcome {
                ToolDispatch::Output(output) => {
                    produced_media |= is_media(&output);
                    let content = output.to_string();
                    emit(
                        events,
                        StreamEvent::ToolResult {
                            tool_call_id: call.id.clone(),
                            tool_name: call.name.clone(),
                            output,
                        },
                    )
                    .await?;
                    content
                }
                ToolDispatch::InvalidInput(msg) => {
                    self.tool_error(events, call, msg.clone()).await?;
                    json!({ "error": msg }).to_string()
                }
                ToolDispatch::Unknown => {
                    let msg = format!("Unknown tool: {}", call.name);
                    self.tool_error(events, call, msg.clone()).await?;
                    json!({ "error": msg }).to_string()
                }
                ToolDispatch::ClientResolved => {
                    handed_to_client = true;
                    json!({ "status": "handled by client" }).to_string()
                }
            };
            history.push(tool_message(&call.id, &content)?);
        }

        Ok((produced_media, handed_to_client))
    }

    async fn tool_error(
        &self,
        events: &mpsc::Sender<StreamEvent>,
        call: &PendingCall,
        error: String,
    ) -> Result<()> {
        warn!("Tool {} failed: {}", call.name, error);
        emit(
            events,
            StreamEvent::ToolError {
                tool_call_id: call.id.clone(),
                tool_name: call.name.clone(),
                error,
            },
        )
        .await
    }
}

fn is_media(output: &Value) -> bool {
    matches!(output["type"].as_str(), Some("image") | Some("video"))
}

async fn emit(events: &mpsc::Sender<StreamEvent>, event: StreamEvent) -> Result<()> {
    events
        .send(event)
        .await
        .map_err(|_| ConjureError::Stream("client disconnected".to_string()))
}
