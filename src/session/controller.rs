//! Client-side chat state.
//!
//! [`ChatController`] owns the visible conversation, the phase of the current
//! request and two pools of tool-call records: calls seen during the current
//! response (in flight) and calls settled when a response finished
//! (reconciled). It performs no I/O; the caller feeds it stream events and
//! the current time.

use crate::config::{persona, Persona};
use crate::message::{ChatRequest, Message, Part, Role, StreamEvent};
use crate::tools::navigate_definition;
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::debug;

/// Where the current request stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    Idle,
    /// Request sent, nothing streamed yet.
    Thinking,
    Streaming,
    Error(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolStatus {
    Pending,
    Completed,
    Error,
}

/// What the client knows about one tool call.
#[derive(Debug, Clone)]
pub struct ToolCallRecord {
    pub id: String,
    pub tool_name: String,
    pub input: Value,
    pub status: ToolStatus,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub started_at: Instant,
    pub duration_ms: Option<u64>,
}

impl ToolCallRecord {
    fn settle(&mut self, status: ToolStatus, now: Instant) {
        self.status = status;
        self.duration_ms = Some(now.saturating_duration_since(self.started_at).as_millis() as u64);
    }
}

/// A side effect the client performs for a client-resolved tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientAction {
    Navigate { url: String },
}

/// A file attached to an outgoing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub url: String,
    pub media_type: String,
}

/// Conversation state machine for one chat window.
#[derive(Debug)]
pub struct ChatController {
    persona: &'static Persona,
    messages: Vec<Message>,
    streaming: Option<Message>,
    phase: Phase,
    in_flight: Vec<ToolCallRecord>,
    reconciled: Vec<ToolCallRecord>,
    acks: Vec<(String, Instant)>,
    ack_delay: Duration,
}

impl ChatController {
    pub fn new(persona_key: Option<&str>, ack_delay: Duration) -> Self {
        Self {
            persona: persona(persona_key),
            messages: Vec::new(),
            streaming: None,
            phase: Phase::Idle,
            in_flight: Vec::new(),
            reconciled: Vec::new(),
            acks: Vec::new(),
            ack_delay,
        }
    }

    pub fn persona(&self) -> &'static Persona {
        self.persona
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn is_busy(&self) -> bool {
        matches!(self.phase, Phase::Thinking | Phase::Streaming)
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// The assistant message currently being streamed.
    pub fn streaming_message(&self) -> Option<&Message> {
        self.streaming.as_ref()
    }

    pub fn in_flight(&self) -> &[ToolCallRecord] {
        &self.in_flight
    }

    pub fn reconciled(&self) -> &[ToolCallRecord] {
        &self.reconciled
    }

    /// Switch persona. Unknown keys select the default persona.
    pub fn select_persona(&mut self, key: &str) -> &'static Persona {
        self.persona = persona(Some(key));
        self.persona
    }

    /// Forget the conversation and all tool-call records.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.streaming = None;
        self.phase = Phase::Idle;
        self.in_flight.clear();
        self.reconciled.clear();
        self.acks.clear();
    }

    /// Append a user message and build the request for it.
    ///
    /// Returns `None` without changing state when there is nothing to send
    /// or a response is still streaming.
    pub fn submit(&mut self, text: &str, files: Vec<Attachment>) -> Option<ChatRequest> {
        let text = text.trim();
        if (text.is_empty() && files.is_empty()) || self.is_busy() {
            return None;
        }

        let mut parts = Vec::with_capacity(files.len() + 1);
        if !text.is_empty() {
            parts.push(Part::text(text));
        }
        parts.extend(files.into_iter().map(|f| Part::File {
            url: f.url,
            media_type: f.media_type,
        }));

        self.messages.push(Message::new(Role::User, parts));
        self.phase = Phase::Thinking;

        Some(ChatRequest {
            messages: self.messages.clone(),
            professor: Some(self.persona.key.to_string()),
        })
    }

    /// Fold one stream event into the state.
    pub fn apply(&mut self, event: StreamEvent, now: Instant) -> Option<ClientAction> {
        match event {
            StreamEvent::Start { message_id } => {
                self.streaming = Some(Message {
                    id: message_id,
                    role: Role::Assistant,
                    parts: Vec::new(),
                });
            }
            StreamEvent::TextDelta { delta } => {
                self.phase = Phase::Streaming;
                self.streaming_mut().push_text(&delta);
            }
            StreamEvent::ToolCall {
                tool_call_id,
                tool_name,
                input,
                client_resolved,
            } => {
                self.phase = Phase::Streaming;
                return self.track_call(tool_call_id, tool_name, input, client_resolved, now);
            }
            StreamEvent::ToolResult {
                tool_call_id,
                tool_name,
                output,
            } => {
                let input = self.call_input(&tool_call_id);
                self.streaming_mut().parts.push(Part::ToolResult {
                    tool_call_id,
                    tool_name,
                    input,
                    output: Some(output),
                    error: None,
                });
            }
            StreamEvent::ToolError {
                tool_call_id,
                tool_name,
                error,
            } => {
                let input = self.call_input(&tool_call_id);
                self.streaming_mut().parts.push(Part::ToolResult {
                    tool_call_id,
                    tool_name,
                    input,
                    output: None,
                    error: Some(error),
                });
            }
            StreamEvent::FinishStep { step } => debug!("Step {} finished", step),
            StreamEvent::Finish => {
                self.reconcile(now);
                self.phase = Phase::Idle;
            }
            StreamEvent::Error { error_text } => {
                self.reconcile(now);
                self.phase = Phase::Error(error_text);
            }
        }
        None
    }

    /// Record a transport failure.
    pub fn fail(&mut self, message: impl Into<String>, now: Instant) {
        self.reconcile(now);
        self.phase = Phase::Error(message.into());
    }

    /// User-facing error line for the current phase.
    pub fn render_error(&self) -> Option<String> {
        match &self.phase {
            Phase::Error(message) => Some(format!("Something went wrong: {}", message)),
            _ => None,
        }
    }

    /// Close the streamed reply and settle the in-flight pool against it.
    ///
    /// A call with a matching tool-result part in that reply becomes
    /// completed (or error when the part carries an error). A call without
    /// one keeps its status, which is pending unless it was acknowledged.
    /// Earlier replies are never consulted.
    pub fn reconcile(&mut self, now: Instant) {
        let reply = if self.finish_message() {
            self.messages.last()
        } else {
            None
        };

        for mut record in self.in_flight.drain(..) {
            if let Some(Part::ToolResult { output, error, .. }) =
                reply.and_then(|m| m.tool_result(&record.id))
            {
                if let Some(error) = error {
                    record.error = Some(error.clone());
                    record.settle(ToolStatus::Error, now);
                } else {
                    record.result = output.clone();
                    record.settle(ToolStatus::Completed, now);
                }
            }
            self.reconciled.push(record);
        }
    }

    /// When the earliest scheduled acknowledgement falls due.
    pub fn next_ack_due(&self) -> Option<Instant> {
        self.acks.iter().map(|(_, due_at)| *due_at).min()
    }

    /// Apply client acknowledgements that are due. Returns how many fired.
    pub fn tick(&mut self, now: Instant) -> usize {
        let (due, waiting): (Vec<_>, Vec<_>) =
            self.acks.drain(..).partition(|(_, due_at)| *due_at <= now);
        self.acks = waiting;

        for (id, _) in &due {
            let record = self
                .in_flight
                .iter_mut()
                .chain(self.reconciled.iter_mut())
                .find(|r| &r.id == id);
            if let Some(record) = record {
                if record.status == ToolStatus::Pending {
                    record.settle(ToolStatus::Completed, now);
                }
            }
        }
        due.len()
    }

    fn track_call(
        &mut self,
        id: String,
        tool_name: String,
        input: Value,
        client_resolved: bool,
        now: Instant,
    ) -> Option<ClientAction> {
        self.in_flight.retain(|r| r.id != id);
        self.in_flight.push(ToolCallRecord {
            id: id.clone(),
            tool_name: tool_name.clone(),
            input: input.clone(),
            status: ToolStatus::Pending,
            result: None,
            error: None,
            started_at: now,
            duration_ms: None,
        });

        if !client_resolved {
            return None;
        }
        self.acks.push((id, now + self.ack_delay));

        if tool_name == navigate_definition().name {
            return input["url"]
                .as_str()
                .map(|url| ClientAction::Navigate {
                    url: url.to_string(),
                });
        }
        None
    }

    fn call_input(&self, id: &str) -> Option<Value> {
        self.in_flight
            .iter()
            .find(|r| r.id == id)
            .map(|r| r.input.clone())
    }

    fn streaming_mut(&mut self) -> &mut Message {
        self.streaming
            .get_or_insert_with(|| Message::new(Role::Assistant, Vec::new()))
    }

    /// Move the streamed message into the conversation. False when there
    /// was none or it stayed empty.
    fn finish_message(&mut self) -> bool {
        match self.streaming.take() {
            Some(message) if !message.parts.is_empty() => {
                self.messages.push(message);
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const ACK: Duration = Duration::from_millis(2000);

    fn controller() -> ChatController {
        ChatController::new(Some("hagrid"), ACK)
    }

    fn tool_call(id: &str, name: &str, input: Value, client_resolved: bool) -> StreamEvent {
        StreamEvent::ToolCall {
            tool_call_id: id.to_string(),
            tool_name: name.to_string(),
            input,
            client_resolved,
        }
    }

    #[test]
    fn test_blank_submit_is_noop() {
        let mut chat = controller();
        assert!(chat.submit("   ", Vec::new()).is_none());
        assert!(chat.messages().is_empty());
        assert_eq!(chat.phase(), &Phase::Idle);
    }

    #[test]
    fn test_submit_builds_request() {
        let mut chat = controller();
        let request = chat
            .submit(
                " Tell me about dragons ",
                vec![Attachment {
                    url: "data:image/png;base64,AAAA".to_string(),
                    media_type: "image/png".to_string(),
                }],
            )
            .unwrap();

        assert_eq!(request.professor.as_deref(), Some("hagrid"));
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.messages[0].text(), "Tell me about dragons");
        assert_eq!(request.messages[0].parts.len(), 2);
        assert_eq!(chat.phase(), &Phase::Thinking);

        assert!(chat.submit("again", Vec::new()).is_none());
    }

    #[test]
    fn test_attachment_only_submit_is_sent() {
        let mut chat = controller();
        let file = Attachment {
            url: "https://x/notes.pdf".to_string(),
            media_type: "application/pdf".to_string(),
        };
        assert!(chat.submit("", vec![file]).is_some());
    }

    #[test]
    fn test_stream_folds_into_assistant_message() {
        let mut chat = controller();
        chat.submit("Hello", Vec::new());
        let now = Instant::now();

        chat.apply(StreamEvent::Start { message_id: "m1".to_string() }, now);
        assert_eq!(chat.phase(), &Phase::Thinking);
        chat.apply(StreamEvent::TextDelta { delta: "Ello ".to_string() }, now);
        chat.apply(StreamEvent::TextDelta { delta: "there".to_string() }, now);
        assert_eq!(chat.phase(), &Phase::Streaming);
        chat.apply(StreamEvent::Finish, now);

        assert_eq!(chat.phase(), &Phase::Idle);
        assert_eq!(chat.messages().len(), 2);
        assert_eq!(chat.messages()[1].id, "m1");
        assert_eq!(chat.messages()[1].text(), "Ello there");
        assert!(chat.streaming_message().is_none());
    }

    #[test]
    fn test_reconcile_matches_results_and_leaves_others_pending() {
        let mut chat = controller();
        chat.submit("Find owls", Vec::new());
        let start = Instant::now();

        chat.apply(StreamEvent::Start { message_id: "m1".to_string() }, start);
        chat.apply(tool_call("c1", "search", json!({"query": "owls"}), false), start);
        chat.apply(tool_call("c2", "createImage", json!({"prompt": "owl"}), false), start);
        chat.apply(tool_call("c3", "youtubeSearch", json!({"query": "owls"}), false), start);
        chat.apply(
            StreamEvent::ToolResult {
                tool_call_id: "c1".to_string(),
                tool_name: "search".to_string(),
                output: json!({"results": []}),
            },
            start,
        );
        chat.apply(
            StreamEvent::ToolError {
                tool_call_id: "c2".to_string(),
                tool_name: "createImage".to_string(),
                error: "createImage: missing field `prompt`".to_string(),
            },
            start,
        );
        assert_eq!(chat.in_flight().len(), 3);

        chat.apply(StreamEvent::Finish, start + Duration::from_millis(40));

        assert!(chat.in_flight().is_empty());
        let records = chat.reconciled();
        assert_eq!(records.len(), 3);

        assert_eq!(records[0].status, ToolStatus::Completed);
        assert_eq!(records[0].duration_ms, Some(40));
        assert_eq!(records[0].result, Some(json!({"results": []})));

        assert_eq!(records[1].status, ToolStatus::Error);
        assert!(records[1].duration_ms.is_some());

        assert_eq!(records[2].status, ToolStatus::Pending);
        assert!(records[2].duration_ms.is_none());

        let message = &chat.messages()[1];
        match message.tool_result("c1") {
            Some(Part::ToolResult { input, .. }) => assert_eq!(input, &Some(json!({"query": "owls"}))),
            other => panic!("Expected tool result part, got {:?}", other),
        }
    }

    #[test]
    fn test_navigate_emits_action_and_acks_after_delay() {
        let mut chat = controller();
        chat.submit("Open the Hogwarts site", Vec::new());
        let start = Instant::now();

        let action = chat.apply(
            tool_call(
                "nav",
                "navigate_to_page",
                json!({"url": "https://www.hogwarts.edu"}),
                true,
            ),
            start,
        );
        assert_eq!(
            action,
            Some(ClientAction::Navigate {
                url: "https://www.hogwarts.edu".to_string()
            })
        );

        assert_eq!(chat.tick(start + Duration::from_millis(1999)), 0);
        assert_eq!(chat.in_flight()[0].status, ToolStatus::Pending);

        assert_eq!(chat.tick(start + ACK), 1);
        assert_eq!(chat.in_flight()[0].status, ToolStatus::Completed);
        assert_eq!(chat.in_flight()[0].duration_ms, Some(2000));

        chat.apply(StreamEvent::Finish, start + ACK);
        assert_eq!(chat.reconciled()[0].status, ToolStatus::Completed);
    }

    #[test]
    fn test_ack_after_finish_settles_reconciled_record() {
        let mut chat = controller();
        chat.submit("Open it", Vec::new());
        let start = Instant::now();

        chat.apply(tool_call("nav", "navigate_to_page", json!({"url": "https://x.org"}), true), start);
        chat.apply(StreamEvent::Finish, start);
        assert_eq!(chat.reconciled()[0].status, ToolStatus::Pending);

        chat.tick(start + ACK);
        assert_eq!(chat.reconciled()[0].status, ToolStatus::Completed);
    }

    #[test]
    fn test_next_ack_due_drives_settlement() {
        let mut chat = controller();
        chat.submit("Open it", Vec::new());
        let start = Instant::now();
        assert!(chat.next_ack_due().is_none());

        chat.apply(tool_call("nav", "navigate_to_page", json!({"url": "https://x.org"}), true), start);
        chat.apply(StreamEvent::Finish, start);

        let due = chat.next_ack_due().unwrap();
        assert_eq!(due, start + ACK);
        assert_eq!(chat.tick(due), 1);
        assert!(chat.next_ack_due().is_none());

        let record = &chat.reconciled()[0];
        assert_eq!(record.status, ToolStatus::Completed);
        assert_eq!(record.duration_ms, Some(2000));
    }

    #[test]
    fn test_empty_reply_does_not_match_older_results() {
        let mut chat = controller();
        let start = Instant::now();

        chat.submit("Find owls", Vec::new());
        chat.apply(StreamEvent::Start { message_id: "m1".to_string() }, start);
        chat.apply(tool_call("c1", "search", json!({"query": "owls"}), false), start);
        chat.apply(
            StreamEvent::ToolResult {
                tool_call_id: "c1".to_string(),
                tool_name: "search".to_string(),
                output: json!({"results": []}),
            },
            start,
        );
        chat.apply(StreamEvent::Finish, start);
        assert_eq!(chat.reconciled()[0].status, ToolStatus::Completed);

        // A provider reusing the id in a reply that ends before any part arrives.
        chat.submit("Again", Vec::new());
        chat.apply(StreamEvent::Start { message_id: "m2".to_string() }, start);
        chat.apply(tool_call("c1", "search", json!({"query": "owls"}), false), start);
        chat.apply(StreamEvent::Finish, start);

        assert_eq!(chat.messages().len(), 3);
        assert_eq!(chat.reconciled()[1].status, ToolStatus::Pending);
        assert!(chat.reconciled()[1].result.is_none());
    }

    #[test]
    fn test_error_event_and_render() {
        let mut chat = controller();
        chat.submit("Hello", Vec::new());
        chat.apply(
            StreamEvent::Error {
                error_text: "Model API error: 429".to_string(),
            },
            Instant::now(),
        );

        assert_eq!(chat.phase(), &Phase::Error("Model API error: 429".to_string()));
        assert_eq!(
            chat.render_error().as_deref(),
            Some("Something went wrong: Model API error: 429")
        );
        assert!(chat.submit("retry", Vec::new()).is_some());
    }

    #[test]
    fn test_transport_failure() {
        let mut chat = controller();
        chat.submit("Hello", Vec::new());
        chat.fail("connection refused", Instant::now());
        assert!(chat.render_error().unwrap().contains("connection refused"));
        assert!(!chat.is_busy());
    }

    #[test]
    fn test_select_persona_and_clear() {
        let mut chat = controller();
        assert_eq!(chat.select_persona("luna").key, "luna");
        assert_eq!(chat.select_persona("nobody").key, "dumbledore");

        chat.submit("Hello", Vec::new());
        chat.clear();
        assert!(chat.messages().is_empty());
        assert_eq!(chat.phase(), &Phase::Idle);
    }
}
