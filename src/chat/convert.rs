//! Conversion from conversation messages to chat completion messages.

use crate::error::{ConjureError, Result};
use crate::message::{Message, Part, Role};
use async_openai::types::{
    ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
    ChatCompletionRequestMessage, ChatCompletionRequestMessageContentPartImage,
    ChatCompletionRequestMessageContentPartText, ChatCompletionRequestToolMessageArgs,
    ChatCompletionRequestUserMessageArgs, ChatCompletionRequestUserMessageContent,
    ChatCompletionRequestUserMessageContentPart, ChatCompletionToolType, FunctionCall, ImageUrl,
};
use serde_json::{json, Value};

/// Convert a conversation history into provider messages.
///
/// Assistant tool-result parts expand into an assistant message carrying the
/// tool calls followed by one tool message per result.
pub fn to_provider_messages(messages: &[Message]) -> Result<Vec<ChatCompletionRequestMessage>> {
    let mut converted = Vec::with_capacity(messages.len());
    for message in messages {
        match message.role {
            Role::User => {
                if let Some(user) = user_message(message)? {
                    converted.push(user);
                }
            }
            Role::Assistant => converted.extend(assistant_messages(message)?),
        }
    }
    Ok(converted)
}

fn user_message(message: &Message) -> Result<Option<ChatCompletionRequestMessage>> {
    let mut parts = Vec::new();
    let mut multimodal = false;

    for part in &message.parts {
        match part {
            Part::Text { text } => parts.push(text_part(text)),
            Part::Image { url } => {
                multimodal = true;
                parts.push(image_part(url));
            }
            Part::File { url, media_type } if media_type.starts_with("image/") => {
                multimodal = true;
                parts.push(image_part(url));
            }
            Part::File { url, media_type } => {
                parts.push(text_part(&format!("[Attached file: {} ({})]", url, media_type)));
            }
            Part::ToolResult { .. } => {}
        }
    }

    if parts.is_empty() {
        return Ok(None);
    }

    let content = if multimodal {
        ChatCompletionRequestUserMessageContent::Array(parts)
    } else {
        ChatCompletionRequestUserMessageContent::Text(message.text())
    };

    let user = ChatCompletionRequestUserMessageArgs::default()
        .content(content)
        .build()
        .map_err(|e| ConjureError::Model(e.to_string()))?;
    Ok(Some(user.into()))
}

fn text_part(text: &str) -> ChatCompletionRequestUserMessageContentPart {
    ChatCompletionRequestUserMessageContentPart::Text(ChatCompletionRequestMessageContentPartText {
        text: text.to_string(),
    })
}

fn image_part(url: &str) -> ChatCompletionRequestUserMessageContentPart {
    ChatCompletionRequestUserMessageContentPart::ImageUrl(
        ChatCompletionRequestMessageContentPartImage {
            image_url: ImageUrl {
                url: url.to_string(),
                detail: None,
            },
        },
    )
}

fn assistant_messages(message: &Message) -> Result<Vec<ChatCompletionRequestMessage>> {
    let mut converted = Vec::new();
    let mut turn = AssistantTurn::default();

    for part in &message.parts {
        match part {
            Part::Text { text } => {
                if !turn.tool_calls.is_empty() {
                    turn.flush_into(&mut converted)?;
                }
                turn.texts.push(text.as_str());
            }
            Part::ToolResult {
                tool_call_id,
                tool_name,
                input,
                output,
                error,
            } => {
                turn.tool_calls.push(tool_call(
                    tool_call_id,
                    tool_name,
                    input.as_ref().unwrap_or(&json!({})),
                ));
                turn.tool_messages.push(tool_message(
                    tool_call_id,
                    &tool_content(output.as_ref(), error.as_deref()),
                )?);
            }
            Part::Image { .. } | Part::File { .. } => {}
        }
    }

    turn.flush_into(&mut converted)?;
    Ok(converted)
}

/// One model turn inside an assistant message: text, then the calls it made.
#[derive(Default)]
struct AssistantTurn<'a> {
    texts: Vec<&'a str>,
    tool_calls: Vec<ChatCompletionMessageToolCall>,
    tool_messages: Vec<ChatCompletionRequestMessage>,
}

impl AssistantTurn<'_> {
    fn flush_into(&mut self, converted: &mut Vec<ChatCompletionRequestMessage>) -> Result<()> {
        let text = self.texts.join(" ");
        self.texts.clear();
        if text.is_empty() && self.tool_calls.is_empty() {
            return Ok(());
        }

        let mut args = ChatCompletionRequestAssistantMessageArgs::default();
        if !text.is_empty() {
            args.content(text);
        }
        if !self.tool_calls.is_empty() {
            args.tool_calls(std::mem::take(&mut self.tool_calls));
        }
        let assistant = args
            .build()
            .map_err(|e| ConjureError::Model(e.to_string()))?;

        converted.push(assistant.into());
        converted.append(&mut self.tool_messages);
        Ok(())
    }
}

/// A function tool call as it appears in an assistant message.
pub(crate) fn tool_call(id: &str, name: &str, input: &Value) -> ChatCompletionMessageToolCall {
    ChatCompletionMessageToolCall {
        id: id.to_string(),
        r#type: ChatCompletionToolType::Function,
        function: FunctionCall {
            name: name.to_string(),
            arguments: input.to_string(),
        },
    }
}

/// A tool message answering a tool call.
pub(crate) fn tool_message(id: &str, content: &str) -> Result<ChatCompletionRequestMessage> {
    let message = ChatCompletionRequestToolMessageArgs::default()
        .tool_call_id(id)
        .content(content.to_string())
        .build()
        .map_err(|e| ConjureError::Model(e.to_string()))?;
    Ok(message.into())
}

fn tool_content(output: Option<&Value>, error: Option<&str>) -> String {
    match (output, error) {
        (Some(output), _) => output.to_string(),
        (None, Some(error)) => json!({ "error": error }).to_string(),
        (None, None) => json!({ "status": "completed" }).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_openai::types::{
        ChatCompletionRequestAssistantMessageContent, ChatCompletionRequestToolMessageContent,
    };

    #[test]
    fn test_plain_user_text() {
        let converted = to_provider_messages(&[Message::user_text("Who founded Hogwarts?")]).unwrap();
        assert_eq!(converted.len(), 1);
        match &converted[0] {
            ChatCompletionRequestMessage::User(user) => match &user.content {
                ChatCompletionRequestUserMessageContent::Text(text) => {
                    assert_eq!(text, "Who founded Hogwarts?")
                }
                other => panic!("Expected text content, got {:?}", other),
            },
            other => panic!("Expected user message, got {:?}", other),
        }
    }

    #[test]
    fn test_user_attachments_become_parts() {
        let message = Message::new(
            Role::User,
            vec![
                Part::text("What is this?"),
                Part::File {
                    url: "data:image/png;base64,AAAA".to_string(),
                    media_type: "image/png".to_string(),
                },
                Part::File {
                    url: "https://x/notes.pdf".to_string(),
                    media_type: "application/pdf".to_string(),
                },
            ],
        );

        let converted = to_provider_messages(&[message]).unwrap();
        match &converted[0] {
            ChatCompletionRequestMessage::User(user) => match &user.content {
                ChatCompletionRequestUserMessageContent::Array(parts) => {
                    assert_eq!(parts.len(), 3);
                    assert!(matches!(
                        parts[1],
                        ChatCompletionRequestUserMessageContentPart::ImageUrl(_)
                    ));
                }
                other => panic!("Expected parts, got {:?}", other),
            },
            other => panic!("Expected user message, got {:?}", other),
        }
    }

    #[test]
    fn test_assistant_tool_results_expand() {
        let message = Message::new(
            Role::Assistant,
            vec![
                Part::text("Let me look."),
                Part::ToolResult {
                    tool_call_id: "call_1".to_string(),
                    tool_name: "search".to_string(),
                    input: Some(json!({"query": "owls"})),
                    output: Some(json!({"results": []})),
                    error: None,
                },
                Part::ToolResult {
                    tool_call_id: "call_2".to_string(),
                    tool_name: "createImage".to_string(),
                    input: None,
                    output: None,
                    error: Some("quota".to_string()),
                },
            ],
        );

        let converted = to_provider_messages(&[message]).unwrap();
        assert_eq!(converted.len(), 3);

        match &converted[0] {
            ChatCompletionRequestMessage::Assistant(assistant) => {
                let calls = assistant.tool_calls.as_ref().unwrap();
                assert_eq!(calls.len(), 2);
                assert_eq!(calls[0].function.arguments, r#"{"query":"owls"}"#);
                assert_eq!(calls[1].function.arguments, "{}");
                assert!(matches!(
                    assistant.content,
                    Some(ChatCompletionRequestAssistantMessageContent::Text(ref t)) if t == "Let me look."
                ));
            }
            other => panic!("Expected assistant message, got {:?}", other),
        }

        match &converted[2] {
            ChatCompletionRequestMessage::Tool(tool) => {
                assert_eq!(tool.tool_call_id, "call_2");
                assert!(matches!(
                    tool.content,
                    ChatCompletionRequestToolMessageContent::Text(ref t) if t.contains("quota")
                ));
            }
            other => panic!("Expected tool message, got {:?}", other),
        }
    }

    #[test]
    fn test_text_after_tool_results_follows_tool_messages() {
        let message = Message::new(
            Role::Assistant,
            vec![
                Part::text("Let me check."),
                Part::ToolResult {
                    tool_call_id: "c1".to_string(),
                    tool_name: "search".to_string(),
                    input: Some(json!({"query": "horcrux"})),
                    output: Some(json!({"results": []})),
                    error: None,
                },
                Part::text("Nothing found, I fear."),
            ],
        );

        let converted = to_provider_messages(&[message]).unwrap();
        assert_eq!(converted.len(), 3);

        match &converted[0] {
            ChatCompletionRequestMessage::Assistant(assistant) => {
                assert_eq!(assistant.tool_calls.as_ref().unwrap()[0].id, "c1");
                assert!(matches!(
                    assistant.content,
                    Some(ChatCompletionRequestAssistantMessageContent::Text(ref t)) if t == "Let me check."
                ));
            }
            other => panic!("Expected assistant message, got {:?}", other),
        }
        assert!(matches!(converted[1], ChatCompletionRequestMessage::Tool(_)));
        match &converted[2] {
            ChatCompletionRequestMessage::Assistant(assistant) => {
                assert!(assistant.tool_calls.is_none());
                assert!(matches!(
                    assistant.content,
                    Some(ChatCompletionRequestAssistantMessageContent::Text(ref t)) if t == "Nothing found, I fear."
                ));
            }
            other => panic!("Expected assistant message, got {:?}", other),
        }
    }

    #[test]
    fn test_each_step_keeps_its_own_calls() {
        let result = |id: &str| Part::ToolResult {
            tool_call_id: id.to_string(),
            tool_name: "search".to_string(),
            input: None,
            output: Some(json!({"results": []})),
            error: None,
        };
        let message = Message::new(
            Role::Assistant,
            vec![result("a"), Part::text("Hmm."), result("b"), Part::text("Done.")],
        );

        let converted = to_provider_messages(&[message]).unwrap();
        let roles: Vec<&str> = converted
            .iter()
            .map(|m| match m {
                ChatCompletionRequestMessage::Assistant(_) => "assistant",
                ChatCompletionRequestMessage::Tool(_) => "tool",
                _ => "other",
            })
            .collect();
        assert_eq!(roles, vec!["assistant", "tool", "assistant", "tool", "assistant"]);
    }

    #[test]
    fn test_empty_messages_are_dropped() {
        let empty = Message::new(Role::Assistant, Vec::new());
        assert!(to_provider_messages(&[empty]).unwrap().is_empty());
    }
}
