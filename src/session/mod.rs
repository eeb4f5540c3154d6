//! Client side of a chat: conversation state and the SSE transport.

mod client;
mod controller;

pub use client::{decode_events, parse_event, ChatClient, EventStream, DONE_MARKER};
pub use controller::{Attachment, ChatController, ClientAction, Phase, ToolCallRecord, ToolStatus};
