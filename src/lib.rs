//! Conjure - persona chat with tools
//!
//! A streaming chat server and terminal client. Each reply is written in the
//! voice of a selectable persona by a chat model that can call tools: web
//! search and page extraction, YouTube search, image and short video
//! generation, and opening a page on the client.
//!
//! # Architecture
//!
//! - `config` - Settings, personas, prompts and credentials
//! - `message` - Conversation messages and the streamed event format
//! - `model` - Streaming chat model abstraction
//! - `providers` - Clients for the external search, generation and hosting APIs
//! - `tools` - Tool registry and tool implementations
//! - `chat` - Server-side request handler (model and tool loop)
//! - `session` - Client-side conversation state and transport
//! - `cli` - Command line interface and HTTP server
//!
//! # Example
//!
//! ```rust,no_run
//! use conjure::chat::ChatHandler;
//! use conjure::config::{Credentials, Settings};
//! use conjure::message::{ChatRequest, Message};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let credentials = Credentials::from_env(&settings)?;
//!     let handler = ChatHandler::from_settings(&settings, &credentials)?;
//!
//!     let (tx, mut rx) = tokio::sync::mpsc::channel(64);
//!     let request = ChatRequest {
//!         messages: vec![Message::user_text("What is a Patronus?")],
//!         professor: Some("mcgonagall".to_string()),
//!     };
//!     tokio::spawn(async move { handler.handle(request, tx).await });
//!
//!     while let Some(event) = rx.recv().await {
//!         println!("{}", serde_json::to_string(&event)?);
//!     }
//!     Ok(())
//! }
//! ```

pub mod chat;
pub mod cli;
pub mod config;
pub mod error;
pub mod message;
pub mod model;
pub mod providers;
pub mod session;
pub mod tools;

pub use error::{ConjureError, Result};
