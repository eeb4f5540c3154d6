//! Server-side chat: history conversion and the streaming model/tool loop.

mod convert;
mod handler;

pub use convert::to_provider_messages;
pub use handler::{ChatHandler, HandlerLimits};
