//! CLI command implementations.

mod chat;
mod config;
mod doctor;
mod personas;
mod serve;

pub use chat::run_chat;
pub use config::run_config;
pub use doctor::run_doctor;
pub use personas::run_personas;
pub use serve::run_serve;
