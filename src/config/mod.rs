//! Configuration module for Conjure.
//!
//! Handles application settings, credentials, prompt templates and the persona registry.

mod credentials;
mod personas;
mod prompts;
mod settings;

pub use credentials::{Credentials, FAL_API_KEY, IMGBB_API_KEY, TAVILY_API_KEY};
pub use personas::{find_persona, persona, personas, Persona, DEFAULT_PERSONA};
pub use prompts::{ChatPrompts, Prompts};
pub use settings::{
    ClientSettings, GeneralSettings, ModelSettings, PromptSettings, ProviderSettings,
    ServerSettings, Settings, VideoSettings,
};
