//! Prompt templates for Conjure.
//!
//! Prompts can be customized by placing TOML files in the custom prompts directory.

use super::personas::Persona;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Prompts {
    pub chat: ChatPrompts,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: HashMap<String, String>,
}

/// Behavioral ruleset appended to every persona's personality.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatPrompts {
    pub rules: String,
}

impl Default for ChatPrompts {
    fn default() -> Self {
        Self {
            rules: r#"Stay in character as {{persona_name}} at all times. Keep the voice restrained and authentic; avoid exaggeration and forced whimsy.

Tool usage:
- You can call search, extract_url, youtubeSearch, createImage, createVideo and navigate_to_page.
- Only call a tool when it improves accuracy or the user asked for media, links or videos. Do not call tools for small talk.
- For search and extract_url, pass the query or URLs and only the options you need. Ask for raw content only when you need source text.
- For createImage and createVideo, write an explicit, descriptive and safe prompt.
- navigate_to_page opens a page for the user. Always pass a full https:// URL.

Citations:
- When stating facts that came from search, cite inline as [1], [2] and finish with a short source list (URL and one line each).
- When relying on extract_url, quote the excerpt you used (at most 300 characters) with its URL.

Output:
- Answer in one sentence unless the user asks for detail or step-by-step instructions.
- Use numbered lists for steps and bullet points for options.
- After a tool result, add one or two in-character sentences on how it informs the answer.

Failures:
- If a tool returns an error, say so briefly and continue with best-effort reasoning, labeled as unverified.
- If you are unsure of a fact, say so and offer to search."#
                .to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts from the default location, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let chat_path = custom_path.join("chat.toml");
            if chat_path.exists() {
                let content = std::fs::read_to_string(&chat_path)?;
                prompts.chat = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
        let mut result = template.to_string();
        for (key, value) in vars {
            result = result.replace(&format!("{{{{{}}}}}", key), value);
        }
        result
    }

    /// Render a prompt template with both provided variables and custom config variables.
    /// Provided variables take precedence over custom config variables.
    pub fn render_with_custom(&self, template: &str, vars: &HashMap<String, String>) -> String {
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert(key.clone(), value.clone());
        }
        Self::render(template, &merged)
    }

    /// Build the system instruction for a persona: its personality followed
    /// by the rendered ruleset.
    pub fn system_prompt(&self, persona: &Persona) -> String {
        let mut vars = HashMap::new();
        vars.insert("persona_name".to_string(), persona.name.to_string());
        vars.insert("persona_title".to_string(), persona.title.to_string());

        let rules = self.render_with_custom(&self.chat.rules, &vars);
        format!("{}\n\n{}", persona.personality, rules)
    }
}
