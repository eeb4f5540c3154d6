//! List personas.

use crate::cli::Output;
use crate::config::{find_persona, personas, Settings, DEFAULT_PERSONA};

/// Print every persona, marking the configured one.
pub fn run_personas(settings: &Settings) -> anyhow::Result<()> {
    Output::header("Personas");
    println!();

    let selected = find_persona(&settings.client.persona)
        .map(|p| p.key)
        .unwrap_or(DEFAULT_PERSONA);

    for persona in personas() {
        Output::persona(persona, persona.key == selected);
    }

    println!();
    Output::info("Pick one with: conjure chat --persona <key>");
    Ok(())
}
